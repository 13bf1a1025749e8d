//! Time-lag detector: stale quotes lag behind their peers.
//!
//! The only stateful detector. It remembers the last observed price per
//! market across iterations; when a market inside a related group jumps
//! after sitting stale past the persistence window, the jump itself is the
//! signal - fade it.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use paper_arb_core::{
    Detector, DetectorConfig, Market, MatchingConfig, Opportunity, OpportunityKind, Side,
    TradeAction,
};
use paper_arb_matching::{group_related, verify_groups, GroupVerifier};

/// Detects delayed repricing within related market groups.
pub struct TimeLagDetector {
    config: DetectorConfig,
    matching: MatchingConfig,
    verifier: Option<Arc<dyn GroupVerifier>>,
    history: HashMap<String, (Decimal, DateTime<Utc>)>,
}

impl std::fmt::Debug for TimeLagDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeLagDetector")
            .field("verified", &self.verifier.is_some())
            .field("tracked_markets", &self.history.len())
            .finish()
    }
}

impl TimeLagDetector {
    /// Creates a time-lag detector with empty history.
    #[must_use]
    pub fn new(config: DetectorConfig, matching: MatchingConfig) -> Self {
        Self {
            config,
            matching,
            verifier: None,
            history: HashMap::new(),
        }
    }

    /// Installs an external group verifier; its failures are handled per
    /// the configured fail mode.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn GroupVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Seeds a prior observation. Test hook and warm-start aid.
    pub fn record_observation(
        &mut self,
        market_id: impl Into<String>,
        price: Decimal,
        seen_at: DateTime<Utc>,
    ) {
        self.history.insert(market_id.into(), (price, seen_at));
    }

    /// Number of markets currently tracked.
    #[must_use]
    pub fn tracked_markets(&self) -> usize {
        self.history.len()
    }

    /// Detection against an explicit clock; `detect` passes `Utc::now()`.
    pub fn detect_at(&mut self, markets: &[Market], now: DateTime<Utc>) -> Vec<Opportunity> {
        let persistence = Duration::minutes(self.config.timelag_persistence_minutes);
        let groups = group_related(markets, self.matching.expiry_window_days);
        let verified = verify_groups(
            &groups,
            self.verifier.as_deref(),
            self.matching.verification_fail_mode,
        );

        let mut opps = Vec::new();
        for members in verified.values().flatten() {
            if members.len() < 2 {
                continue;
            }
            for market in members {
                let Some(yes) = market.yes_outcome() else {
                    continue;
                };
                if let Some(&(prev_price, prev_time)) = self.history.get(&market.id) {
                    if prev_time < now - persistence {
                        let jump = (yes.price - prev_price).abs();
                        if jump >= self.config.timelag_price_jump {
                            let side = if yes.price < prev_price { Side::Buy } else { Side::Sell };
                            debug!(
                                market = %market.id,
                                previous = %prev_price,
                                current = %yes.price,
                                side = %side,
                                "stale quote repriced"
                            );
                            let mut opp = Opportunity {
                                kind: OpportunityKind::TimeLag,
                                market_ids: vec![market.id.clone()],
                                description: format!(
                                    "Price jump from {prev_price:.3} to {:.3} without peers updating",
                                    yes.price
                                ),
                                net_edge: jump,
                                actions: vec![TradeAction::new(
                                    &market.id,
                                    &yes.id,
                                    side,
                                    Decimal::ONE,
                                    yes.price,
                                )],
                                metadata: Default::default(),
                            };
                            opp.set_meta_decimal("previous_price", prev_price);
                            opps.push(opp);
                        }
                    }
                }
            }
        }

        // History always reflects the snapshot just scanned, opportunity or
        // not, so the next iteration compares against fresh observations.
        for market in markets {
            if let Some(yes) = market.yes_outcome() {
                self.history.insert(market.id.clone(), (yes.price, now));
            }
        }

        opps
    }
}

impl Detector for TimeLagDetector {
    fn name(&self) -> &'static str {
        "timelag"
    }

    fn detect(&mut self, markets: &[Market]) -> Result<Vec<Opportunity>> {
        Ok(self.detect_at(markets, Utc::now()))
    }
}
