//! Consistency detector: logical relations between threshold markets.
//!
//! Two rules over every pair of markets sharing an entity:
//! complementary pairs ("above X" vs "below X") must price to ~1 combined,
//! and within one comparator family a stricter bar can never be likelier
//! than a looser one.

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::debug;

use paper_arb_core::{
    Comparator, Detector, DetectorConfig, Market, Opportunity, OpportunityKind, Side, TradeAction,
};
use paper_arb_matching::Fingerprint;

/// Detects complementary and dominance inconsistencies.
#[derive(Debug)]
pub struct ConsistencyDetector {
    config: DetectorConfig,
}

struct Profile<'a> {
    market: &'a Market,
    outcome_id: &'a str,
    prob: Decimal,
    entity: Option<String>,
    comparator: Option<Comparator>,
    threshold: Option<Decimal>,
}

impl ConsistencyDetector {
    /// Creates a consistency detector.
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    fn complementary(&self, a: &Profile<'_>, b: &Profile<'_>) -> Option<Opportunity> {
        let (ca, cb) = (a.comparator?, b.comparator?);
        if a.threshold? != b.threshold? || !ca.opposes(cb) {
            return None;
        }

        let total = a.prob + b.prob;
        let deviation = (Decimal::ONE - total).abs();
        if deviation <= self.config.exclusive_sum_tolerance {
            return None;
        }

        debug!(
            left = %a.market.id,
            right = %b.market.id,
            total = %total,
            "complementary pair mispriced"
        );

        Some(Opportunity {
            kind: OpportunityKind::Consistency,
            market_ids: vec![a.market.id.clone(), b.market.id.clone()],
            description: format!("Complementary probs sum {total:.3} !=1"),
            net_edge: deviation,
            actions: vec![
                TradeAction::new(&a.market.id, a.outcome_id, Side::Buy, Decimal::ONE, a.prob),
                TradeAction::new(&b.market.id, b.outcome_id, Side::Sell, Decimal::ONE, b.prob),
            ],
            metadata: Default::default(),
        })
    }

    fn dominance(&self, a: &Profile<'_>, b: &Profile<'_>) -> Option<Opportunity> {
        let (ca, cb) = (a.comparator?, b.comparator?);
        let (ta, tb) = (a.threshold?, b.threshold?);
        if ta == tb {
            return None;
        }

        // Order by threshold so `lo` carries the looser bar of its family.
        let (lo, hi) = if ta < tb { (a, b) } else { (b, a) };
        let entity = lo.entity.as_deref().unwrap_or("unknown");

        if ca.is_upper() && cb.is_upper() && lo.prob < hi.prob {
            debug!(
                entity = entity,
                low = %lo.market.id,
                high = %hi.market.id,
                "upper-family dominance violated"
            );
            return Some(Opportunity {
                kind: OpportunityKind::Consistency,
                market_ids: vec![lo.market.id.clone(), hi.market.id.clone()],
                description: format!(
                    "Dominance violated {entity}: {}<{} yet {:.3}<{:.3}",
                    lo.threshold?, hi.threshold?, lo.prob, hi.prob
                ),
                net_edge: hi.prob - lo.prob,
                actions: vec![
                    TradeAction::new(&lo.market.id, lo.outcome_id, Side::Buy, Decimal::ONE, lo.prob),
                    TradeAction::new(&hi.market.id, hi.outcome_id, Side::Sell, Decimal::ONE, hi.prob),
                ],
                metadata: Default::default(),
            });
        }

        if ca.is_lower() && cb.is_lower() && lo.prob > hi.prob {
            debug!(
                entity = entity,
                low = %lo.market.id,
                high = %hi.market.id,
                "lower-family dominance violated"
            );
            return Some(Opportunity {
                kind: OpportunityKind::Consistency,
                market_ids: vec![lo.market.id.clone(), hi.market.id.clone()],
                description: format!(
                    "Dominance violated {entity}: {}<{} yet {:.3}>{:.3}",
                    lo.threshold?, hi.threshold?, lo.prob, hi.prob
                ),
                net_edge: lo.prob - hi.prob,
                actions: vec![
                    TradeAction::new(&lo.market.id, lo.outcome_id, Side::Sell, Decimal::ONE, lo.prob),
                    TradeAction::new(&hi.market.id, hi.outcome_id, Side::Buy, Decimal::ONE, hi.prob),
                ],
                metadata: Default::default(),
            });
        }

        None
    }
}

impl Detector for ConsistencyDetector {
    fn name(&self) -> &'static str {
        "consistency"
    }

    fn detect(&mut self, markets: &[Market]) -> Result<Vec<Opportunity>> {
        let profiles: Vec<Profile<'_>> = markets
            .iter()
            .filter_map(|market| {
                let yes = market.yes_outcome()?;
                let fp = Fingerprint::of(market);
                Some(Profile {
                    market,
                    outcome_id: &yes.id,
                    prob: yes.price,
                    entity: fp.entity,
                    comparator: fp.comparator,
                    threshold: fp.threshold,
                })
            })
            .collect();

        let mut opps = Vec::new();
        for i in 0..profiles.len() {
            for j in (i + 1)..profiles.len() {
                let (a, b) = (&profiles[i], &profiles[j]);
                if a.entity != b.entity {
                    continue;
                }
                if let Some(opp) = self.complementary(a, b) {
                    opps.push(opp);
                }
                if let Some(opp) = self.dominance(a, b) {
                    opps.push(opp);
                }
            }
        }

        Ok(opps)
    }
}
