//! Duplicate detector: the same event must trade at the same price.
//!
//! Candidate pairs come from the matcher; a wide enough YES gap between two
//! quotes of one event is captured by selling the rich leg and buying the
//! cheap one. Note the short leg: this family needs a venue that can sell
//! to open.

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use paper_arb_core::{
    Detector, DetectorConfig, Market, MatchingConfig, Opportunity, OpportunityKind, Side,
    TradeAction,
};
use paper_arb_matching::{cluster_duplicates, SimilarityScorer};

/// Detects price divergence between markets quoting the same event.
#[derive(Debug)]
pub struct DuplicateDetector {
    config: DetectorConfig,
    matching: MatchingConfig,
    scorer: SimilarityScorer,
}

impl DuplicateDetector {
    /// Creates a duplicate detector with a lexical-only scorer.
    #[must_use]
    pub fn new(config: DetectorConfig, matching: MatchingConfig) -> Self {
        Self {
            config,
            matching,
            scorer: SimilarityScorer::lexical(),
        }
    }

    /// Creates a duplicate detector with a custom similarity scorer.
    #[must_use]
    pub fn with_scorer(
        config: DetectorConfig,
        matching: MatchingConfig,
        scorer: SimilarityScorer,
    ) -> Self {
        Self {
            config,
            matching,
            scorer,
        }
    }
}

impl Detector for DuplicateDetector {
    fn name(&self) -> &'static str {
        "duplicate"
    }

    fn detect(&mut self, markets: &[Market]) -> Result<Vec<Opportunity>> {
        let pairs = cluster_duplicates(
            markets,
            &self.scorer,
            self.matching.title_similarity_threshold,
        );

        let mut opps = Vec::new();
        for (m1, m2) in pairs {
            let (Some(o1), Some(o2)) = (m1.yes_outcome(), m2.yes_outcome()) else {
                continue;
            };
            let diff = (o1.price - o2.price).abs();
            if diff < self.config.duplicate_price_diff_threshold {
                continue;
            }

            let (rich, rich_o, cheap, cheap_o) = if o1.price > o2.price {
                (m1, o1, m2, o2)
            } else {
                (m2, o2, m1, o1)
            };

            debug!(
                rich = %rich.id,
                cheap = %cheap.id,
                gap = %diff,
                "duplicate price divergence"
            );

            let hundred = dec!(100);
            let mut opp = Opportunity {
                kind: OpportunityKind::Duplicate,
                market_ids: vec![m1.id.clone(), m2.id.clone()],
                description: format!(
                    "Duplicate: {:.1}% vs {:.1}% (gap: {:.1}%, ${:.2}/$100)",
                    o1.price * hundred,
                    o2.price * hundred,
                    diff * hundred,
                    diff * hundred,
                ),
                net_edge: diff,
                actions: vec![
                    TradeAction::new(&rich.id, &rich_o.id, Side::Sell, Decimal::ONE, rich_o.price),
                    TradeAction::new(&cheap.id, &cheap_o.id, Side::Buy, Decimal::ONE, cheap_o.price),
                ],
                metadata: Default::default(),
            };
            opp.set_meta_decimal("price_diff", diff);
            opps.push(opp);
        }

        Ok(opps)
    }
}
