//! Ladder detector: threshold families must price monotonically.
//!
//! For one entity and a common comparator, "above 90k" can never be less
//! likely than "above 100k". Sorting a family by threshold exposes any
//! inversion as a buy/sell pair.

use std::collections::BTreeMap;

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::debug;

use paper_arb_core::{
    Comparator, Detector, DetectorConfig, Market, Opportunity, OpportunityKind, Side, TradeAction,
};
use paper_arb_matching::Fingerprint;

/// Detects monotonicity violations inside threshold ladders.
#[derive(Debug)]
pub struct LadderDetector {
    config: DetectorConfig,
}

impl LadderDetector {
    /// Creates a ladder detector.
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

fn probability(market: &Market) -> Option<(&str, Decimal)> {
    market.yes_outcome().map(|o| (o.id.as_str(), o.price))
}

impl Detector for LadderDetector {
    fn name(&self) -> &'static str {
        "ladder"
    }

    fn detect(&mut self, markets: &[Market]) -> Result<Vec<Opportunity>> {
        // Group by (entity, comparator); BTreeMap keeps emission order stable.
        let mut grouped: BTreeMap<(String, Comparator), Vec<(&Market, Decimal)>> = BTreeMap::new();
        for market in markets {
            let fp = Fingerprint::of(market);
            let (Some(comparator), Some(threshold)) = (fp.comparator, fp.threshold) else {
                continue;
            };
            let entity = fp.entity.unwrap_or_else(|| "unknown".to_string());
            grouped
                .entry((entity, comparator))
                .or_default()
                .push((market, threshold));
        }

        let mut opps = Vec::new();
        for ((entity, comparator), mut group) in grouped {
            group.sort_by(|a, b| a.1.cmp(&b.1));

            for pair in group.windows(2) {
                let (m1, t1) = pair[0];
                let (m2, t2) = pair[1];
                let (Some((o1, p1)), Some((o2, p2))) = (probability(m1), probability(m2)) else {
                    continue;
                };

                let violation = if comparator.is_upper() {
                    // YES should get cheaper as the bar rises.
                    p1 + self.config.ladder_tolerance < p2
                } else {
                    // YES should get richer as the bar rises.
                    p1 - self.config.ladder_tolerance > p2
                };
                if !violation {
                    continue;
                }

                let (edge, actions, shape) = if comparator.is_upper() {
                    (
                        p2 - p1,
                        vec![
                            TradeAction::new(&m1.id, o1, Side::Buy, Decimal::ONE, p1),
                            TradeAction::new(&m2.id, o2, Side::Sell, Decimal::ONE, p2),
                        ],
                        format!("probs {p1:.3}<{p2:.3}"),
                    )
                } else {
                    (
                        p1 - p2,
                        vec![
                            TradeAction::new(&m1.id, o1, Side::Sell, Decimal::ONE, p1),
                            TradeAction::new(&m2.id, o2, Side::Buy, Decimal::ONE, p2),
                        ],
                        format!("probs {p1:.3}>{p2:.3}"),
                    )
                };

                debug!(
                    entity = %entity,
                    comparator = %comparator,
                    low_threshold = %t1,
                    high_threshold = %t2,
                    edge = %edge,
                    "ladder monotonicity violation"
                );

                let mut opp = Opportunity {
                    kind: OpportunityKind::Ladder,
                    market_ids: vec![m1.id.clone(), m2.id.clone()],
                    description: format!(
                        "Monotonicity violation {entity}: threshold {t1}<{t2} {shape}"
                    ),
                    net_edge: edge,
                    actions,
                    metadata: Default::default(),
                };
                opp.metadata.insert(
                    "entity".to_string(),
                    serde_json::Value::String(entity.clone()),
                );
                opp.metadata.insert(
                    "comparator".to_string(),
                    serde_json::Value::String(comparator.as_str().to_string()),
                );
                opps.push(opp);
            }
        }

        Ok(opps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paper_arb_core::{Outcome, Venue};
    use rust_decimal_macros::dec;

    fn threshold_market(id: &str, comparator: Comparator, threshold: Decimal, yes: Decimal) -> Market {
        Market {
            id: id.to_string(),
            question: format!("Will BTC be {} {}?", comparator, threshold),
            outcomes: vec![
                Outcome::new("y", "Yes", yes),
                Outcome::new("n", "No", Decimal::ONE - yes),
            ],
            end_date: None,
            liquidity: dec!(12000),
            volume: dec!(2000),
            tags: vec![],
            description: None,
            comparator: Some(comparator),
            threshold: Some(threshold),
            asset: Some("btc".to_string()),
            resolution_source: None,
            venue: Venue::Kalshi,
        }
    }

    #[test]
    fn test_upper_family_violation() {
        let markets = vec![
            threshold_market("m90", Comparator::Gt, dec!(90000), dec!(0.40)),
            threshold_market("m100", Comparator::Gt, dec!(100000), dec!(0.45)),
            threshold_market("m110", Comparator::Gt, dec!(110000), dec!(0.30)),
        ];
        let opps = LadderDetector::new(DetectorConfig::default())
            .detect(&markets)
            .unwrap();

        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.kind, OpportunityKind::Ladder);
        assert_eq!(opp.net_edge, dec!(0.05));
        assert_eq!(opp.market_ids, vec!["m90".to_string(), "m100".to_string()]);
        assert_eq!(opp.actions[0].side, Side::Buy);
        assert_eq!(opp.actions[0].limit_price, dec!(0.40));
        assert_eq!(opp.actions[1].side, Side::Sell);
        assert_eq!(opp.actions[1].limit_price, dec!(0.45));
    }

    #[test]
    fn test_upper_family_monotone_is_quiet() {
        let markets = vec![
            threshold_market("m90", Comparator::Gt, dec!(90000), dec!(0.50)),
            threshold_market("m100", Comparator::Gt, dec!(100000), dec!(0.40)),
        ];
        let opps = LadderDetector::new(DetectorConfig::default())
            .detect(&markets)
            .unwrap();
        assert!(opps.is_empty());
    }

    #[test]
    fn test_lower_family_violation() {
        // "below 90k" must not be pricier than "below 100k".
        let markets = vec![
            threshold_market("m90", Comparator::Lt, dec!(90000), dec!(0.55)),
            threshold_market("m100", Comparator::Lt, dec!(100000), dec!(0.45)),
        ];
        let opps = LadderDetector::new(DetectorConfig::default())
            .detect(&markets)
            .unwrap();

        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].net_edge, dec!(0.10));
        assert_eq!(opps[0].actions[0].side, Side::Sell);
        assert_eq!(opps[0].actions[1].side, Side::Buy);
    }

    #[test]
    fn test_tolerance_absorbs_small_inversions() {
        let mut cfg = DetectorConfig::default();
        cfg.ladder_tolerance = dec!(0.06);
        let markets = vec![
            threshold_market("m90", Comparator::Gt, dec!(90000), dec!(0.40)),
            threshold_market("m100", Comparator::Gt, dec!(100000), dec!(0.45)),
        ];
        let opps = LadderDetector::new(cfg).detect(&markets).unwrap();
        assert!(opps.is_empty());
    }

    #[test]
    fn test_mixed_comparators_do_not_group() {
        let markets = vec![
            threshold_market("m90", Comparator::Gt, dec!(90000), dec!(0.40)),
            threshold_market("m100", Comparator::Lt, dec!(100000), dec!(0.45)),
        ];
        let opps = LadderDetector::new(DetectorConfig::default())
            .detect(&markets)
            .unwrap();
        assert!(opps.is_empty());
    }

    #[test]
    fn test_markets_without_thresholds_ignored() {
        let mut m = threshold_market("m", Comparator::Gt, dec!(90000), dec!(0.40));
        m.comparator = None;
        m.threshold = None;
        m.question = "Will something trade higher?".to_string();
        let opps = LadderDetector::new(DetectorConfig::default())
            .detect(&[m])
            .unwrap();
        assert!(opps.is_empty());
    }
}
