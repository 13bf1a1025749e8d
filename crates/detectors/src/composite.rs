//! Composite detector: a compound event can never outprice its prerequisite.
//!
//! "Wins the championship" implies "wins the semifinal", so
//! P(championship) <= P(semifinal). A closed table of regex pairs and
//! keyword hierarchies identifies such prerequisite relationships in
//! question text; the regex table is consulted first and the first match
//! wins.

use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

use paper_arb_core::{
    Detector, DetectorConfig, Market, Opportunity, OpportunityKind, Side, TradeAction,
};

/// Keyword hierarchies: later entries are more specific. A question holding
/// the map key is composite relative to one holding an earlier entry.
const HIERARCHY_KEYWORDS: &[(&str, &[&str])] = &[
    ("championship", &["final", "semifinal", "championship", "tournament"]),
    ("final", &["semifinal", "final"]),
    ("semifinal", &["quarterfinal", "semifinal"]),
    ("president", &["primary", "election", "president"]),
    ("elected", &["nominated", "elected"]),
    ("win", &["reach", "advance", "qualify", "win"]),
];

/// Regex pairs: (composite pattern, component pattern).
const COMPOSITE_PATTERNS: &[(&str, &str)] = &[
    (r"win.*championship", r"win.*final"),
    (r"win.*championship", r"win.*semifinal"),
    (r"win.*final", r"win.*semifinal"),
    (r"win.*semifinal", r"win.*quarterfinal"),
    (r"become.*president", r"win.*primary"),
    (r"become.*president", r"win.*election"),
    (r"elected.*president", r"nominated"),
    (r"reach.*final", r"win.*semifinal"),
];

fn compiled_patterns() -> &'static Vec<(Regex, Regex)> {
    static PATTERNS: OnceLock<Vec<(Regex, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        COMPOSITE_PATTERNS
            .iter()
            .map(|(composite, component)| {
                (
                    Regex::new(composite).expect("composite pattern is valid"),
                    Regex::new(component).expect("component pattern is valid"),
                )
            })
            .collect()
    })
}

/// Detects composite events priced above their prerequisites.
#[derive(Debug)]
pub struct CompositeDetector {
    config: DetectorConfig,
}

impl CompositeDetector {
    /// Creates a composite detector.
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Orders a market pair as (composite, component) with the matched
    /// labels, or `None` when no hierarchy applies.
    fn find_hierarchy<'a>(
        m1: &'a Market,
        m2: &'a Market,
    ) -> Option<(&'a Market, &'a Market, (String, String))> {
        let q1 = m1.question.to_lowercase();
        let q2 = m2.question.to_lowercase();

        for (composite_re, component_re) in compiled_patterns() {
            if composite_re.is_match(&q1) && component_re.is_match(&q2) {
                return Some((
                    m1,
                    m2,
                    (composite_re.as_str().to_string(), component_re.as_str().to_string()),
                ));
            }
            if composite_re.is_match(&q2) && component_re.is_match(&q1) {
                return Some((
                    m2,
                    m1,
                    (composite_re.as_str().to_string(), component_re.as_str().to_string()),
                ));
            }
        }

        for (composite_kw, hierarchy) in HIERARCHY_KEYWORDS {
            let rank = |kw: &str| hierarchy.iter().position(|h| *h == kw);
            let composite_rank = rank(composite_kw)?;

            for (holder, other) in [(&q1, &q2), (&q2, &q1)] {
                if !holder.contains(composite_kw) {
                    continue;
                }
                for component_kw in *hierarchy {
                    if component_kw == composite_kw || !other.contains(component_kw) {
                        continue;
                    }
                    if let Some(component_rank) = rank(component_kw) {
                        if composite_rank > component_rank {
                            let (composite, component) = if std::ptr::eq(holder, &q1) {
                                (m1, m2)
                            } else {
                                (m2, m1)
                            };
                            return Some((
                                composite,
                                component,
                                ((*composite_kw).to_string(), (*component_kw).to_string()),
                            ));
                        }
                    }
                }
            }
        }

        None
    }
}

impl Detector for CompositeDetector {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn detect(&mut self, markets: &[Market]) -> Result<Vec<Opportunity>> {
        let mut opps = Vec::new();

        for i in 0..markets.len() {
            for j in (i + 1)..markets.len() {
                let Some((composite, component, relation)) =
                    Self::find_hierarchy(&markets[i], &markets[j])
                else {
                    continue;
                };

                let (Some(comp_yes), Some(part_yes)) =
                    (composite.yes_outcome(), component.yes_outcome())
                else {
                    continue;
                };

                let violation = comp_yes.price - part_yes.price;
                if violation <= self.config.composite_tolerance {
                    continue;
                }

                debug!(
                    composite = %composite.id,
                    component = %component.id,
                    violation = %violation,
                    "composite outprices prerequisite"
                );

                let mut opp = Opportunity {
                    kind: OpportunityKind::Composite,
                    market_ids: vec![composite.id.clone(), component.id.clone()],
                    description: format!(
                        "Composite violation: P({})={:.3} > P({})={:.3}",
                        relation.0, comp_yes.price, relation.1, part_yes.price
                    ),
                    net_edge: violation,
                    actions: vec![
                        TradeAction::new(
                            &composite.id,
                            &comp_yes.id,
                            Side::Sell,
                            Decimal::ONE,
                            comp_yes.price,
                        ),
                        TradeAction::new(
                            &component.id,
                            &part_yes.id,
                            Side::Buy,
                            Decimal::ONE,
                            part_yes.price,
                        ),
                    ],
                    metadata: Default::default(),
                };
                opp.set_meta_decimal("violation_size", violation);
                opp.metadata.insert(
                    "relationship".to_string(),
                    serde_json::json!([relation.0, relation.1]),
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

    fn market(id: &str, question: &str, yes: Decimal) -> Market {
        Market {
            id: id.to_string(),
            question: question.to_string(),
            outcomes: vec![
                Outcome::new("y", "Yes", yes),
                Outcome::new("n", "No", Decimal::ONE - yes),
            ],
            end_date: None,
            liquidity: dec!(6000),
            volume: dec!(300),
            tags: vec![],
            description: None,
            comparator: None,
            threshold: None,
            asset: None,
            resolution_source: None,
            venue: Venue::Polymarket,
        }
    }

    fn detector() -> CompositeDetector {
        CompositeDetector::new(DetectorConfig::default())
    }

    #[test]
    fn test_championship_requires_semifinal() {
        let markets = vec![
            market("champ", "Will the Wolves win the championship?", dec!(0.40)),
            market("semi", "Will the Wolves win the semifinal?", dec!(0.30)),
        ];
        let opps = detector().detect(&markets).unwrap();

        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.kind, OpportunityKind::Composite);
        assert_eq!(opp.net_edge, dec!(0.10));
        assert_eq!(opp.actions[0].market_id, "champ");
        assert_eq!(opp.actions[0].side, Side::Sell);
        assert_eq!(opp.actions[1].market_id, "semi");
        assert_eq!(opp.actions[1].side, Side::Buy);
    }

    #[test]
    fn test_order_of_inputs_irrelevant() {
        let markets = vec![
            market("semi", "Will the Wolves win the semifinal?", dec!(0.30)),
            market("champ", "Will the Wolves win the championship?", dec!(0.40)),
        ];
        let opps = detector().detect(&markets).unwrap();
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].actions[0].market_id, "champ");
    }

    #[test]
    fn test_correctly_priced_hierarchy_is_quiet() {
        let markets = vec![
            market("champ", "Will the Wolves win the championship?", dec!(0.25)),
            market("semi", "Will the Wolves win the semifinal?", dec!(0.45)),
        ];
        let opps = detector().detect(&markets).unwrap();
        assert!(opps.is_empty());
    }

    #[test]
    fn test_violation_inside_tolerance_is_quiet() {
        let markets = vec![
            market("champ", "Will the Wolves win the championship?", dec!(0.315)),
            market("semi", "Will the Wolves win the semifinal?", dec!(0.30)),
        ];
        let opps = detector().detect(&markets).unwrap();
        assert!(opps.is_empty());
    }

    #[test]
    fn test_president_primary_hierarchy() {
        let markets = vec![
            market("pres", "Will the senator become president?", dec!(0.35)),
            market("prim", "Will the senator win the primary?", dec!(0.25)),
        ];
        let opps = detector().detect(&markets).unwrap();
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].actions[0].market_id, "pres");
    }

    #[test]
    fn test_unrelated_questions_no_match() {
        let markets = vec![
            market("m1", "Will BTC close above 90k?", dec!(0.60)),
            market("m2", "Will ETH close above 5k?", dec!(0.40)),
        ];
        let opps = detector().detect(&markets).unwrap();
        assert!(opps.is_empty());
    }
}
