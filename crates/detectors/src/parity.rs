//! Parity detector: YES + NO on a binary market should cost ~1.
//!
//! When the two legs together cost meaningfully less than a dollar, buying
//! both locks in the gap. Edge is computed net of modeled fees and slippage
//! so marginal violations below cost never surface.

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use paper_arb_core::{
    BrokerConfig, Detector, DetectorConfig, Market, Opportunity, OpportunityKind, Side, TradeAction,
};

const BPS: Decimal = dec!(10000);

/// Detects binary markets whose YES+NO cost sits below parity.
#[derive(Debug)]
pub struct ParityDetector {
    config: DetectorConfig,
    broker: BrokerConfig,
}

impl ParityDetector {
    /// Creates a parity detector. Broker settings supply the fee model.
    #[must_use]
    pub fn new(config: DetectorConfig, broker: BrokerConfig) -> Self {
        Self { config, broker }
    }
}

impl Detector for ParityDetector {
    fn name(&self) -> &'static str {
        "parity"
    }

    fn detect(&mut self, markets: &[Market]) -> Result<Vec<Opportunity>> {
        let mut opps = Vec::new();

        for market in markets {
            let (Some(yes), Some(no)) = (market.outcome_by_label("yes"), market.outcome_by_label("no"))
            else {
                continue;
            };

            let gross_cost = yes.price + no.price;
            if gross_cost >= self.config.parity_threshold {
                continue;
            }

            let fees = gross_cost * self.broker.fee_bps / BPS;
            let slippage = gross_cost * self.broker.slippage_bps / BPS;
            let net_edge = Decimal::ONE - (gross_cost + fees + slippage);
            if net_edge <= Decimal::ZERO {
                continue;
            }

            debug!(
                market = %market.id,
                gross_cost = %gross_cost,
                net_edge = %net_edge,
                "parity violation"
            );

            let mut opp = Opportunity {
                kind: OpportunityKind::Parity,
                market_ids: vec![market.id.clone()],
                description: format!(
                    "Yes+No={:.4} net_edge={:.4}",
                    gross_cost, net_edge
                ),
                net_edge,
                actions: vec![
                    TradeAction::new(&market.id, &yes.id, Side::Buy, Decimal::ONE, yes.price),
                    TradeAction::new(&market.id, &no.id, Side::Buy, Decimal::ONE, no.price),
                ],
                metadata: Default::default(),
            };
            opp.set_meta_decimal("gross_cost", gross_cost);
            opp.set_meta_decimal("gross_edge", Decimal::ONE - gross_cost);
            opps.push(opp);
        }

        Ok(opps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paper_arb_core::{Outcome, Venue};

    fn binary(id: &str, yes: Decimal, no: Decimal) -> Market {
        Market {
            id: id.to_string(),
            question: "Will it happen?".to_string(),
            outcomes: vec![Outcome::new("y", "Yes", yes), Outcome::new("n", "No", no)],
            end_date: None,
            liquidity: dec!(10000),
            volume: dec!(1000),
            tags: vec![],
            description: None,
            comparator: None,
            threshold: None,
            asset: None,
            resolution_source: None,
            venue: Venue::Polymarket,
        }
    }

    fn detector() -> ParityDetector {
        ParityDetector::new(DetectorConfig::default(), BrokerConfig::default())
    }

    #[test]
    fn test_detects_cheap_parity() {
        let opps = detector().detect(&[binary("m", dec!(0.45), dec!(0.45))]).unwrap();
        assert_eq!(opps.len(), 1);

        let opp = &opps[0];
        assert_eq!(opp.kind, OpportunityKind::Parity);
        // 1 - (0.90 + 0.90 * 0.0030) = 0.0973
        assert_eq!(opp.net_edge, dec!(0.0973));
        assert_eq!(opp.actions.len(), 2);
        assert!(opp.actions.iter().all(|a| a.side == Side::Buy));
    }

    #[test]
    fn test_gross_cost_plus_costs_stays_below_one() {
        let opps = detector().detect(&[binary("m", dec!(0.45), dec!(0.45))]).unwrap();
        let opp = &opps[0];
        let gross: Decimal = "0.90".parse().unwrap();
        let costs = gross * dec!(0.003);
        assert!(gross + costs < Decimal::ONE);
        assert!(opp.net_edge > Decimal::ZERO);
    }

    #[test]
    fn test_ignores_fair_parity() {
        let opps = detector().detect(&[binary("m", dec!(0.50), dec!(0.50))]).unwrap();
        assert!(opps.is_empty());
    }

    #[test]
    fn test_ignores_marginal_violation_eaten_by_costs() {
        // With 2% fee and 2% slippage, a 2% gross gap nets out negative.
        let mut cfg = DetectorConfig::default();
        cfg.parity_threshold = Decimal::ONE;
        let mut broker = BrokerConfig::default();
        broker.fee_bps = dec!(200);
        broker.slippage_bps = dec!(200);
        let opps = ParityDetector::new(cfg, broker)
            .detect(&[binary("m", dec!(0.50), dec!(0.48))])
            .unwrap();
        assert!(opps.is_empty());
    }

    #[test]
    fn test_ignores_non_binary_markets() {
        let mut m = binary("m", dec!(0.45), dec!(0.45));
        m.outcomes[0].label = "Above".to_string();
        let opps = detector().detect(&[m]).unwrap();
        assert!(opps.is_empty());
    }

    #[test]
    fn test_gross_edge_metadata_present() {
        let opps = detector().detect(&[binary("m", dec!(0.45), dec!(0.45))]).unwrap();
        assert_eq!(opps[0].gross_edge(), dec!(0.10));
    }
}
