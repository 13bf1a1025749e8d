//! Exclusive-sum detector: prices of mutually exclusive outcomes must sum
//! to ~1.
//!
//! On markets with three or more outcomes, a sum below 1 means the whole
//! book can be bought at a discount; a sum above 1 means it can be sold at a
//! premium.

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::debug;

use paper_arb_core::{
    Detector, DetectorConfig, Market, Opportunity, OpportunityKind, Side, TradeAction,
};

/// Detects multi-outcome markets whose prices do not sum to 1.
#[derive(Debug)]
pub struct ExclusiveSumDetector {
    config: DetectorConfig,
}

impl ExclusiveSumDetector {
    /// Creates an exclusive-sum detector.
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

impl Detector for ExclusiveSumDetector {
    fn name(&self) -> &'static str {
        "exclusive_sum"
    }

    fn detect(&mut self, markets: &[Market]) -> Result<Vec<Opportunity>> {
        let mut opps = Vec::new();

        for market in markets {
            if market.outcomes.len() < 3 {
                continue;
            }

            let total = market.outcome_sum();
            let deviation = (Decimal::ONE - total).abs();
            if deviation <= self.config.exclusive_sum_tolerance {
                continue;
            }

            let side = if total < Decimal::ONE { Side::Buy } else { Side::Sell };
            let amount = Decimal::ONE / Decimal::from(market.outcomes.len());

            debug!(
                market = %market.id,
                total = %total,
                side = %side,
                "exclusive-sum violation"
            );

            let actions = market
                .outcomes
                .iter()
                .map(|o| TradeAction::new(&market.id, &o.id, side, amount, o.price))
                .collect();

            let mut opp = Opportunity {
                kind: OpportunityKind::ExclusiveSum,
                market_ids: vec![market.id.clone()],
                description: format!("Outcome sum {total:.3} deviates from 1"),
                net_edge: deviation,
                actions,
                metadata: Default::default(),
            };
            opp.set_meta_decimal("total", total);
            opps.push(opp);
        }

        Ok(opps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paper_arb_core::{Outcome, Venue};
    use rust_decimal_macros::dec;

    fn multi(id: &str, prices: &[Decimal]) -> Market {
        Market {
            id: id.to_string(),
            question: "Which bucket?".to_string(),
            outcomes: prices
                .iter()
                .enumerate()
                .map(|(i, &p)| Outcome::new(format!("o{i}"), format!("Option {i}"), p))
                .collect(),
            end_date: None,
            liquidity: dec!(8000),
            volume: dec!(500),
            tags: vec![],
            description: None,
            comparator: None,
            threshold: None,
            asset: None,
            resolution_source: None,
            venue: Venue::Polymarket,
        }
    }

    fn detector(tolerance: Decimal) -> ExclusiveSumDetector {
        let mut cfg = DetectorConfig::default();
        cfg.exclusive_sum_tolerance = tolerance;
        ExclusiveSumDetector::new(cfg)
    }

    #[test]
    fn test_underpriced_book_buys_every_leg() {
        // Sum = 0.85, tolerance 0.02.
        let m = multi("m", &[dec!(0.20), dec!(0.25), dec!(0.30), dec!(0.10)]);
        let opps = detector(dec!(0.02)).detect(&[m]).unwrap();

        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.kind, OpportunityKind::ExclusiveSum);
        assert_eq!(opp.net_edge, dec!(0.15));
        assert_eq!(opp.actions.len(), 4);
        assert!(opp.actions.iter().all(|a| a.side == Side::Buy));
        assert!(opp.actions.iter().all(|a| a.amount == dec!(0.25)));
    }

    #[test]
    fn test_overpriced_book_sells_every_leg() {
        let m = multi("m", &[dec!(0.40), dec!(0.40), dec!(0.35)]);
        let opps = detector(dec!(0.03)).detect(&[m]).unwrap();

        assert_eq!(opps.len(), 1);
        assert!(opps[0].actions.iter().all(|a| a.side == Side::Sell));
        assert_eq!(opps[0].net_edge, dec!(0.15));
    }

    #[test]
    fn test_deviation_exceeds_tolerance_invariant() {
        let m = multi("m", &[dec!(0.30), dec!(0.30), dec!(0.38)]);
        let opps = detector(dec!(0.03)).detect(&[m]).unwrap();
        // Deviation 0.02 is inside tolerance.
        assert!(opps.is_empty());
    }

    #[test]
    fn test_binary_markets_skipped() {
        let m = multi("m", &[dec!(0.40), dec!(0.40)]);
        let opps = detector(dec!(0.02)).detect(&[m]).unwrap();
        assert!(opps.is_empty());
    }
}
