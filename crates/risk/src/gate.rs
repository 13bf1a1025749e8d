//! The risk gate.
//!
//! Ten rules evaluated in strict order; the first failure wins and is
//! logged. A rejection is telemetry, not an error - the engine counts it
//! and moves on. Approval increments a session counter so sequential
//! opportunities inside one iteration cannot blow past the position cap
//! together.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;

use paper_arb_core::{
    MarketLookup, Opportunity, OpportunityKind, PositionBook, RiskConfig, Side,
};

// =============================================================================
// Rejection Reasons
// =============================================================================

/// Structured rejection emitted by the gate, in rule order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskRejection {
    /// DUPLICATE opportunities are disabled without short-selling support.
    DuplicateDisabled,
    /// A SELL leg has no inventory behind it.
    SellWithoutInventory {
        market_id: String,
        outcome_id: String,
    },
    /// A SELL leg asks for more than the held quantity.
    SellExceedsInventory {
        market_id: String,
        outcome_id: String,
    },
    /// The same outcome appears on both sides within one opportunity.
    WashTrade {
        market_id: String,
        outcome_id: String,
    },
    /// Net edge below the configured minimum.
    NetEdgeBelowMinimum,
    /// Gross edge below the configured minimum.
    GrossEdgeBelowMinimum,
    /// A BUY leg priced under the micro-price floor.
    BuyPriceBelowMinimum { market_id: String },
    /// Not enough book depth behind a BUY leg.
    InsufficientBuyLiquidity { market_id: String },
    /// An opportunity leg references a market missing from the snapshot.
    UnknownMarket { market_id: String },
    /// A referenced market expires inside the minimum horizon.
    ExpiryTooSoon { market_id: String },
    /// The open-position cap would be breached.
    MaxOpenPositions,
    /// A referenced market sits under the liquidity floor.
    LiquidityFloor { market_id: String },
    /// Estimated cost exceeds the per-market allocation cap.
    AllocationExceeded,
}

impl RiskRejection {
    /// Stable code for telemetry and trace records.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DuplicateDisabled => "duplicate_disabled",
            Self::SellWithoutInventory { .. } => "sell_without_inventory",
            Self::SellExceedsInventory { .. } => "sell_exceeds_inventory",
            Self::WashTrade { .. } => "wash_trade",
            Self::NetEdgeBelowMinimum => "net_edge_below_minimum",
            Self::GrossEdgeBelowMinimum => "gross_edge_below_minimum",
            Self::BuyPriceBelowMinimum { .. } => "buy_price_below_minimum",
            Self::InsufficientBuyLiquidity { .. } => "insufficient_buy_liquidity",
            Self::UnknownMarket { .. } => "unknown_market",
            Self::ExpiryTooSoon { .. } => "expiry_too_soon",
            Self::MaxOpenPositions => "max_open_positions",
            Self::LiquidityFloor { .. } => "liquidity_floor",
            Self::AllocationExceeded => "allocation_exceeded",
        }
    }
}

impl std::fmt::Display for RiskRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SellWithoutInventory {
                market_id,
                outcome_id,
            }
            | Self::SellExceedsInventory {
                market_id,
                outcome_id,
            }
            | Self::WashTrade {
                market_id,
                outcome_id,
            } => write!(f, "{} ({market_id}:{outcome_id})", self.code()),
            Self::BuyPriceBelowMinimum { market_id }
            | Self::InsufficientBuyLiquidity { market_id }
            | Self::UnknownMarket { market_id }
            | Self::ExpiryTooSoon { market_id }
            | Self::LiquidityFloor { market_id } => write!(f, "{} ({market_id})", self.code()),
            _ => write!(f, "{}", self.code()),
        }
    }
}

// =============================================================================
// Risk Gate
// =============================================================================

/// Approves or rejects opportunities against broker state.
#[derive(Debug)]
pub struct RiskGate {
    config: RiskConfig,
    approved_this_session: usize,
}

impl RiskGate {
    /// Creates a gate with a zeroed session counter.
    #[must_use]
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            approved_this_session: 0,
        }
    }

    /// Approvals granted since construction.
    #[must_use]
    pub const fn approved_this_session(&self) -> usize {
        self.approved_this_session
    }

    /// Evaluates an opportunity against the current clock.
    ///
    /// # Errors
    ///
    /// Returns the first failing rule as a [`RiskRejection`]. Rejections are
    /// expected control flow; every verdict is logged with its reason code.
    pub fn approve(
        &mut self,
        lookup: &MarketLookup<'_>,
        opp: &Opportunity,
        positions: &PositionBook,
        cash: Decimal,
    ) -> Result<(), RiskRejection> {
        self.approve_at(lookup, opp, positions, cash, Utc::now())
    }

    /// Evaluation against an explicit clock; `approve` passes `Utc::now()`.
    pub fn approve_at(
        &mut self,
        lookup: &MarketLookup<'_>,
        opp: &Opportunity,
        positions: &PositionBook,
        cash: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), RiskRejection> {
        let verdict = self.evaluate(lookup, opp, positions, cash, now);
        match &verdict {
            Ok(()) => {
                self.approved_this_session += 1;
                info!(
                    kind = %opp.kind,
                    net_edge = %opp.net_edge,
                    description = %opp.description,
                    "risk gate approved opportunity"
                );
            }
            Err(rejection) => {
                info!(
                    kind = %opp.kind,
                    reason = rejection.code(),
                    detail = %rejection,
                    "risk gate rejected opportunity"
                );
            }
        }
        verdict
    }

    #[allow(clippy::too_many_lines)]
    fn evaluate(
        &self,
        lookup: &MarketLookup<'_>,
        opp: &Opportunity,
        positions: &PositionBook,
        cash: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), RiskRejection> {
        let cfg = &self.config;

        // Rule 1: DUPLICATE needs a short leg; without shorting it is dead.
        if opp.kind == OpportunityKind::Duplicate && !cfg.short_selling_available {
            return Err(RiskRejection::DuplicateDisabled);
        }

        // Rule 2: every SELL leg is covered by inventory.
        for action in &opp.actions {
            if action.side != Side::Sell {
                continue;
            }
            let inventory = positions.quantity(&action.market_id, &action.outcome_id);
            if inventory <= Decimal::ZERO {
                return Err(RiskRejection::SellWithoutInventory {
                    market_id: action.market_id.clone(),
                    outcome_id: action.outcome_id.clone(),
                });
            }
            if action.amount > inventory {
                return Err(RiskRejection::SellExceedsInventory {
                    market_id: action.market_id.clone(),
                    outcome_id: action.outcome_id.clone(),
                });
            }
        }

        // Rule 3: no outcome bought and sold inside one opportunity.
        for (i, a) in opp.actions.iter().enumerate() {
            for b in &opp.actions[i + 1..] {
                if a.market_id == b.market_id
                    && a.outcome_id == b.outcome_id
                    && a.side != b.side
                {
                    return Err(RiskRejection::WashTrade {
                        market_id: a.market_id.clone(),
                        outcome_id: a.outcome_id.clone(),
                    });
                }
            }
        }

        // Rule 4: minimum net edge.
        if opp.net_edge < cfg.min_net_edge_threshold {
            return Err(RiskRejection::NetEdgeBelowMinimum);
        }

        // Rule 5: minimum gross edge, when configured.
        if cfg.min_gross_edge > Decimal::ZERO && opp.gross_edge() < cfg.min_gross_edge {
            return Err(RiskRejection::GrossEdgeBelowMinimum);
        }

        // Rule 6: micro-price filter on BUY legs.
        for action in &opp.actions {
            if action.side == Side::Buy && action.limit_price < cfg.min_buy_price {
                return Err(RiskRejection::BuyPriceBelowMinimum {
                    market_id: action.market_id.clone(),
                });
            }
        }

        // Rule 7: depth behind every BUY leg.
        for action in &opp.actions {
            if action.side != Side::Buy {
                continue;
            }
            let Some(market) = lookup.get(action.market_id.as_str()) else {
                return Err(RiskRejection::UnknownMarket {
                    market_id: action.market_id.clone(),
                });
            };
            let per_outcome_liquidity =
                market.liquidity / Decimal::from(market.outcomes.len().max(1));
            let required = action.limit_price * action.amount * cfg.min_liquidity_multiple;
            if per_outcome_liquidity < required {
                return Err(RiskRejection::InsufficientBuyLiquidity {
                    market_id: action.market_id.clone(),
                });
            }
        }

        // Rule 8: expiry horizon.
        if cfg.min_expiry_hours > 0 {
            let horizon = Duration::hours(cfg.min_expiry_hours);
            for market_id in &opp.market_ids {
                let Some(market) = lookup.get(market_id.as_str()) else {
                    continue;
                };
                if let Some(end_date) = market.end_date {
                    if end_date - now < horizon {
                        return Err(RiskRejection::ExpiryTooSoon {
                            market_id: market_id.clone(),
                        });
                    }
                }
            }
        }

        // Rule 9: open-position cap, counting this session's approvals.
        let tentative_open = positions.nonzero_count() + self.approved_this_session;
        if tentative_open >= cfg.max_open_positions {
            return Err(RiskRejection::MaxOpenPositions);
        }

        // Rule 10: per-market liquidity floor and allocation cap.
        for market_id in &opp.market_ids {
            let Some(market) = lookup.get(market_id.as_str()) else {
                continue;
            };
            if market.liquidity < cfg.min_liquidity_usd {
                return Err(RiskRejection::LiquidityFloor {
                    market_id: market_id.clone(),
                });
            }
        }

        let total_equity = cash + mark_to_market(positions, lookup);
        let max_per_market = total_equity * cfg.max_allocation_per_market;
        let estimated_cost: Decimal = opp
            .actions
            .iter()
            .map(|a| a.limit_price * a.amount)
            .sum();
        if estimated_cost > max_per_market {
            return Err(RiskRejection::AllocationExceeded);
        }

        Ok(())
    }
}

/// Current value of all held positions at snapshot prices.
fn mark_to_market(positions: &PositionBook, lookup: &MarketLookup<'_>) -> Decimal {
    let mut value = Decimal::ZERO;
    for ((market_id, outcome_id), qty) in positions.iter() {
        if qty.is_zero() {
            continue;
        }
        let Some(market) = lookup.get(market_id.as_str()) else {
            continue;
        };
        if let Some(outcome) = market.outcomes.iter().find(|o| &o.id == outcome_id) {
            value += *qty * outcome.price;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use paper_arb_core::{market_lookup, Market, Outcome, TradeAction, Venue};
    use rust_decimal_macros::dec;

    fn market(id: &str, liquidity: Decimal, hours_to_expiry: i64) -> Market {
        Market {
            id: id.to_string(),
            question: "q".to_string(),
            outcomes: vec![
                Outcome::new("y", "Yes", dec!(0.45)),
                Outcome::new("n", "No", dec!(0.45)),
            ],
            end_date: Some(Utc::now() + Duration::hours(hours_to_expiry)),
            liquidity,
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

    fn parity_opp(market_id: &str) -> Opportunity {
        let mut opp = Opportunity {
            kind: OpportunityKind::Parity,
            market_ids: vec![market_id.to_string()],
            description: "parity".to_string(),
            net_edge: dec!(0.0973),
            actions: vec![
                TradeAction::new(market_id, "y", Side::Buy, Decimal::ONE, dec!(0.45)),
                TradeAction::new(market_id, "n", Side::Buy, Decimal::ONE, dec!(0.45)),
            ],
            metadata: Default::default(),
        };
        opp.set_meta_decimal("gross_edge", dec!(0.10));
        opp
    }

    fn gate() -> RiskGate {
        RiskGate::new(RiskConfig::default())
    }

    #[test]
    fn test_clean_parity_approved() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);
        let mut gate = gate();
        let verdict = gate.approve(&lookup, &parity_opp("m"), &PositionBook::new(), dec!(10000));
        assert!(verdict.is_ok());
        assert_eq!(gate.approved_this_session(), 1);
    }

    #[test]
    fn test_duplicate_disabled_without_shorting() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);
        let mut opp = parity_opp("m");
        opp.kind = OpportunityKind::Duplicate;

        let verdict = gate().approve(&lookup, &opp, &PositionBook::new(), dec!(10000));
        assert_eq!(verdict, Err(RiskRejection::DuplicateDisabled));
    }

    #[test]
    fn test_duplicate_allowed_with_shorting_enabled() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);
        let mut cfg = RiskConfig::default();
        cfg.short_selling_available = true;
        let mut gate = RiskGate::new(cfg);
        let mut opp = parity_opp("m");
        opp.kind = OpportunityKind::Duplicate;

        assert!(gate.approve(&lookup, &opp, &PositionBook::new(), dec!(10000)).is_ok());
    }

    #[test]
    fn test_sell_without_inventory_rejected() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);
        let mut opp = parity_opp("m");
        opp.actions[0].side = Side::Sell;
        opp.actions[0].outcome_id = "y".to_string();
        opp.actions[1].outcome_id = "n".to_string();

        let verdict = gate().approve(&lookup, &opp, &PositionBook::new(), dec!(10000));
        assert_eq!(
            verdict,
            Err(RiskRejection::SellWithoutInventory {
                market_id: "m".to_string(),
                outcome_id: "y".to_string(),
            })
        );
    }

    #[test]
    fn test_sell_exceeding_inventory_rejected() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);
        let mut book = PositionBook::new();
        book.apply("m", "y", dec!(0.4));
        let mut opp = parity_opp("m");
        opp.actions[0].side = Side::Sell;

        let verdict = gate().approve(&lookup, &opp, &book, dec!(10000));
        assert_eq!(
            verdict,
            Err(RiskRejection::SellExceedsInventory {
                market_id: "m".to_string(),
                outcome_id: "y".to_string(),
            })
        );
    }

    #[test]
    fn test_sell_covered_by_inventory_passes_rule_two() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);
        let mut book = PositionBook::new();
        book.apply("m", "y", dec!(5));
        let mut opp = parity_opp("m");
        opp.actions[0].side = Side::Sell;

        assert!(gate().approve(&lookup, &opp, &book, dec!(10000)).is_ok());
    }

    #[test]
    fn test_wash_trade_rejected() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);
        let mut book = PositionBook::new();
        book.apply("m", "y", dec!(5));
        let mut opp = parity_opp("m");
        opp.actions[1] = TradeAction::new("m", "y", Side::Sell, Decimal::ONE, dec!(0.45));

        let verdict = gate().approve(&lookup, &opp, &book, dec!(10000));
        assert_eq!(
            verdict,
            Err(RiskRejection::WashTrade {
                market_id: "m".to_string(),
                outcome_id: "y".to_string(),
            })
        );
    }

    #[test]
    fn test_net_edge_floor() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);
        let mut opp = parity_opp("m");
        opp.net_edge = dec!(0.001);

        let verdict = gate().approve(&lookup, &opp, &PositionBook::new(), dec!(10000));
        assert_eq!(verdict, Err(RiskRejection::NetEdgeBelowMinimum));
    }

    #[test]
    fn test_gross_edge_floor() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);
        let mut opp = parity_opp("m");
        opp.set_meta_decimal("gross_edge", dec!(0.02));

        let verdict = gate().approve(&lookup, &opp, &PositionBook::new(), dec!(10000));
        assert_eq!(verdict, Err(RiskRejection::GrossEdgeBelowMinimum));
    }

    #[test]
    fn test_micro_price_filter() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);
        let mut opp = parity_opp("m");
        opp.actions[0].limit_price = dec!(0.01);

        let verdict = gate().approve(&lookup, &opp, &PositionBook::new(), dec!(10000));
        assert_eq!(
            verdict,
            Err(RiskRejection::BuyPriceBelowMinimum {
                market_id: "m".to_string()
            })
        );
    }

    #[test]
    fn test_buy_liquidity_multiple() {
        // Per-outcome liquidity 1 vs required 3 * 0.45 * 1.
        let markets = vec![market("m", dec!(2), 72)];
        let lookup = market_lookup(&markets);

        let verdict = gate().approve(&lookup, &parity_opp("m"), &PositionBook::new(), dec!(10000));
        assert_eq!(
            verdict,
            Err(RiskRejection::InsufficientBuyLiquidity {
                market_id: "m".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_market_rejected() {
        let lookup = MarketLookup::new();

        let verdict = gate().approve(&lookup, &parity_opp("ghost"), &PositionBook::new(), dec!(10000));
        assert_eq!(
            verdict,
            Err(RiskRejection::UnknownMarket {
                market_id: "ghost".to_string()
            })
        );
    }

    #[test]
    fn test_expiry_horizon() {
        let markets = vec![market("m", dec!(10000), 3)];
        let lookup = market_lookup(&markets);

        let verdict = gate().approve(&lookup, &parity_opp("m"), &PositionBook::new(), dec!(10000));
        assert_eq!(
            verdict,
            Err(RiskRejection::ExpiryTooSoon {
                market_id: "m".to_string()
            })
        );
    }

    #[test]
    fn test_expiry_check_disabled_at_zero() {
        let markets = vec![market("m", dec!(10000), 3)];
        let lookup = market_lookup(&markets);
        let mut cfg = RiskConfig::default();
        cfg.min_expiry_hours = 0;
        let mut gate = RiskGate::new(cfg);

        assert!(gate.approve(&lookup, &parity_opp("m"), &PositionBook::new(), dec!(10000)).is_ok());
    }

    #[test]
    fn test_max_open_positions_counts_session_approvals() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);
        let mut cfg = RiskConfig::default();
        cfg.max_open_positions = 2;
        let mut gate = RiskGate::new(cfg);
        let book = PositionBook::new();

        assert!(gate.approve(&lookup, &parity_opp("m"), &book, dec!(10000)).is_ok());
        assert!(gate.approve(&lookup, &parity_opp("m"), &book, dec!(10000)).is_ok());
        let verdict = gate.approve(&lookup, &parity_opp("m"), &book, dec!(10000));
        assert_eq!(verdict, Err(RiskRejection::MaxOpenPositions));
    }

    #[test]
    fn test_liquidity_floor() {
        let markets = vec![market("m", dec!(100), 72)];
        let lookup = market_lookup(&markets);
        let mut cfg = RiskConfig::default();
        // Depth multiple passes at 100 liquidity, floor does not.
        cfg.min_liquidity_multiple = dec!(0);
        let mut gate = RiskGate::new(cfg);

        let verdict = gate.approve(&lookup, &parity_opp("m"), &PositionBook::new(), dec!(10000));
        assert_eq!(
            verdict,
            Err(RiskRejection::LiquidityFloor {
                market_id: "m".to_string()
            })
        );
    }

    #[test]
    fn test_allocation_cap() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);

        // Cost 0.90 vs cap 10 * 0.05 = 0.50.
        let verdict = gate().approve(&lookup, &parity_opp("m"), &PositionBook::new(), dec!(10));
        assert_eq!(verdict, Err(RiskRejection::AllocationExceeded));
    }

    #[test]
    fn test_equity_includes_marked_positions() {
        let markets = vec![market("m", dec!(10000), 72)];
        let lookup = market_lookup(&markets);
        let mut book = PositionBook::new();
        // 20 units at 0.45 add 9 to equity: cap 0.05 * (10 + 9) = 0.95 > 0.90.
        book.apply("m", "y", dec!(20));

        let verdict = gate().approve(&lookup, &parity_opp("m"), &book, dec!(10));
        assert!(verdict.is_ok());
    }

    #[test]
    fn test_rejection_codes_are_stable() {
        assert_eq!(RiskRejection::DuplicateDisabled.code(), "duplicate_disabled");
        assert_eq!(RiskRejection::MaxOpenPositions.code(), "max_open_positions");
        assert_eq!(
            RiskRejection::UnknownMarket {
                market_id: "x".to_string()
            }
            .code(),
            "unknown_market"
        );
    }
}
