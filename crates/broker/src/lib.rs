//! Paper-trading fill simulation.
//!
//! Simulates order fills against quoted liquidity without touching a venue:
//! a deterministic depth model caps the quantity, fees and slippage are
//! charged in basis points of notional, and every fill lands in an ordered
//! trade log with an equity sample. Partial fills are accepted silently;
//! refusals (no cash, no inventory) skip the action without error.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;
use uuid::Uuid;

use paper_arb_core::{
    BrokerConfig, MarketLookup, Opportunity, PositionBook, Side, Trade, TradeAction,
};

const BPS: Decimal = dec!(10000);
/// Guards the depth division against zero limit prices.
const MIN_PRICE_EPSILON: Decimal = dec!(0.000001);

/// Simulated broker holding cash, positions, and the trade log.
#[derive(Debug)]
pub struct PaperBroker {
    config: BrokerConfig,
    cash: Decimal,
    positions: PositionBook,
    trades: Vec<Trade>,
    equity_curve: Vec<Decimal>,
}

impl PaperBroker {
    /// Creates a broker with the configured starting cash.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        let cash = config.initial_cash;
        Self {
            config,
            cash,
            positions: PositionBook::new(),
            trades: Vec::new(),
            equity_curve: vec![cash],
        }
    }

    /// Current cash balance.
    #[must_use]
    pub const fn cash(&self) -> Decimal {
        self.cash
    }

    /// Current position book.
    #[must_use]
    pub const fn positions(&self) -> &PositionBook {
        &self.positions
    }

    /// Ordered log of every fill since construction.
    #[must_use]
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Equity samples, one per fill plus the starting balance.
    #[must_use]
    pub fn equity_curve(&self) -> &[Decimal] {
        &self.equity_curve
    }

    /// Cash plus positions marked at current snapshot prices.
    #[must_use]
    pub fn total_equity(&self, lookup: &MarketLookup<'_>) -> Decimal {
        self.cash + self.unrealized_value(lookup)
    }

    /// Deterministic depth model: the reachable quantity for one action.
    fn available_quantity(&self, market_liquidity: Decimal, outcomes: usize, action: &TradeAction) -> Decimal {
        let per_outcome_liquidity =
            market_liquidity * self.config.depth_fraction / Decimal::from(outcomes.max(1));
        per_outcome_liquidity / action.limit_price.max(MIN_PRICE_EPSILON)
    }

    /// Executes every leg of an opportunity, best effort.
    ///
    /// Legs that cannot fill (unknown market, zero depth, insufficient cash
    /// or inventory) are skipped; the rest fill at their limit price up to
    /// the depth cap. Returns the fills produced by this call.
    pub fn execute(&mut self, lookup: &MarketLookup<'_>, opportunity: &Opportunity) -> Vec<Trade> {
        let mut fills = Vec::new();

        for action in &opportunity.actions {
            let Some(market) = lookup.get(action.market_id.as_str()) else {
                continue;
            };

            let max_qty = self.available_quantity(market.liquidity, market.outcomes.len(), action);
            let mut qty = action.amount.min(max_qty);
            if action.side == Side::Sell {
                qty = qty.min(self.positions.quantity(&action.market_id, &action.outcome_id));
            }
            if qty <= Decimal::ZERO {
                debug!(
                    market = %action.market_id,
                    outcome = %action.outcome_id,
                    side = %action.side,
                    "action skipped: no fillable quantity"
                );
                continue;
            }

            let fee = action.limit_price * qty * self.config.fee_bps / BPS;
            let slippage = action.limit_price * qty * self.config.slippage_bps / BPS;

            let realized_pnl = match action.side {
                Side::Buy => {
                    let cost = action.limit_price * qty + fee + slippage;
                    if cost > self.cash {
                        debug!(
                            market = %action.market_id,
                            cost = %cost,
                            cash = %self.cash,
                            "buy skipped: insufficient cash"
                        );
                        continue;
                    }
                    self.cash -= cost;
                    self.positions.apply(&action.market_id, &action.outcome_id, qty);
                    -cost
                }
                Side::Sell => {
                    let proceeds = action.limit_price * qty - fee - slippage;
                    self.cash += proceeds;
                    self.positions.apply(&action.market_id, &action.outcome_id, -qty);
                    proceeds
                }
            };

            let trade = Trade {
                id: Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                market_id: action.market_id.clone(),
                outcome_id: action.outcome_id.clone(),
                side: action.side,
                amount_filled: qty,
                price: action.limit_price,
                fees: fee,
                slippage,
                realized_pnl,
            };
            debug!(
                trade_id = %trade.id,
                market = %trade.market_id,
                side = %trade.side,
                qty = %trade.amount_filled,
                price = %trade.price,
                "paper fill"
            );
            fills.push(trade.clone());
            self.trades.push(trade);

            let equity = self.total_equity(lookup);
            self.equity_curve.push(equity);
        }

        fills
    }

    fn unrealized_value(&self, lookup: &MarketLookup<'_>) -> Decimal {
        let mut value = Decimal::ZERO;
        for ((market_id, outcome_id), qty) in self.positions.iter() {
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
}
