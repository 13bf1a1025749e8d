//! Fill records produced by the paper broker.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::opportunity::Side;

/// A single simulated fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Unique fill id.
    pub id: String,
    /// Fill time, UTC.
    pub timestamp: DateTime<Utc>,
    /// Market traded.
    pub market_id: String,
    /// Outcome traded.
    pub outcome_id: String,
    /// Buy or sell.
    pub side: Side,
    /// Quantity actually filled; may be below the requested amount.
    pub amount_filled: Decimal,
    /// Fill price.
    pub price: Decimal,
    /// Modeled fee charged on the fill.
    pub fees: Decimal,
    /// Modeled slippage charged on the fill.
    pub slippage: Decimal,
    /// Signed cash impact: negative for buys, positive for sells.
    pub realized_pnl: Decimal,
}
