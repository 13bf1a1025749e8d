//! Signed position book keyed by (market, outcome).
//!
//! Owned by the paper broker, read by the risk gate and the strict A+B
//! validator when they check SELL inventory.

use std::collections::HashMap;

use rust_decimal::Decimal;

/// Signed inventory per `(market_id, outcome_id)`.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: HashMap<(String, String), Decimal>,
}

impl PositionBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current signed quantity for an outcome; zero when never traded.
    #[must_use]
    pub fn quantity(&self, market_id: &str, outcome_id: &str) -> Decimal {
        self.positions
            .get(&(market_id.to_string(), outcome_id.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Adds a signed delta to a position.
    pub fn apply(&mut self, market_id: &str, outcome_id: &str, delta: Decimal) {
        let entry = self
            .positions
            .entry((market_id.to_string(), outcome_id.to_string()))
            .or_insert(Decimal::ZERO);
        *entry += delta;
    }

    /// Number of positions with nonzero quantity.
    #[must_use]
    pub fn nonzero_count(&self) -> usize {
        self.positions.values().filter(|q| !q.is_zero()).count()
    }

    /// Iterates over `((market_id, outcome_id), quantity)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &Decimal)> {
        self.positions.iter()
    }
}
