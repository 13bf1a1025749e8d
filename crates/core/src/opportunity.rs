//! Opportunities and the trade actions that realize them.
//!
//! Every detector reduces a mispricing to an [`Opportunity`]: a set of
//! [`TradeAction`] legs plus the modeled edge. Opportunity ids are derived
//! from content so that identical mispricings hash identically across
//! iterations and restarts.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// =============================================================================
// Sides
// =============================================================================

/// Order side for a single leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy the outcome.
    Buy,
    /// Sell the outcome.
    Sell,
}

impl Side {
    /// Returns the display string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Trade Actions
// =============================================================================

/// One intended leg of an opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeAction {
    /// Market the leg trades on.
    pub market_id: String,
    /// Outcome within that market.
    pub outcome_id: String,
    /// Buy or sell.
    pub side: Side,
    /// Requested quantity; strictly positive.
    pub amount: Decimal,
    /// Limit price in [0, 1].
    pub limit_price: Decimal,
}

impl TradeAction {
    /// Creates a new trade action.
    #[must_use]
    pub fn new(
        market_id: impl Into<String>,
        outcome_id: impl Into<String>,
        side: Side,
        amount: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            market_id: market_id.into(),
            outcome_id: outcome_id.into(),
            side,
            amount,
            limit_price,
        }
    }
}

// =============================================================================
// Opportunity Kinds
// =============================================================================

/// The detector family that produced an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpportunityKind {
    /// YES+NO on a binary market sums below 1.
    Parity,
    /// Monotonicity violation across a threshold ladder.
    Ladder,
    /// Same event quoted at different prices.
    Duplicate,
    /// Mutually exclusive outcome prices do not sum to 1.
    ExclusiveSum,
    /// A market repriced while a stale prior quote lagged.
    #[serde(rename = "TIMELAG")]
    TimeLag,
    /// Complementary or dominance inconsistency between related markets.
    Consistency,
    /// Composite event priced above its prerequisite.
    Composite,
}

impl OpportunityKind {
    /// Returns the wire/display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parity => "PARITY",
            Self::Ladder => "LADDER",
            Self::Duplicate => "DUPLICATE",
            Self::ExclusiveSum => "EXCLUSIVE_SUM",
            Self::TimeLag => "TIMELAG",
            Self::Consistency => "CONSISTENCY",
            Self::Composite => "COMPOSITE",
        }
    }
}

impl std::fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Opportunities
// =============================================================================

/// A detected mispricing with the legs that would capture it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    /// Producing detector family.
    pub kind: OpportunityKind,
    /// Markets referenced by the legs.
    pub market_ids: Vec<String>,
    /// Human-readable summary of the violation.
    pub description: String,
    /// Modeled profit per unit after fees and slippage; strictly positive.
    pub net_edge: Decimal,
    /// Intended legs; never empty.
    pub actions: Vec<TradeAction>,
    /// Free-form side-car data (gross edge, previous price, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Opportunity {
    /// Canonical content string fed into the id hash.
    ///
    /// Market ids and legs are sorted so the id is invariant under input
    /// permutation; leg prices are rounded to 4 decimal places so float
    /// noise upstream cannot split identical opportunities.
    fn canonical_content(&self) -> String {
        let mut market_ids = self.market_ids.clone();
        market_ids.sort();

        let mut legs: Vec<String> = self
            .actions
            .iter()
            .map(|a| {
                format!(
                    "{}:{}:{}:{}",
                    a.market_id,
                    a.outcome_id,
                    a.side,
                    a.limit_price.round_dp(4)
                )
            })
            .collect();
        legs.sort();

        format!(
            "{}|{}|{}",
            self.kind,
            market_ids.join(","),
            legs.join(",")
        )
    }

    /// Deterministic opportunity id: SHA-256 hex of the canonical content.
    #[must_use]
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_content().as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for byte in digest {
            use std::fmt::Write as _;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Gross edge recorded by the detector, falling back to the net edge.
    #[must_use]
    pub fn gross_edge(&self) -> Decimal {
        self.metadata
            .get("gross_edge")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(self.net_edge)
    }

    /// Stores a decimal value in the metadata side-car.
    pub fn set_meta_decimal(&mut self, key: &str, value: Decimal) {
        self.metadata
            .insert(key.to_string(), serde_json::Value::String(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample(kind: OpportunityKind, markets: &[&str]) -> Opportunity {
        Opportunity {
            kind,
            market_ids: markets.iter().map(|s| (*s).to_string()).collect(),
            description: "test".to_string(),
            net_edge: dec!(0.05),
            actions: vec![
                TradeAction::new(markets[0], "y", Side::Buy, dec!(1), dec!(0.45)),
                TradeAction::new(markets[0], "n", Side::Buy, dec!(1), dec!(0.45)),
            ],
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_side_display() {
        assert_eq!(Side::Buy.to_string(), "BUY");
        assert_eq!(Side::Sell.to_string(), "SELL");
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(OpportunityKind::ExclusiveSum.as_str(), "EXCLUSIVE_SUM");
        let json = serde_json::to_string(&OpportunityKind::TimeLag).unwrap();
        assert_eq!(json, "\"TIMELAG\"");
        let json = serde_json::to_string(&OpportunityKind::ExclusiveSum).unwrap();
        assert_eq!(json, "\"EXCLUSIVE_SUM\"");
    }

    #[test]
    fn test_id_is_sha256_hex() {
        let opp = sample(OpportunityKind::Parity, &["m1"]);
        let id = opp.id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_id_stable_under_market_permutation() {
        let a = sample(OpportunityKind::Ladder, &["m1", "m2"]);
        let mut b = a.clone();
        b.market_ids.reverse();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_id_stable_under_action_permutation() {
        let a = sample(OpportunityKind::Parity, &["m1"]);
        let mut b = a.clone();
        b.actions.reverse();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_id_changes_with_price() {
        let a = sample(OpportunityKind::Parity, &["m1"]);
        let mut b = a.clone();
        b.actions[0].limit_price = dec!(0.46);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_id_ignores_sub_rounding_noise() {
        let a = sample(OpportunityKind::Parity, &["m1"]);
        let mut b = a.clone();
        b.actions[0].limit_price = dec!(0.45000004);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_id_differs_across_kinds() {
        let a = sample(OpportunityKind::Parity, &["m1"]);
        let mut b = a.clone();
        b.kind = OpportunityKind::Consistency;
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_gross_edge_fallback() {
        let mut opp = sample(OpportunityKind::Parity, &["m1"]);
        assert_eq!(opp.gross_edge(), dec!(0.05));
        opp.set_meta_decimal("gross_edge", dec!(0.10));
        assert_eq!(opp.gross_edge(), dec!(0.10));
    }

    #[test]
    fn test_serialization_round_trip() {
        let opp = sample(OpportunityKind::Duplicate, &["m1", "m2"]);
        let json = serde_json::to_string(&opp).unwrap();
        assert!(json.contains("\"DUPLICATE\""));
        let back: Opportunity = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), opp.id());
    }
}
