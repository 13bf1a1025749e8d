//! Normalized market model shared by every venue adapter.
//!
//! Markets are ephemeral snapshots: sources rebuild them on every fetch and
//! tag each one with its venue of origin. Detectors treat the list as
//! immutable input.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Borrowed id-to-market index over one immutable snapshot.
pub type MarketLookup<'a> = HashMap<&'a str, &'a Market>;

/// Builds the id index the gating and execution stages share.
#[must_use]
pub fn market_lookup(markets: &[Market]) -> MarketLookup<'_> {
    markets.iter().map(|m| (m.id.as_str(), m)).collect()
}

// =============================================================================
// Venue Identifiers
// =============================================================================

/// Identifies which venue a market belongs to.
///
/// Kalshi permits selling to open (shorting); Polymarket requires inventory
/// for every SELL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    /// Kalshi prediction market (venue A).
    Kalshi,
    /// Polymarket CLOB (venue B).
    Polymarket,
}

impl Venue {
    /// Returns the display name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kalshi => "kalshi",
            Self::Polymarket => "polymarket",
        }
    }

    /// Returns true if the venue allows SELL without existing inventory.
    #[must_use]
    pub const fn supports_shorting(self) -> bool {
        matches!(self, Self::Kalshi)
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Comparators
// =============================================================================

/// Comparison operator in a threshold question ("BTC above $100k?").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Comparator {
    /// Strictly above the threshold.
    #[serde(rename = ">")]
    Gt,
    /// At or above the threshold.
    #[serde(rename = ">=")]
    Ge,
    /// Strictly below the threshold.
    #[serde(rename = "<")]
    Lt,
    /// At or below the threshold.
    #[serde(rename = "<=")]
    Le,
}

impl Comparator {
    /// Returns the canonical symbol.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    /// Returns true for the `>` / `>=` family.
    #[must_use]
    pub const fn is_upper(self) -> bool {
        matches!(self, Self::Gt | Self::Ge)
    }

    /// Returns true for the `<` / `<=` family.
    #[must_use]
    pub const fn is_lower(self) -> bool {
        matches!(self, Self::Lt | Self::Le)
    }

    /// Returns true if the two comparators point in opposite directions.
    #[must_use]
    pub const fn opposes(self, other: Self) -> bool {
        (self.is_upper() && other.is_lower()) || (self.is_lower() && other.is_upper())
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// A single tradeable outcome within a market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// Outcome identifier, unique within its market.
    pub id: String,
    /// Free-form label ("Yes", "No", "$90k-$100k", ...).
    pub label: String,
    /// Quoted probability price in [0, 1].
    pub price: Decimal,
    /// Quoted liquidity for this outcome, in dollars.
    #[serde(default)]
    pub liquidity: Decimal,
    /// When the quote was last refreshed, if the venue reports it.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Outcome {
    /// Creates an outcome with no liquidity or timestamp information.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            price,
            liquidity: Decimal::ZERO,
            last_updated: None,
        }
    }
}

// =============================================================================
// Markets
// =============================================================================

/// A normalized market snapshot.
///
/// Ids are globally unique across venues (sources prefix them with the venue
/// tag). Outcome prices are not forced to sum to 1: deviations are exactly
/// what the detectors look for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// Stable, venue-prefixed market id.
    pub id: String,
    /// The question as quoted by the venue.
    pub question: String,
    /// Tradeable outcomes; never empty.
    pub outcomes: Vec<Outcome>,
    /// Resolution deadline, when known.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Total quoted liquidity in dollars.
    #[serde(default)]
    pub liquidity: Decimal,
    /// Traded volume in dollars.
    #[serde(default)]
    pub volume: Decimal,
    /// Venue-supplied tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Venue-supplied long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Parsed comparison operator, when the question carries a threshold.
    #[serde(default)]
    pub comparator: Option<Comparator>,
    /// Parsed numeric threshold.
    #[serde(default)]
    pub threshold: Option<Decimal>,
    /// Underlying asset or entity ("btc", "eth", ...).
    #[serde(default)]
    pub asset: Option<String>,
    /// Where the venue says the market resolves from.
    #[serde(default)]
    pub resolution_source: Option<String>,
    /// Venue of origin.
    pub venue: Venue,
}

impl Market {
    /// Looks up an outcome by label, case-insensitively.
    #[must_use]
    pub fn outcome_by_label(&self, label: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| o.label.eq_ignore_ascii_case(label))
    }

    /// Returns the YES outcome, falling back to the first outcome.
    ///
    /// Detectors use this as "the" probability of a market when it is not
    /// strictly binary.
    #[must_use]
    pub fn yes_outcome(&self) -> Option<&Outcome> {
        self.outcome_by_label("yes").or_else(|| self.outcomes.first())
    }

    /// Sum of all outcome prices. Not forced to 1.
    #[must_use]
    pub fn outcome_sum(&self) -> Decimal {
        self.outcomes.iter().map(|o| o.price).sum()
    }

    /// True when the market has exactly two outcomes labeled yes/no.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.outcomes.len() == 2
            && self.outcome_by_label("yes").is_some()
            && self.outcome_by_label("no").is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn binary_market(yes: Decimal, no: Decimal) -> Market {
        Market {
            id: "polymarket:m1".to_string(),
            question: "Will it happen?".to_string(),
            outcomes: vec![
                Outcome::new("y", "Yes", yes),
                Outcome::new("n", "No", no),
            ],
            end_date: None,
            liquidity: dec!(1000),
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

    #[test]
    fn test_venue_shorting() {
        assert!(Venue::Kalshi.supports_shorting());
        assert!(!Venue::Polymarket.supports_shorting());
    }

    #[test]
    fn test_venue_display() {
        assert_eq!(Venue::Kalshi.to_string(), "kalshi");
        assert_eq!(Venue::Polymarket.to_string(), "polymarket");
    }

    #[test]
    fn test_comparator_families() {
        assert!(Comparator::Gt.is_upper());
        assert!(Comparator::Ge.is_upper());
        assert!(Comparator::Lt.is_lower());
        assert!(Comparator::Le.is_lower());
    }

    #[test]
    fn test_comparator_opposes() {
        assert!(Comparator::Gt.opposes(Comparator::Le));
        assert!(Comparator::Lt.opposes(Comparator::Ge));
        assert!(!Comparator::Gt.opposes(Comparator::Ge));
    }

    #[test]
    fn test_comparator_serde_symbols() {
        let json = serde_json::to_string(&Comparator::Ge).unwrap();
        assert_eq!(json, "\">=\"");
        let back: Comparator = serde_json::from_str("\"<\"").unwrap();
        assert_eq!(back, Comparator::Lt);
    }

    #[test]
    fn test_outcome_by_label_case_insensitive() {
        let m = binary_market(dec!(0.45), dec!(0.45));
        assert!(m.outcome_by_label("YES").is_some());
        assert!(m.outcome_by_label("no").is_some());
        assert!(m.outcome_by_label("maybe").is_none());
    }

    #[test]
    fn test_yes_outcome_falls_back_to_first() {
        let mut m = binary_market(dec!(0.3), dec!(0.6));
        m.outcomes[0].label = "Above".to_string();
        m.outcomes[1].label = "Below".to_string();
        assert_eq!(m.yes_outcome().unwrap().id, "y");
    }

    #[test]
    fn test_outcome_sum() {
        let m = binary_market(dec!(0.45), dec!(0.45));
        assert_eq!(m.outcome_sum(), dec!(0.90));
    }

    #[test]
    fn test_is_binary() {
        assert!(binary_market(dec!(0.5), dec!(0.5)).is_binary());

        let mut m = binary_market(dec!(0.5), dec!(0.5));
        m.outcomes[1].label = "Other".to_string();
        assert!(!m.is_binary());
    }

    #[test]
    fn test_market_serialization_round_trip() {
        let m = binary_market(dec!(0.45), dec!(0.45));
        let json = serde_json::to_string(&m).unwrap();
        let back: Market = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, m.id);
        assert_eq!(back.venue, Venue::Polymarket);
        assert_eq!(back.outcomes.len(), 2);
    }
}
