//! Strict A+B validation.
//!
//! In dual-venue mode every opportunity must genuinely span both venues:
//! exactly two venues, at least one leg on each, and no leg that asks the
//! long-only venue to sell inventory it does not hold. Single-venue
//! arithmetic arbitrage is rejected wholesale here, before the risk gate
//! ever sees it.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use paper_arb_core::{
    MarketLookup, Opportunity, OpportunityKind, PositionBook, Side, Venue,
};

// =============================================================================
// Rejection Reasons
// =============================================================================

/// Why an opportunity failed strict A+B validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Fewer than two venues referenced.
    InsufficientVenues,
    /// More than two venues referenced.
    TooManyVenues,
    /// Both legs on one venue type (no A+B span).
    SingleVenueType,
    /// A leg the owning venue cannot execute (short on the long-only venue).
    ForbiddenAction,
    /// Opportunity kind is outside the configured whitelist.
    ForbiddenOpportunityType,
}

impl RejectReason {
    /// Wire name, matching the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientVenues => "insufficient_venues",
            Self::TooManyVenues => "too_many_venues",
            Self::SingleVenueType => "single_venue_type",
            Self::ForbiddenAction => "forbidden_action",
            Self::ForbiddenOpportunityType => "forbidden_opportunity_type",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Validation Result
// =============================================================================

/// Outcome of validating one opportunity, with reporting metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the opportunity may proceed to the risk gate.
    pub is_valid: bool,
    /// Populated on rejection.
    pub rejection: Option<RejectReason>,
    /// Venues referenced by the legs.
    pub venues_used: BTreeSet<Venue>,
    /// Leg count per venue.
    pub venue_legs: BTreeMap<Venue, usize>,
    /// Descriptions of legs that violate venue constraints.
    pub forbidden_actions: Vec<String>,
    /// Free-form detail for reports.
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ValidationResult {
    fn rejected(reason: RejectReason) -> Self {
        Self {
            is_valid: false,
            rejection: Some(reason),
            venues_used: BTreeSet::new(),
            venue_legs: BTreeMap::new(),
            forbidden_actions: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

// =============================================================================
// Validator
// =============================================================================

/// Enforces the strict A+B execution law.
///
/// A pure function of `(opportunity, market lookup, broker positions)`; the
/// validator itself holds only the optional kind whitelist.
#[derive(Debug, Default)]
pub struct StrictAbValidator {
    allowed_kinds: Option<BTreeSet<OpportunityKind>>,
}

impl StrictAbValidator {
    /// Creates a validator that accepts every opportunity kind.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts validation to a kind whitelist.
    #[must_use]
    pub fn with_allowed_kinds(kinds: impl IntoIterator<Item = OpportunityKind>) -> Self {
        Self {
            allowed_kinds: Some(kinds.into_iter().collect()),
        }
    }

    /// Validates a single opportunity.
    #[must_use]
    pub fn validate(
        &self,
        opp: &Opportunity,
        lookup: &MarketLookup<'_>,
        positions: &PositionBook,
    ) -> ValidationResult {
        let mut venues_used = BTreeSet::new();
        let mut venue_legs: BTreeMap<Venue, usize> = BTreeMap::new();
        for action in &opp.actions {
            if let Some(market) = lookup.get(action.market_id.as_str()) {
                venues_used.insert(market.venue);
                *venue_legs.entry(market.venue).or_insert(0) += 1;
            }
        }

        // Rule 1: venue count bounds. Zero resolvable venues cannot span
        // anything; more than two is over-spanned.
        if venues_used.is_empty() {
            debug!(opportunity = %opp.kind, "rejected: no resolvable venues");
            return ValidationResult::rejected(RejectReason::InsufficientVenues)
                .with_detail("required", serde_json::json!(2))
                .with_detail("found", serde_json::json!(0));
        }
        if venues_used.len() > 2 {
            debug!(opportunity = %opp.kind, venues = venues_used.len(), "rejected: too many venues");
            return ValidationResult::rejected(RejectReason::TooManyVenues)
                .with_detail("required", serde_json::json!(2))
                .with_detail("found", serde_json::json!(venues_used.len()));
        }

        // Rule 2: one leg on the shortable venue, one on the long-only venue.
        // Legs confined to one venue type, even across distinct venues, are
        // single-venue arbitrage in disguise.
        let has_venue_a = venues_used.iter().any(|v| v.supports_shorting());
        let has_venue_b = venues_used.iter().any(|v| !v.supports_shorting());
        if !has_venue_a || !has_venue_b {
            debug!(opportunity = %opp.kind, "rejected: single venue type");
            let mut result = ValidationResult::rejected(RejectReason::SingleVenueType)
                .with_detail("has_venue_a", serde_json::json!(has_venue_a))
                .with_detail("has_venue_b", serde_json::json!(has_venue_b));
            result.venues_used = venues_used;
            result.venue_legs = venue_legs;
            return result;
        }

        // Rule 3: the long-only venue never sells beyond inventory.
        let forbidden = self.forbidden_actions(opp, lookup, positions);
        if !forbidden.is_empty() {
            debug!(
                opportunity = %opp.kind,
                count = forbidden.len(),
                "rejected: forbidden actions on long-only venue"
            );
            let mut result = ValidationResult::rejected(RejectReason::ForbiddenAction);
            result.venues_used = venues_used;
            result.venue_legs = venue_legs;
            result.forbidden_actions = forbidden;
            return result;
        }

        // Rule 4: optional kind whitelist.
        if let Some(allowed) = &self.allowed_kinds {
            if !allowed.contains(&opp.kind) {
                debug!(opportunity = %opp.kind, "rejected: kind not whitelisted");
                let mut result =
                    ValidationResult::rejected(RejectReason::ForbiddenOpportunityType)
                        .with_detail("kind", serde_json::json!(opp.kind.as_str()));
                result.venues_used = venues_used;
                result.venue_legs = venue_legs;
                return result;
            }
        }

        let leg_count = opp.actions.len();
        ValidationResult {
            is_valid: true,
            rejection: None,
            venues_used,
            venue_legs,
            forbidden_actions: Vec::new(),
            metadata: BTreeMap::from([
                ("kind".to_string(), serde_json::json!(opp.kind.as_str())),
                ("leg_count".to_string(), serde_json::json!(leg_count)),
            ]),
        }
    }

    fn forbidden_actions(
        &self,
        opp: &Opportunity,
        lookup: &MarketLookup<'_>,
        positions: &PositionBook,
    ) -> Vec<String> {
        let mut forbidden = Vec::new();
        for action in &opp.actions {
            let Some(market) = lookup.get(action.market_id.as_str()) else {
                continue;
            };
            if market.venue.supports_shorting() || action.side != Side::Sell {
                continue;
            }

            let inventory = positions.quantity(&action.market_id, &action.outcome_id);
            if inventory <= Decimal::ZERO {
                forbidden.push(format!(
                    "SELL-to-open on {} for {}:{} (inventory={inventory})",
                    market.venue, action.market_id, action.outcome_id
                ));
            } else if action.amount > inventory {
                forbidden.push(format!(
                    "SELL amount {} exceeds inventory {inventory} on {} for {}:{}",
                    action.amount, market.venue, action.market_id, action.outcome_id
                ));
            }
        }
        forbidden
    }

    /// Validates a batch, splitting it into accepted opportunities and
    /// rejected `(opportunity, result)` pairs.
    #[must_use]
    pub fn validate_batch<'a>(
        &self,
        opportunities: &'a [Opportunity],
        lookup: &MarketLookup<'_>,
        positions: &PositionBook,
    ) -> (Vec<&'a Opportunity>, Vec<(&'a Opportunity, ValidationResult)>) {
        let mut valid = Vec::new();
        let mut rejected = Vec::new();
        for opp in opportunities {
            let result = self.validate(opp, lookup, positions);
            if result.is_valid {
                valid.push(opp);
            } else {
                rejected.push((opp, result));
            }
        }
        (valid, rejected)
    }

    /// Aggregates a batch validation into counters for reporting.
    #[must_use]
    pub fn report(
        &self,
        opportunities: &[Opportunity],
        lookup: &MarketLookup<'_>,
        positions: &PositionBook,
    ) -> ValidationReport {
        let (valid, rejected) = self.validate_batch(opportunities, lookup, positions);

        let mut rejections_by_reason: BTreeMap<String, usize> = BTreeMap::new();
        for (_, result) in &rejected {
            if let Some(reason) = result.rejection {
                *rejections_by_reason.entry(reason.as_str().to_string()).or_insert(0) += 1;
            }
        }

        let mut valid_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for opp in &valid {
            *valid_by_kind.entry(opp.kind.as_str().to_string()).or_insert(0) += 1;
        }

        ValidationReport {
            total: opportunities.len(),
            valid: valid.len(),
            rejected: rejected.len(),
            rejections_by_reason,
            valid_by_kind,
        }
    }
}

/// Aggregate validation counters for one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Opportunities examined.
    pub total: usize,
    /// Opportunities accepted.
    pub valid: usize,
    /// Opportunities rejected.
    pub rejected: usize,
    /// Rejection counts keyed by reason wire name.
    pub rejections_by_reason: BTreeMap<String, usize>,
    /// Acceptance counts keyed by opportunity kind.
    pub valid_by_kind: BTreeMap<String, usize>,
}
