//! Market fingerprints.
//!
//! A fingerprint condenses a market to the features that matter for
//! matching: normalized title key, entity, expiry, and threshold. Explicit
//! market fields win; extraction from the question text fills the gaps.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use paper_arb_core::{Comparator, Market};

use crate::extract::{extract_entity, extract_expiry, extract_threshold};
use crate::normalize::stable_key;

/// The matchable essence of a market.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    /// Sorted-token key of the question.
    pub stable_key: String,
    /// Underlying entity, lowercased.
    pub entity: Option<String>,
    /// Resolution deadline.
    pub expiry: Option<DateTime<Utc>>,
    /// Threshold comparator.
    pub comparator: Option<Comparator>,
    /// Threshold value.
    pub threshold: Option<Decimal>,
}

impl Fingerprint {
    /// Builds the fingerprint for a market.
    #[must_use]
    pub fn of(market: &Market) -> Self {
        let (extracted_comp, extracted_thr) = extract_threshold(&market.question);
        Self {
            stable_key: stable_key(&market.question),
            entity: market
                .asset
                .clone()
                .or_else(|| extract_entity(&market.question)),
            expiry: market.end_date.or_else(|| extract_expiry(&market.question)),
            comparator: market.comparator.or(extracted_comp),
            threshold: market.threshold.or(extracted_thr),
        }
    }
}
