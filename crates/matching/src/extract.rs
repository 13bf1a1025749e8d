//! Extraction of thresholds, entities, and expiries from raw question text.
//!
//! Venues phrase the same event a dozen ways, so every extractor is
//! best-effort: it returns `Option` and never fails the caller.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use rust_decimal::Decimal;

use paper_arb_core::Comparator;

use crate::normalize::{is_stopword, normalize_text};

fn threshold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(>=|<=|>|<|over|under|above|below|at\s+least)\s*\$?([0-9][0-9,.]*)([km])?")
            .expect("threshold pattern is valid")
    })
}

fn ticker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z]{2,5}\b").expect("ticker pattern is valid"))
}

/// Parses a number that may carry a `k` or `m` suffix and comma grouping.
#[must_use]
pub fn parse_number(raw: &str, suffix: Option<&str>) -> Option<Decimal> {
    let cleaned = raw.replace(',', "");
    // A trailing dot ("100." from "100.00?") still parses; empty does not.
    let value: Decimal = cleaned.trim_end_matches('.').parse().ok()?;
    let multiplier = match suffix.map(str::to_ascii_lowercase).as_deref() {
        Some("k") => Decimal::from(1_000),
        Some("m") => Decimal::from(1_000_000),
        _ => Decimal::ONE,
    };
    Some(value * multiplier)
}

/// Extracts a comparator and numeric threshold from question text.
///
/// Synonyms collapse to canonical symbols: `over`/`above` mean `>`,
/// `under`/`below` mean `<`, `at least` means `>=`.
#[must_use]
pub fn extract_threshold(text: &str) -> (Option<Comparator>, Option<Decimal>) {
    let Some(caps) = threshold_re().captures(text) else {
        return (None, None);
    };

    let comp_raw = caps
        .get(1)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default();
    let comparator = match comp_raw.split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
        ">" | "over" | "above" => Some(Comparator::Gt),
        ">=" | "at least" => Some(Comparator::Ge),
        "<" | "under" | "below" => Some(Comparator::Lt),
        "<=" => Some(Comparator::Le),
        _ => None,
    };

    let value = caps
        .get(2)
        .and_then(|num| parse_number(num.as_str(), caps.get(3).map(|m| m.as_str())));

    (comparator, value)
}

/// Extracts the market's entity: a 2-5 letter uppercase ticker if present,
/// otherwise the first significant token, lowercased either way.
#[must_use]
pub fn extract_entity(text: &str) -> Option<String> {
    if let Some(ticker) = ticker_re().find(text) {
        return Some(ticker.as_str().to_lowercase());
    }
    normalize_text(text)
        .split(' ')
        .find(|t| !t.is_empty() && !is_stopword(t))
        .map(ToString::to_string)
}

// =============================================================================
// Fuzzy Expiry Extraction
// =============================================================================

const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .find(|(full, _)| full.starts_with(&lower) && lower.len() >= 3)
        .map(|(_, n)| *n)
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("iso pattern is valid"))
}

fn month_day_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b")
            .expect("month-day-year pattern is valid")
    })
}

fn day_month_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2})\s+([a-z]{3,9})\.?\s+(\d{4})\b")
            .expect("day-month-year pattern is valid")
    })
}

fn month_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b([a-z]{3,9})\.?\s+(\d{4})\b").expect("month-year pattern is valid")
    })
}

fn bare_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(20\d{2})\b").expect("year pattern is valid"))
}

fn utc_midnight(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Utc.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()
}

/// Fuzzy expiry parsing over free-form question text.
///
/// Recognizes ISO dates, "March 31, 2026", "31 March 2026", "March 2026"
/// (first of month), and bare years (December 31). Returns `None` when
/// nothing date-like appears; failure is never an error.
#[must_use]
pub fn extract_expiry(text: &str) -> Option<DateTime<Utc>> {
    if let Some(caps) = iso_date_re().captures(text) {
        let parsed = utc_midnight(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
        if parsed.is_some() {
            return parsed;
        }
    }

    for caps in month_day_year_re().captures_iter(text) {
        if let Some(month) = month_number(&caps[1]) {
            if let (Ok(day), Ok(year)) = (caps[2].parse(), caps[3].parse()) {
                if let Some(parsed) = utc_midnight(year, month, day) {
                    return Some(parsed);
                }
            }
        }
    }

    for caps in day_month_year_re().captures_iter(text) {
        if let Some(month) = month_number(&caps[2]) {
            if let (Ok(day), Ok(year)) = (caps[1].parse(), caps[3].parse()) {
                if let Some(parsed) = utc_midnight(year, month, day) {
                    return Some(parsed);
                }
            }
        }
    }

    for caps in month_year_re().captures_iter(text) {
        if let Some(month) = month_number(&caps[1]) {
            if let Ok(year) = caps[2].parse() {
                if let Some(parsed) = utc_midnight(year, month, 1) {
                    return Some(parsed);
                }
            }
        }
    }

    if let Some(caps) = bare_year_re().captures(text) {
        if let Ok(year) = caps[1].parse() {
            return utc_midnight(year, 12, 31);
        }
    }

    None
}
