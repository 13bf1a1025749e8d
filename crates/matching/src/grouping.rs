//! Duplicate clustering and related-market grouping.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::trace;

use paper_arb_core::Market;

use crate::fingerprint::Fingerprint;
use crate::similarity::SimilarityScorer;

/// Maximum expiry gap, in hours, for two markets to count as duplicates.
const DUPLICATE_EXPIRY_GAP_HOURS: i64 = 24;

/// Finds pairs of markets that appear to price the same event.
///
/// A pair survives when: expiries (if both known) are within 24 hours,
/// stable-key similarity clears the threshold, and entities (if both known)
/// agree.
#[must_use]
pub fn cluster_duplicates<'a>(
    markets: &'a [Market],
    scorer: &SimilarityScorer,
    title_threshold: f64,
) -> Vec<(&'a Market, &'a Market)> {
    let fingerprints: Vec<Fingerprint> = markets.iter().map(Fingerprint::of).collect();
    let mut pairs = Vec::new();

    for i in 0..markets.len() {
        for j in (i + 1)..markets.len() {
            let (fp1, fp2) = (&fingerprints[i], &fingerprints[j]);

            if let (Some(e1), Some(e2)) = (fp1.expiry, fp2.expiry) {
                let gap = (e1 - e2).num_hours().abs();
                if gap > DUPLICATE_EXPIRY_GAP_HOURS {
                    continue;
                }
            }

            let title_sim = scorer.score(&fp1.stable_key, &fp2.stable_key);
            if title_sim < title_threshold {
                continue;
            }

            if let (Some(a), Some(b)) = (&fp1.entity, &fp2.entity) {
                if a != b {
                    continue;
                }
            }

            trace!(
                left = %markets[i].id,
                right = %markets[j].id,
                similarity = title_sim,
                "duplicate candidate pair"
            );
            pairs.push((&markets[i], &markets[j]));
        }
    }

    pairs
}

fn bucket_label(entity: &str, date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => format!("{entity}-{d}"),
        None => format!("{entity}-unknown"),
    }
}

/// Groups markets that concern the same entity around the same date.
///
/// Markets bucket by `(entity, expiry date)`; buckets of one entity whose
/// dates lie within `expiry_window_days` of each other merge under the
/// earliest date. Keys are deterministic, so iteration order is stable.
#[must_use]
pub fn group_related<'a>(
    markets: &'a [Market],
    expiry_window_days: i64,
) -> BTreeMap<String, Vec<&'a Market>> {
    let mut buckets: BTreeMap<(String, Option<NaiveDate>), Vec<&Market>> = BTreeMap::new();
    for market in markets {
        let fp = Fingerprint::of(market);
        let entity = fp.entity.unwrap_or_else(|| "unknown".to_string());
        let date = fp.expiry.map(|e| e.date_naive());
        buckets.entry((entity, date)).or_default().push(market);
    }

    let keys: Vec<(String, Option<NaiveDate>)> = buckets.keys().cloned().collect();
    let mut merged: BTreeMap<String, Vec<&Market>> = BTreeMap::new();

    for ((entity, date), members) in &buckets {
        // Merge toward the earliest same-entity bucket within the window.
        let merged_date = date.map(|d| {
            keys.iter()
                .filter_map(|(e2, d2)| {
                    let d2 = (*d2)?;
                    (e2 == entity && (d2 - d).num_days().abs() <= expiry_window_days)
                        .then_some(d2)
                })
                .min()
                .unwrap_or(d)
        });
        merged
            .entry(bucket_label(entity, merged_date))
            .or_default()
            .extend(members.iter().copied());
    }

    merged
}
