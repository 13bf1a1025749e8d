//! Deterministic synthetic market generation.
//!
//! Produces a market population seeded with every opportunity family the
//! detectors know (parity gaps, ladder inversions, duplicate clones,
//! exclusive-sum violations, time-lag pairs) plus illiquid rejection bait,
//! so a full pipeline run exercises detection, gating, and execution with
//! zero network I/O. Same seed, same markets.

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use paper_arb_core::{Comparator, Market, Outcome, Venue};

/// Price in whole cents as a decimal probability.
fn cents(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

fn base_market(venue: Venue, id: String, question: String) -> Market {
    Market {
        id,
        question,
        outcomes: Vec::new(),
        end_date: Some(Utc::now() + Duration::days(30)),
        liquidity: Decimal::ZERO,
        volume: Decimal::ZERO,
        tags: Vec::new(),
        description: None,
        comparator: None,
        threshold: None,
        asset: None,
        resolution_source: Some("simulated".to_string()),
        venue,
    }
}

fn yes_no_outcomes(yes: Decimal, no: Decimal, liquidity: Decimal) -> Vec<Outcome> {
    vec![
        Outcome {
            id: "yes".to_string(),
            label: "Yes".to_string(),
            price: yes,
            liquidity,
            last_updated: None,
        },
        Outcome {
            id: "no".to_string(),
            label: "No".to_string(),
            price: no,
            liquidity,
            last_updated: None,
        },
    ]
}

fn binary_outcomes(yes: Decimal, liquidity: Decimal) -> Vec<Outcome> {
    yes_no_outcomes(yes, Decimal::ONE - yes, liquidity)
}

/// Generates a deterministic synthetic market population for one venue.
///
/// `num_markets` is an approximate target; scenario families are filled
/// proportionally the way the weights add up, always at least one each.
#[must_use]
pub fn generate_markets(venue: Venue, num_markets: usize, seed: u64) -> Vec<Market> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut markets = Vec::new();
    let mut serial = 0usize;
    let next_id = |kind: &str, serial: &mut usize| {
        *serial += 1;
        format!("{venue}:sim_{kind}_{serial:03}")
    };

    let share = |weight: usize| (num_markets * weight / 20).max(1);

    // Parity gaps: YES+NO lands between 0.89 and 0.96.
    for i in 0..share(5) {
        let gross = rng.gen_range(89..=96);
        let yes = gross * rng.gen_range(40..=60) / 100;
        let mut m = base_market(
            venue,
            next_id("parity", &mut serial),
            format!("Will scheduled event {i} occur by September 2026?"),
        );
        m.liquidity = Decimal::from(rng.gen_range(10_000..=15_000));
        m.volume = Decimal::from(rng.gen_range(1_000..=50_000));
        m.tags = vec!["yes/no".to_string()];
        m.outcomes = yes_no_outcomes(cents(yes), cents(gross - yes), dec!(5000));
        markets.push(m);
    }

    // Threshold ladders, occasionally inverted.
    let entities = ["BTC", "ETH"];
    for (l, entity) in entities.iter().enumerate().take(share(4).min(entities.len())) {
        let mut prices = [45 - (l as i64) * 5, 38 - (l as i64) * 5, 31 - (l as i64) * 5];
        if rng.gen_bool(0.5) {
            prices.swap(0, 1);
        }
        for (rung, price) in prices.iter().enumerate() {
            let threshold = Decimal::from(90_000 + 10_000 * rung as i64);
            let mut m = base_market(
                venue,
                next_id("ladder", &mut serial),
                format!("Will {entity} trade above ${threshold} by December 2026?"),
            );
            m.liquidity = Decimal::from(rng.gen_range(12_000..=15_000));
            m.volume = Decimal::from(rng.gen_range(500..=20_000));
            m.tags = vec!["ladder".to_string()];
            m.comparator = Some(Comparator::Gt);
            m.threshold = Some(threshold);
            m.asset = Some(entity.to_lowercase());
            m.outcomes = binary_outcomes(cents(*price), dec!(3000));
            markets.push(m);
        }
    }

    // Duplicate clones with a price gap.
    for i in 0..share(3) {
        let yes = rng.gen_range(35..=65);
        let gap = rng.gen_range(2..=8);
        let questions = [
            format!("Will outcome series {i} resolve yes by August 2026?"),
            format!("Will outcome series {i} resolve yes in August 2026?"),
        ];
        for (j, question) in questions.iter().enumerate() {
            let mut m = base_market(venue, next_id("dup", &mut serial), question.clone());
            m.liquidity = Decimal::from(rng.gen_range(8_000..=10_000));
            m.volume = Decimal::from(rng.gen_range(500..=15_000));
            m.tags = vec!["duplicate".to_string()];
            m.asset = Some(format!("series{i}"));
            let price = if j == 0 { yes } else { yes + gap };
            m.outcomes = binary_outcomes(cents(price), dec!(4000));
            markets.push(m);
        }
    }

    // Multi-outcome books whose prices do not sum to 1.
    for i in 0..share(3) {
        let count = rng.gen_range(3..=5);
        let target = rng.gen_range(85..=95);
        let mut remaining = target;
        let mut m = base_market(
            venue,
            next_id("multi", &mut serial),
            format!("Which bracket settles for series {i} in October 2026?"),
        );
        m.liquidity = Decimal::from(rng.gen_range(6_000..=8_000));
        m.volume = Decimal::from(rng.gen_range(200..=10_000));
        m.tags = vec!["exclusive_sum".to_string()];
        for j in 0..count {
            let legs_left = (count - j - 1) as i64;
            let price = if legs_left == 0 {
                remaining.max(1)
            } else {
                // Leave at least one cent for every remaining leg.
                let max_draw = (remaining - legs_left).clamp(1, 40);
                let p = rng.gen_range(1..=max_draw);
                remaining -= p;
                p
            };
            m.outcomes.push(Outcome {
                id: format!("outcome_{j}"),
                label: format!("Option {}", char::from(b'A' + j as u8)),
                price: cents(price),
                liquidity: dec!(2000),
                last_updated: None,
            });
        }
        markets.push(m);
    }

    // Related pairs the time-lag detector can track across fetches.
    for i in 0..share(2) {
        let yes = rng.gen_range(30..=70);
        for j in 0..2 {
            let mut m = base_market(
                venue,
                next_id("lag", &mut serial),
                format!("Will metric {i} print higher in November 2026 (leg {j})?"),
            );
            m.liquidity = Decimal::from(rng.gen_range(7_000..=8_500));
            m.volume = Decimal::from(rng.gen_range(300..=12_000));
            m.tags = vec!["timelag".to_string()];
            m.asset = Some(format!("metric{i}"));
            m.outcomes = binary_outcomes(cents(yes), dec!(3500));
            markets.push(m);
        }
    }

    // Illiquid bait: detectable edges the risk gate must refuse.
    for i in 0..share(3) {
        let gross = rng.gen_range(85..=92);
        let yes = gross / 2;
        let mut m = base_market(
            venue,
            next_id("thin", &mut serial),
            format!("Will fringe event {i} occur by July 2026?"),
        );
        m.liquidity = Decimal::from(rng.gen_range(50..=200));
        m.volume = Decimal::from(rng.gen_range(0..=100));
        m.tags = vec!["illiquid".to_string()];
        m.outcomes = yes_no_outcomes(cents(yes), cents(gross - yes), dec!(50));
        markets.push(m);
    }

    markets
}
