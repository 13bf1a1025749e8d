//! Arbitrage detectors for the paper-arb engine.
//!
//! Each detector scans the full market snapshot and returns the
//! opportunities it can justify. All are pure functions of the snapshot
//! except [`TimeLagDetector`], which carries price history across
//! iterations.

pub mod composite;
pub mod consistency;
pub mod duplicate;
pub mod exclusive_sum;
pub mod ladder;
pub mod parity;
pub mod timelag;

pub use composite::CompositeDetector;
pub use consistency::ConsistencyDetector;
pub use duplicate::DuplicateDetector;
pub use exclusive_sum::ExclusiveSumDetector;
pub use ladder::LadderDetector;
pub use parity::ParityDetector;
pub use timelag::TimeLagDetector;

use paper_arb_core::{AppConfig, Detector};

/// Builds the enabled detector set in canonical pipeline order.
///
/// The time-lag detector is placed last: it is the only stateful one, and
/// running it after the pure detectors keeps the door open for parallel
/// invocation of everything before it.
#[must_use]
pub fn build_detectors(config: &AppConfig) -> Vec<Box<dyn Detector>> {
    let d = &config.detectors;
    let mut detectors: Vec<Box<dyn Detector>> = Vec::new();

    if d.enable_parity {
        detectors.push(Box::new(ParityDetector::new(
            d.clone(),
            config.broker.clone(),
        )));
    }
    if d.enable_ladder {
        detectors.push(Box::new(LadderDetector::new(d.clone())));
    }
    if d.enable_duplicate {
        detectors.push(Box::new(DuplicateDetector::new(
            d.clone(),
            config.matching.clone(),
        )));
    }
    if d.enable_exclusive_sum {
        detectors.push(Box::new(ExclusiveSumDetector::new(d.clone())));
    }
    if d.enable_consistency {
        detectors.push(Box::new(ConsistencyDetector::new(d.clone())));
    }
    if d.enable_composite {
        detectors.push(Box::new(CompositeDetector::new(d.clone())));
    }
    if d.enable_timelag {
        detectors.push(Box::new(TimeLagDetector::new(
            d.clone(),
            config.matching.clone(),
        )));
    }

    detectors
}
