//! Deterministic, no-network market sources for paper-arb.
//!
//! The default deployment runs entirely against these: a seeded synthetic
//! population covering every detector's opportunity family, served through
//! the same `MarketSource` contract a live venue adapter would implement.

pub mod source;
pub mod synthetic;

pub use source::{FixtureMarketSource, SyntheticMarketSource};
pub use synthetic::generate_markets;
