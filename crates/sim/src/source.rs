//! In-memory market sources.
//!
//! [`SyntheticMarketSource`] serves the generated population with a small
//! deterministic price drift per fetch, which is what lets the time-lag
//! detector see stale quotes reprice. [`FixtureMarketSource`] replays a
//! fixed list, for fixture-driven self tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use paper_arb_core::{CoreError, FilterConfig, Market, MarketSource, SourceMetadata, Venue};

use crate::synthetic::generate_markets;

fn metadata_for(venue: Venue) -> SourceMetadata {
    SourceMetadata {
        venue,
        fee_bps: dec!(10),
        tick_size: dec!(0.01),
        supports_orderbook: false,
    }
}

/// Drops records a live adapter would never emit (no outcomes, already
/// expired), then applies the configured pre-screen thresholds.
fn screen(markets: Vec<Market>, filter: &FilterConfig) -> Vec<Market> {
    let now = Utc::now();
    markets
        .into_iter()
        .filter(|m| !m.outcomes.is_empty())
        .filter(|m| m.end_date.map_or(true, |end| end > now))
        .filter(|m| m.volume >= filter.min_volume_24h)
        .filter(|m| m.liquidity >= filter.min_liquidity)
        .filter(|m| !filter.require_resolution_source || m.resolution_source.is_some())
        .filter(|m| match m.end_date {
            Some(end) => end - now >= Duration::days(filter.min_days_to_expiry),
            None => filter.allow_missing_end_time,
        })
        .collect()
}

/// A seeded synthetic venue feed.
pub struct SyntheticMarketSource {
    venue: Venue,
    markets: Vec<Market>,
    filter: FilterConfig,
    rng: StdRng,
    fetches: u64,
}

impl SyntheticMarketSource {
    /// Creates a source whose population and price path derive entirely
    /// from the seed.
    #[must_use]
    pub fn new(venue: Venue, num_markets: usize, seed: u64) -> Self {
        Self {
            venue,
            markets: generate_markets(venue, num_markets, seed),
            filter: FilterConfig::default(),
            rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
            fetches: 0,
        }
    }

    /// Applies a pre-screen configuration to every served snapshot.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    /// Nudges a few quotes per fetch, one cent at a time.
    fn drift(&mut self) {
        for market in &mut self.markets {
            if !self.rng.gen_bool(0.2) {
                continue;
            }
            let step = if self.rng.gen_bool(0.5) {
                dec!(0.01)
            } else {
                dec!(-0.01)
            };
            if let Some(outcome) = market.outcomes.first_mut() {
                let nudged = (outcome.price + step).clamp(dec!(0.01), dec!(0.99));
                outcome.price = nudged;
            }
        }
    }
}

#[async_trait]
impl MarketSource for SyntheticMarketSource {
    async fn fetch(&mut self) -> Result<Vec<Market>> {
        if self.fetches > 0 {
            self.drift();
        }
        self.fetches += 1;
        let snapshot = screen(self.markets.clone(), &self.filter);
        debug!(venue = %self.venue, markets = snapshot.len(), fetch = self.fetches, "synthetic snapshot served");
        Ok(snapshot)
    }

    fn metadata(&self) -> SourceMetadata {
        metadata_for(self.venue)
    }
}

/// Replays a fixed market list on every fetch.
pub struct FixtureMarketSource {
    venue: Venue,
    markets: Vec<Market>,
    filter: FilterConfig,
}

impl FixtureMarketSource {
    /// Wraps an explicit market list.
    #[must_use]
    pub fn new(venue: Venue, markets: Vec<Market>) -> Self {
        Self {
            venue,
            markets,
            filter: FilterConfig::default(),
        }
    }

    /// Applies a pre-screen configuration to every served snapshot.
    #[must_use]
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    /// Loads markets from a JSON fixture file (an array of markets).
    ///
    /// # Errors
    ///
    /// Fails when the file is unreadable or not a market array; a malformed
    /// file surfaces as a parse error.
    pub fn from_json_file(venue: Venue, path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let markets: Vec<Market> = serde_json::from_str(&raw)
            .map_err(|e| CoreError::parse(format!("fixture {path}: {e}")))?;
        Ok(Self::new(venue, markets))
    }
}

#[async_trait]
impl MarketSource for FixtureMarketSource {
    async fn fetch(&mut self) -> Result<Vec<Market>> {
        Ok(screen(self.markets.clone(), &self.filter))
    }

    fn metadata(&self) -> SourceMetadata {
        metadata_for(self.venue)
    }
}
