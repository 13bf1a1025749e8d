//! Contracts between the engine and its collaborators.
//!
//! Venue adapters implement [`MarketSource`]; chat/webhook transports
//! implement [`Notifier`]; detectors implement [`Detector`]. The engine only
//! ever sees these traits.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::{Market, Venue};
use crate::opportunity::Opportunity;

/// Static facts about a market source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Venue this source feeds from.
    pub venue: Venue,
    /// Taker fee in basis points.
    pub fee_bps: Decimal,
    /// Minimum price increment.
    pub tick_size: Decimal,
    /// Whether the source exposes full order books.
    pub supports_orderbook: bool,
}

/// A feed of normalized market snapshots.
///
/// Implementations normalize prices to [0, 1], tag every market with the
/// venue, and drop impossible records (no outcomes, already expired) before
/// returning.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Fetches the current market snapshot.
    async fn fetch(&mut self) -> Result<Vec<Market>>;

    /// Returns static venue metadata.
    fn metadata(&self) -> SourceMetadata;
}

/// A fire-and-forget notification sink.
///
/// Implementations must swallow transport failures: log and continue, never
/// propagate.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends a text notification.
    async fn send(&self, text: &str);
}

/// An arbitrage detector.
///
/// Detectors read the full immutable snapshot and emit opportunities. Most
/// are pure; the time-lag detector mutates its own history, which is why
/// `detect` takes `&mut self`. Detectors must not mutate markets.
pub trait Detector: Send {
    /// Short name used in logs and trace records.
    fn name(&self) -> &'static str;

    /// Scans the snapshot for opportunities.
    ///
    /// # Errors
    ///
    /// An error isolates this detector for the current iteration; the engine
    /// continues with the remaining detectors.
    fn detect(&mut self, markets: &[Market]) -> Result<Vec<Opportunity>>;
}
