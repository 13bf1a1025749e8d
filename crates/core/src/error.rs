//! Error taxonomy for the engine core.
//!
//! Only configuration errors (at startup) and reporter disk errors are
//! fatal; everything else is logged and the iteration loop continues.

use thiserror::Error;

/// Errors surfaced by core components.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid configuration. Fatal at startup only.
    #[error("configuration error: {0}")]
    Config(String),

    /// A venue payload could not be parsed; the offending record is dropped.
    #[error("parse error: {0}")]
    Parse(String),

    /// An opportunity referenced a market id missing from the snapshot.
    #[error("data inconsistency: unknown market {market_id}")]
    UnknownMarket {
        /// The id that failed to resolve.
        market_id: String,
    },
}

impl CoreError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true if the loop should keep running after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}
