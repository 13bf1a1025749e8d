//! Application configuration.
//!
//! One immutable record passed into the engine at construction. Defaults are
//! safe: no live venue is enabled, so a default run performs no network I/O.
//! Validation happens once at startup and is the only fatal error path
//! besides reporter disk failures.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// =============================================================================
// Venue Configuration
// =============================================================================

/// Connection settings for one venue.
///
/// Credentials are placeholders resolved from the environment by the loader;
/// the core never performs I/O with them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Whether a live adapter for this venue should be wired in at all.
    pub enabled: bool,
    /// API host.
    pub host: String,
    /// API key or key id.
    #[serde(default)]
    pub api_key: Option<String>,
    /// API secret / private key material.
    #[serde(default)]
    pub secret: Option<String>,
    /// Chain id for on-chain venues.
    #[serde(default)]
    pub chain_id: Option<u64>,
}

/// Per-venue connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenuesConfig {
    /// Venue A (shorting permitted).
    pub kalshi: VenueConfig,
    /// Venue B (long-only).
    pub polymarket: VenueConfig,
}

impl Default for VenuesConfig {
    fn default() -> Self {
        Self {
            kalshi: VenueConfig {
                enabled: false,
                host: "https://trading-api.kalshi.com".to_string(),
                api_key: None,
                secret: None,
                chain_id: None,
            },
            polymarket: VenueConfig {
                enabled: false,
                host: "https://clob.polymarket.com".to_string(),
                api_key: None,
                secret: None,
                chain_id: Some(137),
            },
        }
    }
}

// =============================================================================
// Risk Configuration
// =============================================================================

/// Thresholds for the risk gate, in rule order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Whether any venue in the session supports shorting. When false the
    /// DUPLICATE family is globally disabled.
    pub short_selling_available: bool,
    /// Minimum net edge an opportunity must carry.
    pub min_net_edge_threshold: Decimal,
    /// Minimum gross edge before fees; zero disables the check.
    pub min_gross_edge: Decimal,
    /// Minimum BUY limit price (dust / fake-liquidity filter).
    pub min_buy_price: Decimal,
    /// Required orderbook depth as a multiple of trade size for BUY legs.
    pub min_liquidity_multiple: Decimal,
    /// Minimum hours to market expiry; zero disables the check.
    pub min_expiry_hours: i64,
    /// Cap on simultaneously open positions, counting session approvals.
    pub max_open_positions: usize,
    /// Per-market liquidity floor in dollars.
    pub min_liquidity_usd: Decimal,
    /// Fraction of total equity allowed into a single opportunity.
    pub max_allocation_per_market: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            short_selling_available: false,
            min_net_edge_threshold: dec!(0.005),
            min_gross_edge: dec!(0.05),
            min_buy_price: dec!(0.02),
            min_liquidity_multiple: dec!(3.0),
            min_expiry_hours: 24,
            max_open_positions: 20,
            min_liquidity_usd: dec!(500),
            max_allocation_per_market: dec!(0.05),
        }
    }
}

// =============================================================================
// Broker Configuration
// =============================================================================

/// Parameters for the paper fill simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Starting cash balance in dollars.
    pub initial_cash: Decimal,
    /// Fee charged per fill, in basis points of notional.
    pub fee_bps: Decimal,
    /// Slippage charged per fill, in basis points of notional.
    pub slippage_bps: Decimal,
    /// Fraction of quoted market liquidity assumed reachable.
    pub depth_fraction: Decimal,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            initial_cash: dec!(10000),
            fee_bps: dec!(10),
            slippage_bps: dec!(20),
            depth_fraction: dec!(0.05),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Iteration loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds to sleep between iterations.
    pub refresh_seconds: f64,
    /// Number of iterations before the run terminates.
    pub iterations: u64,
    /// Directory for the live summary, state file, and trace log.
    pub report_path: String,
    /// When true, the strict A+B validator gates every opportunity.
    pub dual_venue: bool,
    /// Upper bound on a single `MarketSource::fetch` call.
    pub fetch_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_seconds: 5.0,
            iterations: 100,
            report_path: "reports".to_string(),
            dual_venue: false,
            fetch_timeout_secs: 10,
        }
    }
}

// =============================================================================
// Pre-screen Filter Configuration
// =============================================================================

/// Pre-screen thresholds applied by sources before markets reach the engine.
///
/// Loose by default so sparse live data still gets scanned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Minimum 24h traded volume in dollars.
    pub min_volume_24h: Decimal,
    /// Minimum quoted liquidity in dollars.
    pub min_liquidity: Decimal,
    /// Minimum days until expiry.
    pub min_days_to_expiry: i64,
    /// Drop markets without a resolution source.
    pub require_resolution_source: bool,
    /// Keep markets whose end time is unknown.
    pub allow_missing_end_time: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_volume_24h: Decimal::ZERO,
            min_liquidity: Decimal::ZERO,
            min_days_to_expiry: 0,
            require_resolution_source: false,
            allow_missing_end_time: true,
        }
    }
}

// =============================================================================
// Detector Configuration
// =============================================================================

/// Per-detector thresholds and enable flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// YES+NO sums below this trigger the parity detector.
    pub parity_threshold: Decimal,
    /// Minimum YES price gap between duplicate markets.
    pub duplicate_price_diff_threshold: Decimal,
    /// Allowed deviation of a multi-outcome sum from 1.
    pub exclusive_sum_tolerance: Decimal,
    /// Slack before a ladder monotonicity violation counts.
    pub ladder_tolerance: Decimal,
    /// Minimum price jump for the time-lag detector.
    pub timelag_price_jump: Decimal,
    /// Minutes a prior observation must age before a jump counts.
    pub timelag_persistence_minutes: i64,
    /// Minimum composite-vs-component violation.
    pub composite_tolerance: Decimal,
    /// Enable flags, one per detector.
    pub enable_parity: bool,
    pub enable_ladder: bool,
    pub enable_duplicate: bool,
    pub enable_exclusive_sum: bool,
    pub enable_timelag: bool,
    pub enable_consistency: bool,
    pub enable_composite: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            parity_threshold: dec!(0.99),
            duplicate_price_diff_threshold: dec!(0.05),
            exclusive_sum_tolerance: dec!(0.03),
            ladder_tolerance: Decimal::ZERO,
            timelag_price_jump: dec!(0.05),
            timelag_persistence_minutes: 5,
            composite_tolerance: dec!(0.02),
            enable_parity: true,
            enable_ladder: true,
            enable_duplicate: true,
            enable_exclusive_sum: true,
            enable_timelag: true,
            enable_consistency: true,
            enable_composite: true,
        }
    }
}

// =============================================================================
// Matching Configuration
// =============================================================================

/// How group verification failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailMode {
    /// A verification failure keeps the unverified grouping.
    FailOpen,
    /// A verification failure drops the group.
    FailClosed,
}

/// Similarity and grouping settings for the matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum stable-key similarity for two markets to pair as duplicates.
    pub title_similarity_threshold: f64,
    /// Use the semantic backend when one is installed.
    pub use_semantic: bool,
    /// Window, in days, for merging related-market expiry buckets.
    pub expiry_window_days: i64,
    /// Behavior when an external group verifier fails.
    pub verification_fail_mode: FailMode,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            title_similarity_threshold: 0.8,
            use_semantic: false,
            expiry_window_days: 7,
            verification_fail_mode: FailMode::FailOpen,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// The full configuration record handed to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub venues: VenuesConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub detectors: DetectorConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

impl AppConfig {
    /// Validates ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] on the first out-of-range value. Callers
    /// treat this as fatal at startup.
    pub fn validate(&self) -> Result<(), CoreError> {
        let r = &self.risk;
        if r.max_allocation_per_market <= Decimal::ZERO || r.max_allocation_per_market > Decimal::ONE
        {
            return Err(CoreError::config(
                "risk.max_allocation_per_market must be in (0, 1]",
            ));
        }
        if r.min_net_edge_threshold < Decimal::ZERO {
            return Err(CoreError::config("risk.min_net_edge_threshold must be >= 0"));
        }
        if r.min_buy_price < Decimal::ZERO || r.min_buy_price > Decimal::ONE {
            return Err(CoreError::config("risk.min_buy_price must be in [0, 1]"));
        }
        if r.max_open_positions == 0 {
            return Err(CoreError::config("risk.max_open_positions must be positive"));
        }

        let b = &self.broker;
        if b.initial_cash <= Decimal::ZERO {
            return Err(CoreError::config("broker.initial_cash must be positive"));
        }
        if b.fee_bps < Decimal::ZERO || b.slippage_bps < Decimal::ZERO {
            return Err(CoreError::config("broker fee/slippage bps must be >= 0"));
        }
        if b.depth_fraction <= Decimal::ZERO || b.depth_fraction > Decimal::ONE {
            return Err(CoreError::config("broker.depth_fraction must be in (0, 1]"));
        }

        let e = &self.engine;
        if e.refresh_seconds <= 0.0 {
            return Err(CoreError::config("engine.refresh_seconds must be positive"));
        }
        if e.fetch_timeout_secs == 0 {
            return Err(CoreError::config("engine.fetch_timeout_secs must be positive"));
        }

        let d = &self.detectors;
        if d.parity_threshold <= Decimal::ZERO || d.parity_threshold > Decimal::ONE {
            return Err(CoreError::config("detectors.parity_threshold must be in (0, 1]"));
        }
        if d.exclusive_sum_tolerance < Decimal::ZERO {
            return Err(CoreError::config(
                "detectors.exclusive_sum_tolerance must be >= 0",
            ));
        }
        if d.timelag_persistence_minutes < 0 {
            return Err(CoreError::config(
                "detectors.timelag_persistence_minutes must be >= 0",
            ));
        }

        let m = &self.matching;
        if !(0.0..=1.0).contains(&m.title_similarity_threshold) {
            return Err(CoreError::config(
                "matching.title_similarity_threshold must be in [0, 1]",
            ));
        }
        if m.expiry_window_days < 0 {
            return Err(CoreError::config("matching.expiry_window_days must be >= 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_defaults_perform_no_live_io() {
        let cfg = AppConfig::default();
        assert!(!cfg.venues.kalshi.enabled);
        assert!(!cfg.venues.polymarket.enabled);
    }

    #[test]
    fn test_allocation_out_of_range_rejected() {
        let mut cfg = AppConfig::default();
        cfg.risk.max_allocation_per_market = dec!(1.5);
        assert!(cfg.validate().is_err());

        cfg.risk.max_allocation_per_market = Decimal::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_depth_fraction_bounds() {
        let mut cfg = AppConfig::default();
        cfg.broker.depth_fraction = dec!(0);
        assert!(cfg.validate().is_err());
        cfg.broker.depth_fraction = dec!(1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_refresh_seconds_must_be_positive() {
        let mut cfg = AppConfig::default();
        cfg.engine.refresh_seconds = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_similarity_threshold_bounds() {
        let mut cfg = AppConfig::default();
        cfg.matching.title_similarity_threshold = 1.2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_detector_defaults_match_documented_values() {
        let d = DetectorConfig::default();
        assert_eq!(d.parity_threshold, dec!(0.99));
        assert_eq!(d.duplicate_price_diff_threshold, dec!(0.05));
        assert_eq!(d.exclusive_sum_tolerance, dec!(0.03));
        assert_eq!(d.timelag_persistence_minutes, 5);
    }

    #[test]
    fn test_fail_mode_wire_names() {
        let json = serde_json::to_string(&FailMode::FailOpen).unwrap();
        assert_eq!(json, "\"fail_open\"");
        let back: FailMode = serde_json::from_str("\"fail_closed\"").unwrap();
        assert_eq!(back, FailMode::FailClosed);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let cfg = AppConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.broker.fee_bps, cfg.broker.fee_bps);
        assert_eq!(back.engine.iterations, cfg.engine.iterations);
    }
}
