pub mod config;
pub mod config_loader;
pub mod error;
pub mod market;
pub mod opportunity;
pub mod position;
pub mod trade;
pub mod traits;

pub use config::{
    AppConfig, BrokerConfig, DetectorConfig, EngineConfig, FailMode, FilterConfig, MatchingConfig,
    RiskConfig, VenueConfig, VenuesConfig,
};
pub use config_loader::ConfigLoader;
pub use error::CoreError;
pub use market::{market_lookup, Comparator, Market, MarketLookup, Outcome, Venue};
pub use opportunity::{Opportunity, OpportunityKind, Side, TradeAction};
pub use position::PositionBook;
pub use trade::Trade;
pub use traits::{Detector, MarketSource, Notifier, SourceMetadata};
