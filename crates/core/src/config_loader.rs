//! Configuration loading.
//!
//! Merges a TOML file with `APP_`-prefixed environment overrides, then runs
//! range validation. Environment fallbacks are resolved here, at load time
//! only; the resulting record is immutable.

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use tracing::info;

use crate::config::AppConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from the default location (`config/Config.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or validation fails.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/Config.toml")
    }

    /// Loads configuration from an explicit path, merged with `APP_` env vars.
    ///
    /// A missing file is not an error: defaults apply, which keeps the
    /// no-config paper run working out of the box.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or validation fails.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("APP_").split("__"))
            .extract()
            .with_context(|| format!("failed to load configuration from {path}"))?;

        config.validate()?;
        info!(
            path,
            dual_venue = config.engine.dual_venue,
            iterations = config.engine.iterations,
            "configuration loaded"
        );
        Ok(config)
    }
}
