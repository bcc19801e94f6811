//! Driver settings.
//!
//! Loaded with the `config` crate from an optional file (any format the
//! crate recognises by extension) and then from `EBB_*` environment
//! variables, e.g. `EBB_ESCROW__INTERVAL=604800` or `EBB_LOG_LEVEL=debug`.
//! Command-line flags are applied on top by the caller.

use std::path::Path;

use anyhow::{Context, Result};
use ebb_core::config::EscrowConfig;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Engine parameters.
    pub escrow: EscrowConfig,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log output format ("text" or "json").
    pub log_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            escrow: EscrowConfig::default(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl Settings {
    /// Read settings from `file` (if given) and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix("EBB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        settings
            .escrow
            .validate()
            .context("invalid escrow parameters")?;
        Ok(settings)
    }
}
