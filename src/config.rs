//! Configuration loading and defaults.
//!
//! Settings are layered: built-in defaults, then an optional
//! `agentinterface.toml` file, then `AGENTINTERFACE__*` environment
//! variables (double underscore separates nested keys).

use crate::logging::LoggingConfig;
use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default port for the HTTP callback listener
pub const DEFAULT_CALLBACK_PORT: u16 = 8228;

/// Default number of seconds to wait for a user interaction
pub const DEFAULT_INTERACTION_TIMEOUT_SECS: u64 = 300;

/// Callback listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Port the shared callback listener binds to
    pub port: u16,
    /// Host advertised in callback endpoints (`AI_CALLBACK_HOST` overrides)
    pub host: String,
    /// Pending interactions older than this are evicted by the sweep
    pub stale_after_secs: u64,
    /// Interval between sweep passes
    pub sweep_interval_secs: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_CALLBACK_PORT,
            host: "localhost".to_string(),
            stale_after_secs: 900,
            sweep_interval_secs: 60,
        }
    }
}

/// Human-interaction configuration for interactive streams
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Seconds to wait for a user interaction before giving up
    pub timeout_secs: u64,
    /// Maximum number of human-interaction rounds; `None` is unbounded
    pub max_rounds: Option<usize>,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_INTERACTION_TIMEOUT_SECS,
            max_rounds: None,
        }
    }
}

/// Protocol-generation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Always include `markdown` in the described component set
    pub force_markdown: bool,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    pub callback: CallbackConfig,
    pub interaction: InteractionConfig,
    pub protocol: ProtocolConfig,
    pub logging: LoggingConfig,
}

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the conventional file and environment.
    /// Precedence: defaults (lowest) -> agentinterface.toml -> environment (highest).
    pub fn load() -> Result<InterfaceConfig, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("agentinterface").required(false))
            .add_source(
                Environment::with_prefix("AGENTINTERFACE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<InterfaceConfig, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix("AGENTINTERFACE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Create default configuration.
    pub fn default() -> InterfaceConfig {
        InterfaceConfig::default()
    }
}
