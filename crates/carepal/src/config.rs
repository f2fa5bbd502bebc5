//! Configuration management for carepal.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lifecycle::TransitionPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "carepal";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "stores.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CAREPAL_`, sections separated by
///    `__`, e.g. `CAREPAL_PAYMENT__SUCCESS_RATE=0.5`)
/// 2. TOML config file at `~/.config/carepal/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Call simulation timings.
    pub call: CallConfig,
    /// Payment simulation.
    pub payment: PaymentConfig,
    /// Status lifecycle rules.
    pub lifecycle: LifecycleConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/carepal/stores.db`
    pub database_path: Option<PathBuf>,
    /// Save every store after each mutating command.
    pub autosave: bool,
}

/// Delays of the scripted call, in milliseconds from dialing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// calling → ringing.
    pub ringing_after_ms: u64,
    /// ringing → connecting.
    pub connecting_after_ms: u64,
    /// connecting → active.
    pub active_after_ms: u64,
    /// Give up if still ringing.
    pub no_answer_after_ms: u64,
}

/// Payment simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Probability that a simulated payment is approved.
    pub success_rate: f64,
    /// Simulated processing time.
    pub processing_delay_ms: u64,
    /// Delay after approval before a paid order is confirmed.
    /// Set to 0 to leave orders at Paid.
    pub auto_confirm_after_ms: u64,
    /// Fixed RNG seed for reproducible outcomes.
    pub seed: Option<u64>,
}

/// Status lifecycle settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Whether updates outside the transition table are rejected.
    pub policy: TransitionPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Will be resolved to default at runtime
            autosave: true,
        }
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ringing_after_ms: 1500,
            connecting_after_ms: 4500,
            active_after_ms: 6000,
            no_answer_after_ms: 30_000,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            success_rate: 0.9,
            processing_delay_ms: 2000,
            auto_confirm_after_ms: 3000,
            seed: None,
        }
    }
}

impl CallConfig {
    /// Check that the scripted steps happen in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the delays are not strictly increasing.
    pub fn validate(&self) -> Result<()> {
        if self.ringing_after_ms >= self.connecting_after_ms
            || self.connecting_after_ms >= self.active_after_ms
        {
            return Err(Error::config_validation(format!(
                "call timings must increase: ringing ({}) < connecting ({}) < active ({})",
                self.ringing_after_ms, self.connecting_after_ms, self.active_after_ms
            )));
        }
        if self.no_answer_after_ms <= self.ringing_after_ms {
            return Err(Error::config_validation(format!(
                "no_answer_after_ms ({}) must be after ringing_after_ms ({})",
                self.no_answer_after_ms, self.ringing_after_ms
            )));
        }
        Ok(())
    }
}

impl PaymentConfig {
    /// Check the simulation parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `success_rate` is outside `0.0..=1.0`.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.success_rate) {
            return Err(Error::config_validation(format!(
                "success_rate must be between 0 and 1, got {}",
                self.success_rate
            )));
        }
        Ok(())
    }

    /// Simulated processing time as a Duration.
    #[must_use]
    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }

    /// Auto-confirm delay, or `None` if disabled.
    #[must_use]
    pub fn auto_confirm_after(&self) -> Option<Duration> {
        if self.auto_confirm_after_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.auto_confirm_after_ms))
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("CAREPAL_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.call.validate()?;
        self.payment.validate()?;
        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }
}
