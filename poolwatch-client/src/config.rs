//! Engine configuration
//!
//! Defines where the scheduler tools live, which backend to prefer and how
//! location lookups are remembered.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::store::DEFAULT_CACHE_DURATION;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `condor_q`/`condor_status`; `None` resolves through `PATH`
    pub condor_bin: Option<PathBuf>,

    /// Use a registered native binding when it is available
    pub prefer_native: bool,

    /// Remember per-schedd location decisions
    pub location_cache: bool,

    /// Directory for the on-disk store; `None` keeps nothing between runs
    pub store_dir: Option<PathBuf>,

    /// How long an on-disk store entry stays fresh
    pub store_ttl: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new() -> Self {
        Self {
            condor_bin: None,
            prefer_native: true,
            location_cache: true,
            store_dir: None,
            store_ttl: DEFAULT_CACHE_DURATION,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - POOLWATCH_CONDOR_BIN (directory of the scheduler tools)
    /// - POOLWATCH_NATIVE (bool, default: true)
    /// - POOLWATCH_LOCATION_CACHE (bool, default: true)
    /// - POOLWATCH_STORE_DIR (directory for the on-disk store)
    /// - POOLWATCH_STORE_TTL (seconds, default: 3600)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        config.condor_bin = lookup("POOLWATCH_CONDOR_BIN")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        if let Some(value) = lookup("POOLWATCH_NATIVE") {
            config.prefer_native = parse_flag("POOLWATCH_NATIVE", &value)?;
        }

        if let Some(value) = lookup("POOLWATCH_LOCATION_CACHE") {
            config.location_cache = parse_flag("POOLWATCH_LOCATION_CACHE", &value)?;
        }

        config.store_dir = lookup("POOLWATCH_STORE_DIR")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        if let Some(value) = lookup("POOLWATCH_STORE_TTL") {
            let secs = value.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("POOLWATCH_STORE_TTL must be seconds, got '{}'", value))
            })?;
            config.store_ttl = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_condor_bin(mut self, dir: impl Into<PathBuf>) -> Self {
        self.condor_bin = Some(dir.into());
        self
    }

    pub fn with_prefer_native(mut self, prefer_native: bool) -> Self {
        self.prefer_native = prefer_native;
        self
    }

    pub fn with_location_cache(mut self, enabled: bool) -> Self {
        self.location_cache = enabled;
        self
    }

    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = Some(dir.into());
        self
    }

    pub fn with_store_ttl(mut self, ttl: Duration) -> Self {
        self.store_ttl = ttl;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.condor_bin {
            if !dir.is_dir() {
                return Err(Error::Config(format!(
                    "condor_bin {} is not a directory",
                    dir.display()
                )));
            }
        }

        if let Some(dir) = &self.store_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(Error::Config(format!(
                    "store_dir {} exists and is not a directory",
                    dir.display()
                )));
            }
        }

        if self.store_dir.is_some() && self.store_ttl.is_zero() {
            return Err(Error::Config(
                "store_ttl must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{} must be a boolean, got '{}'",
            name, value
        ))),
    }
}
