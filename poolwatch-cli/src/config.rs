//! Configuration module
//!
//! Turns command-line settings into an engine context and security requests.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use poolwatch_client::{Config, QueryContext, SecurityContext};

/// CLI settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub condor_bin: Option<PathBuf>,
    pub location_cache: bool,
    pub store_dir: Option<PathBuf>,
    /// Seconds
    pub store_ttl: u64,
    pub require_integrity: Option<bool>,
    pub require_encryption: Option<bool>,
    /// Print JSON instead of text
    pub json: bool,
}

impl Settings {
    /// Engine configuration for these settings
    pub fn engine_config(&self) -> Config {
        let mut config = Config::new()
            .with_location_cache(self.location_cache)
            .with_store_ttl(Duration::from_secs(self.store_ttl));
        if let Some(dir) = &self.condor_bin {
            config = config.with_condor_bin(dir);
        }
        if let Some(dir) = &self.store_dir {
            config = config.with_store_dir(dir);
        }
        config
    }

    pub fn context(&self) -> Result<QueryContext> {
        QueryContext::new(self.engine_config()).context("Failed to set up the query engine")
    }

    /// Security requests, or `None` when neither flag was given
    pub fn security(&self) -> Option<SecurityContext> {
        if self.require_integrity.is_none() && self.require_encryption.is_none() {
            return None;
        }
        let mut security = SecurityContext::new();
        security.require_integrity(self.require_integrity);
        security.require_encryption(self.require_encryption);
        Some(security)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            condor_bin: None,
            location_cache: true,
            store_dir: None,
            store_ttl: 3600,
            require_integrity: None,
            require_encryption: None,
            json: false,
        }
    }

    #[test]
    fn test_engine_config() {
        let mut s = settings();
        s.location_cache = false;
        s.store_ttl = 60;
        s.store_dir = Some(PathBuf::from("/tmp/poolwatch"));

        let config = s.engine_config();
        assert!(!config.location_cache);
        assert_eq!(config.store_ttl, Duration::from_secs(60));
        assert_eq!(config.store_dir, Some(PathBuf::from("/tmp/poolwatch")));
        assert_eq!(config.condor_bin, None);
    }

    #[test]
    fn test_security_only_when_requested() {
        assert!(settings().security().is_none());

        let mut s = settings();
        s.require_integrity = Some(true);
        let security = s.security().unwrap();
        assert_eq!(security.requested_integrity(), Some(true));
        assert_eq!(security.requested_encryption(), None);
    }
}
