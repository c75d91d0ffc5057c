//! Query backends
//!
//! Two interchangeable strategies fetch raw records:
//! - [`ExternalBackend`] spawns `condor_q`/`condor_status` and decodes the
//!   XML they print
//! - [`NativeBackend`] calls an in-process [`NativeBinding`]
//!
//! Both return the same record shapes; keying and type coercion happen in
//! the query layer.

pub mod external;
pub mod native;
pub mod runner;

use std::fmt;

use poolwatch_core::{FormatSpec, Record};
use tracing::{debug, info};

use crate::error::BackendError;
use crate::location::ResourceSelector;
use crate::overrides::ConfigOverrides;

pub use external::ExternalBackend;
pub use native::{AdType, NativeAd, NativeBackend, NativeBinding, NativeValue, Transaction};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};

/// Which strategy a backend implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    External,
    Native,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::External => write!(f, "external"),
            BackendKind::Native => write!(f, "native"),
        }
    }
}

/// What a query is aimed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    /// A schedd's job queue; `None` is the default schedd
    Schedd {
        name: Option<String>,
        pool: Option<String>,
    },
    /// Collector ads of a subsystem (`startd`, `schedd`, ...)
    Status {
        subsystem: Option<String>,
        pool: Option<String>,
    },
}

impl QueryTarget {
    pub fn pool(&self) -> Option<&str> {
        match self {
            QueryTarget::Schedd { pool, .. } | QueryTarget::Status { pool, .. } => pool.as_deref(),
        }
    }
}

impl fmt::Display for QueryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pool = self.pool().unwrap_or("default");
        match self {
            QueryTarget::Schedd { name, .. } => write!(
                f,
                "schedd {} in pool {}",
                name.as_deref().unwrap_or("default"),
                pool
            ),
            QueryTarget::Status { subsystem, .. } => write!(
                f,
                "{} ads in pool {}",
                subsystem.as_deref().unwrap_or("startd"),
                pool
            ),
        }
    }
}

/// One fetch, fully resolved
#[derive(Debug, Clone, Copy)]
pub struct BackendRequest<'a> {
    pub target: &'a QueryTarget,
    /// How to address the target on the command line
    pub selector: &'a ResourceSelector,
    pub constraint: Option<&'a str>,
    /// Projection; `None` fetches every attribute
    pub format: Option<&'a FormatSpec>,
    /// Configuration knobs for this invocation only
    pub overrides: &'a ConfigOverrides,
}

/// A strategy for fetching raw records
pub trait QueryBackend {
    fn kind(&self) -> BackendKind;

    /// Fetch the unkeyed records matching `request`
    fn query(&self, request: &BackendRequest<'_>) -> Result<Vec<Record>, BackendError>;
}

/// Capability check choosing a backend strategy
pub struct BackendSelector;

impl BackendSelector {
    /// Native when a binding is registered, reports itself available and is
    /// preferred; external otherwise
    pub fn detect(binding: Option<&dyn NativeBinding>, prefer_native: bool) -> BackendKind {
        let kind = match binding {
            Some(binding) if prefer_native && binding.is_available() => BackendKind::Native,
            Some(_) if prefer_native => {
                debug!("Native binding registered but unavailable");
                BackendKind::External
            }
            _ => BackendKind::External,
        };
        info!("Using {} query backend", kind);
        kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBinding;

    #[test]
    fn test_detect_prefers_available_native() {
        let binding = FakeBinding::default();
        assert_eq!(
            BackendSelector::detect(Some(&binding), true),
            BackendKind::Native
        );
        assert_eq!(
            BackendSelector::detect(Some(&binding), false),
            BackendKind::External
        );
        assert_eq!(BackendSelector::detect(None, true), BackendKind::External);
    }

    #[test]
    fn test_detect_falls_back_when_unavailable() {
        let binding = FakeBinding {
            available: false,
            ..Default::default()
        };
        assert_eq!(
            BackendSelector::detect(Some(&binding), true),
            BackendKind::External
        );
    }

    #[test]
    fn test_target_display() {
        let target = QueryTarget::Schedd {
            name: Some("schedd1@host".into()),
            pool: None,
        };
        assert_eq!(target.to_string(), "schedd schedd1@host in pool default");

        let status = QueryTarget::Status {
            subsystem: Some("schedd".into()),
            pool: Some("cm.example.org".into()),
        };
        assert_eq!(status.to_string(), "schedd ads in pool cm.example.org");
    }
}
