//! Location DTOs persisted by the location cache and native backend

use serde::{Deserialize, Serialize};

/// What a schedd advertises about where it lives
///
/// Persisted as JSON under `"{schedd}.igetenv"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheddAdvert {
    /// Schedd name (the `Name` attribute)
    pub name: String,
    /// Sinful address string, e.g. `<192.168.1.10:9618?addrs=...>`
    pub address: Option<String>,
    /// Advertised `SPOOL_DIR_STRING`
    pub spool_dir: Option<String>,
    /// Advertised `LOCAL_DIR_STRING`
    pub local_dir: Option<String>,
}

/// Opaque daemon location returned by a native locator
///
/// Persisted as JSON under `"{schedd}.locate"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonLocation {
    pub name: String,
    pub address: String,
    /// Pool the location was resolved in, if not the default pool
    pub pool: Option<String>,
}
