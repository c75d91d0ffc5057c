//! Security context
//!
//! Holds the transport security requirements (integrity, encryption, ...) a
//! query asks the scheduler tools to enforce. Requirements are pushed with
//! [`SecurityContext::save_state`] before a call and popped with
//! [`SecurityContext::restore_state`] afterwards; the stack is strictly LIFO.
//! [`SecurityContext::scoped`] pairs the two with a guard that restores on
//! every exit path.
//!
//! Requirements are materialized as `SEC_<DOMAIN>_<FEATURE>` configuration
//! knobs for a single invocation.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::overrides::ConfigOverrides;

/// Domain used for the requirements of outgoing queries
pub const CLIENT_DOMAIN: &str = "CLIENT";

/// Requirement level understood by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    Required,
    Preferred,
    Optional,
    Never,
}

impl SecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Required => "REQUIRED",
            SecurityLevel::Preferred => "PREFERRED",
            SecurityLevel::Optional => "OPTIONAL",
            SecurityLevel::Never => "NEVER",
        }
    }

    /// `true` → `REQUIRED`, `false` → `OPTIONAL` (accept it if the peer insists)
    pub fn from_requirement(required: bool) -> Self {
        if required {
            SecurityLevel::Required
        } else {
            SecurityLevel::Optional
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

type Requests = BTreeMap<(String, String), Option<SecurityLevel>>;

/// Requested security settings plus a stack of saved snapshots
#[derive(Debug, Clone, Default)]
pub struct SecurityContext {
    requests: Requests,
    saved: Vec<Requests>,
}

impl SecurityContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a level for `domain`/`feature`; `None` clears the request
    pub fn set(&mut self, domain: &str, feature: &str, value: Option<SecurityLevel>) {
        self.requests
            .insert((domain.to_ascii_uppercase(), feature.to_ascii_uppercase()), value);
    }

    /// Currently requested level for `domain`/`feature`
    pub fn get(&self, domain: &str, feature: &str) -> Option<SecurityLevel> {
        self.requests
            .get(&(domain.to_ascii_uppercase(), feature.to_ascii_uppercase()))
            .copied()
            .flatten()
    }

    /// Push a snapshot of the current requests
    pub fn save_state(&mut self) {
        self.saved.push(self.requests.clone());
        debug!("Saved security state (depth: {})", self.saved.len());
    }

    /// Pop the most recent snapshot back into place
    ///
    /// # Errors
    /// [`Error::Precondition`] if there is no saved state.
    pub fn restore_state(&mut self) -> Result<()> {
        let snapshot = self.saved.pop().ok_or_else(|| {
            Error::Precondition("restore_state called without a matching save_state".to_string())
        })?;
        self.requests = snapshot;
        debug!("Restored security state (depth: {})", self.saved.len());
        Ok(())
    }

    pub fn has_saved_state(&self) -> bool {
        !self.saved.is_empty()
    }

    /// Save state and return a guard that restores it when dropped
    pub fn scoped(&mut self) -> SecurityScope<'_> {
        self.save_state();
        SecurityScope { context: self }
    }

    /// Materialize the current requests as configuration knobs
    pub fn enforce_requests(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        for ((domain, feature), value) in &self.requests {
            overrides.set(
                format!("SEC_{}_{}", domain, feature),
                value.map(|level| level.as_str().to_string()),
            );
        }
        overrides
    }

    /// Set the client integrity requirement (`None` leaves it to the tools)
    pub fn require_integrity(&mut self, required: Option<bool>) {
        self.set(
            CLIENT_DOMAIN,
            "INTEGRITY",
            required.map(SecurityLevel::from_requirement),
        );
    }

    /// `Some(true)` when integrity is required, `Some(false)` when optional
    pub fn requested_integrity(&self) -> Option<bool> {
        self.get(CLIENT_DOMAIN, "INTEGRITY")
            .map(|level| level == SecurityLevel::Required)
    }

    /// Set the client encryption requirement (`None` leaves it to the tools)
    pub fn require_encryption(&mut self, required: Option<bool>) {
        self.set(
            CLIENT_DOMAIN,
            "ENCRYPTION",
            required.map(SecurityLevel::from_requirement),
        );
    }

    /// `Some(true)` when encryption is required, `Some(false)` when optional
    pub fn requested_encryption(&self) -> Option<bool> {
        self.get(CLIENT_DOMAIN, "ENCRYPTION")
            .map(|level| level == SecurityLevel::Required)
    }
}

/// Guard returned by [`SecurityContext::scoped`]
pub struct SecurityScope<'a> {
    context: &'a mut SecurityContext,
}

impl Deref for SecurityScope<'_> {
    type Target = SecurityContext;

    fn deref(&self) -> &SecurityContext {
        self.context
    }
}

impl DerefMut for SecurityScope<'_> {
    fn deref_mut(&mut self) -> &mut SecurityContext {
        self.context
    }
}

impl Drop for SecurityScope<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.context.restore_state() {
            warn!("Failed to restore security state: {}", e);
        }
    }
}
