//! Backend calling an in-process scheduler binding
//!
//! No binding ships with this crate. Embedders that link the scheduler's
//! client library implement [`NativeBinding`] and register it on the
//! [`crate::QueryContext`]; its presence is checked at construction.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use poolwatch_core::dto::location::DaemonLocation;
use poolwatch_core::{JobId, Record, Value};
use tracing::{debug, warn};

use super::{BackendKind, BackendRequest, QueryBackend, QueryTarget};
use crate::error::BackendError;
use crate::overrides::ConfigOverrides;
use crate::store::PersistentStore;

/// Attribute value as handed back by a binding
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Literal(Value),
    /// An unevaluated expression and, when it could be evaluated, its value
    Expression {
        text: String,
        evaluated: Option<Value>,
    },
}

impl NativeValue {
    /// Collapse to a plain value; unevaluable expressions are undefined
    pub fn into_value(self) -> Value {
        match self {
            NativeValue::Literal(value) => value,
            NativeValue::Expression { evaluated, .. } => evaluated.unwrap_or(Value::Undefined),
        }
    }
}

/// One ad returned by a binding
pub type NativeAd = BTreeMap<String, NativeValue>;

/// Collector ad types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdType {
    Any,
    Collector,
    Generic,
    Grid,
    Had,
    License,
    Master,
    Negotiator,
    Schedd,
    Startd,
    Submitter,
}

impl AdType {
    /// Ad type for a status subsystem; anything unknown means startd ads
    pub fn from_subsystem(subsystem: Option<&str>) -> Self {
        match subsystem.map(|s| s.trim_start_matches('-').to_ascii_lowercase()) {
            Some(s) => match s.as_str() {
                "any" => AdType::Any,
                "collector" => AdType::Collector,
                "generic" => AdType::Generic,
                "grid" => AdType::Grid,
                "had" => AdType::Had,
                "license" => AdType::License,
                "master" => AdType::Master,
                "negotiator" => AdType::Negotiator,
                "schedd" => AdType::Schedd,
                "submitter" => AdType::Submitter,
                _ => AdType::Startd,
            },
            None => AdType::Startd,
        }
    }
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// An open edit transaction on a schedd
///
/// Dropping a transaction without committing aborts it.
pub trait Transaction {
    fn edit(&mut self, job: JobId, attribute: &str, value: &str) -> Result<(), BackendError>;

    fn commit(self: Box<Self>) -> Result<(), BackendError>;
}

/// In-process access to the scheduler
pub trait NativeBinding {
    /// Whether the underlying library is loaded and usable
    fn is_available(&self) -> bool;

    /// Re-read configuration, then apply `knobs` (`None` unsets a knob)
    fn reload_config(&self, knobs: &ConfigOverrides) -> Result<(), BackendError>;

    /// Find a schedd through the collector of `pool`
    fn locate_schedd(&self, pool: Option<&str>, name: &str)
    -> Result<DaemonLocation, BackendError>;

    /// Query a schedd's queue; `None` is the local schedd
    fn query_schedd(
        &self,
        schedd: Option<&DaemonLocation>,
        constraint: &str,
        projection: &[String],
    ) -> Result<Vec<NativeAd>, BackendError>;

    /// Query the collector of `pool`
    fn query_collector(
        &self,
        pool: Option<&str>,
        ad_type: AdType,
        constraint: &str,
        projection: &[String],
    ) -> Result<Vec<NativeAd>, BackendError>;

    /// Open an edit transaction; `None` is the local schedd
    fn begin_transaction<'a>(
        &'a self,
        schedd: Option<&DaemonLocation>,
    ) -> Result<Box<dyn Transaction + 'a>, BackendError>;
}

/// Strategy adapting a [`NativeBinding`] to the query layer
#[derive(Clone)]
pub struct NativeBackend {
    binding: Rc<dyn NativeBinding>,
    store: Rc<dyn PersistentStore>,
}

impl NativeBackend {
    pub fn new(binding: Rc<dyn NativeBinding>, store: Rc<dyn PersistentStore>) -> Self {
        Self { binding, store }
    }

    /// Reload configuration with the process `_CONDOR_*` variables plus
    /// this call's overrides
    fn reload(&self, overrides: &ConfigOverrides) -> Result<(), BackendError> {
        let mut knobs = ConfigOverrides::from_env_vars(std::env::vars());
        knobs.merge(overrides);
        self.binding.reload_config(&knobs)
    }

    /// Locate a schedd, remembering the answer under `"{schedd}.locate"`
    pub fn locate(&self, pool: Option<&str>, schedd: &str) -> Result<DaemonLocation, BackendError> {
        let key = format!("{}.locate", schedd);
        if let Some(bytes) = self.store.get(&key) {
            match serde_json::from_slice(&bytes) {
                Ok(location) => return Ok(location),
                Err(e) => warn!("Ignoring unreadable store entry {}: {}", key, e),
            }
        }

        let location = self.binding.locate_schedd(pool, schedd)?;
        debug!("Located schedd {} at {}", schedd, location.address);
        match serde_json::to_vec(&location) {
            Ok(bytes) => self.store.save(&key, &bytes),
            Err(e) => warn!("Cannot serialize location of {}: {}", schedd, e),
        }
        Ok(location)
    }

    /// Open an edit transaction on `schedd` (or the local schedd)
    pub fn begin_edit(
        &self,
        pool: Option<&str>,
        schedd: Option<&str>,
        overrides: &ConfigOverrides,
    ) -> Result<Box<dyn Transaction + '_>, BackendError> {
        self.reload(overrides)?;
        let location = schedd.map(|name| self.locate(pool, name)).transpose()?;
        self.binding.begin_transaction(location.as_ref())
    }
}

impl QueryBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn query(&self, request: &BackendRequest<'_>) -> Result<Vec<Record>, BackendError> {
        self.reload(request.overrides)?;

        let constraint = request.constraint.unwrap_or("true");
        let projection = request
            .format
            .map(|format| format.attribute_names())
            .unwrap_or_default();

        let ads = match request.target {
            QueryTarget::Schedd { name, pool } => {
                let location = name
                    .as_deref()
                    .map(|name| self.locate(pool.as_deref(), name))
                    .transpose()?;
                self.binding
                    .query_schedd(location.as_ref(), constraint, &projection)?
            }
            QueryTarget::Status { subsystem, pool } => self.binding.query_collector(
                pool.as_deref(),
                AdType::from_subsystem(subsystem.as_deref()),
                constraint,
                &projection,
            )?,
        };

        debug!("Native binding returned {} ads", ads.len());
        Ok(ads.into_iter().map(adapt_ad).collect())
    }
}

fn adapt_ad(ad: NativeAd) -> Record {
    ad.into_iter()
        .map(|(name, value)| (name, value.into_value()))
        .collect()
}
