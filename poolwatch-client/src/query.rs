//! Queries against schedds and collectors
//!
//! A [`Query`] fetches a keyed [`RecordSet`] through the backend chosen by
//! its [`QueryContext`]. Every backend failure is reported as a single
//! [`QueryError`] naming the target, constraint and format.

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use poolwatch_core::{AttrType, FormatSpec, Record, RecordSet};
use tracing::debug;

use crate::backend::{BackendKind, BackendRequest, QueryBackend, QueryTarget};
use crate::context::QueryContext;
use crate::error::{BackendError, Error, QueryError, Result};
use crate::keying::{KeyAttrs, coerce_record, key_records};
use crate::location::{ResourceSelector, ScheddLocation};
use crate::overrides::ConfigOverrides;
use crate::security::SecurityContext;

/// Predicate over a single record
pub type RecordFilter<'f> = &'f dyn Fn(&Record) -> bool;

/// Anything producing keyed record sets: queries and derived queries
pub trait RecordSource {
    /// Fetch fresh data
    fn fetch_records(&self, constraint: Option<&str>) -> Result<RecordSet>;

    /// The kept result, optionally filtered; empty if nothing was loaded
    fn fetch_stored(&self, filter: Option<RecordFilter<'_>>) -> RecordSet;
}

/// A result kept by `load`
#[derive(Debug, Clone)]
pub(crate) struct Stored<T = RecordSet> {
    pub data: T,
    pub at: DateTime<Utc>,
}

impl<T> Stored<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            at: Utc::now(),
        }
    }
}

/// Apply an optional filter to a kept result
pub(crate) fn filter_stored(
    stored: &RefCell<Option<Stored>>,
    filter: Option<RecordFilter<'_>>,
) -> RecordSet {
    let stored = stored.borrow();
    let Some(stored) = stored.as_ref() else {
        debug!("No stored data, returning an empty set");
        return RecordSet::new();
    };
    match filter {
        Some(filter) => stored
            .data
            .iter()
            .filter(|(_, record)| filter(record))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect(),
        None => stored.data.clone(),
    }
}

/// A query against one schedd or collector
pub struct Query {
    target: QueryTarget,
    keys: KeyAttrs,
    /// Attributes force-added to any projection
    required: FormatSpec,
    location: ScheddLocation,
    security: RefCell<SecurityContext>,
    backend: Box<dyn QueryBackend>,
    stored: RefCell<Option<Stored>>,
}

impl Query {
    /// Job queue of a schedd, keyed by `(ClusterId, ProcId)`
    ///
    /// # Errors
    /// [`Error::Precondition`] if `security` holds saved state;
    /// [`Error::NotFound`] if the location lookup cannot find the schedd.
    pub fn schedd(
        ctx: &QueryContext,
        schedd: Option<&str>,
        pool: Option<&str>,
        security: Option<&SecurityContext>,
    ) -> Result<Self> {
        Self::queue(
            ctx,
            schedd,
            pool,
            security,
            KeyAttrs::multi(["ClusterId", "ProcId"]),
            FormatSpec::new()
                .with("ClusterId", AttrType::Integer)
                .with("ProcId", AttrType::Integer),
        )
    }

    /// Job queue of a schedd with one job per cluster, keyed by `ClusterId`
    pub fn schedd_lite(
        ctx: &QueryContext,
        schedd: Option<&str>,
        pool: Option<&str>,
        security: Option<&SecurityContext>,
    ) -> Result<Self> {
        Self::queue(
            ctx,
            schedd,
            pool,
            security,
            KeyAttrs::single("ClusterId"),
            FormatSpec::new().with("ClusterId", AttrType::Integer),
        )
    }

    fn queue(
        ctx: &QueryContext,
        schedd: Option<&str>,
        pool: Option<&str>,
        security: Option<&SecurityContext>,
        keys: KeyAttrs,
        required: FormatSpec,
    ) -> Result<Self> {
        let security = checked_security(security)?;
        let location = ctx.resolve_schedd(schedd, pool)?;
        let target = QueryTarget::Schedd {
            name: schedd.map(str::to_string),
            pool: pool.map(str::to_string),
        };
        Ok(Self::with_backend(
            target,
            keys,
            required,
            location,
            security,
            ctx.backend(),
        ))
    }

    /// Collector ads of `subsystem` (startd ads when `None`), keyed by `Name`
    pub fn status(
        ctx: &QueryContext,
        subsystem: Option<&str>,
        pool: Option<&str>,
        security: Option<&SecurityContext>,
    ) -> Result<Self> {
        let security = checked_security(security)?;
        let target = QueryTarget::Status {
            subsystem: subsystem.map(str::to_string),
            pool: pool.map(str::to_string),
        };
        Ok(Self::with_backend(
            target,
            KeyAttrs::single("Name"),
            FormatSpec::new().with("Name", AttrType::String),
            ScheddLocation {
                selector: ResourceSelector::Default,
                overrides: ConfigOverrides::new(),
            },
            security,
            ctx.backend(),
        ))
    }

    /// Explicitly wired query
    pub fn with_backend(
        target: QueryTarget,
        keys: KeyAttrs,
        required: FormatSpec,
        location: ScheddLocation,
        security: SecurityContext,
        backend: Box<dyn QueryBackend>,
    ) -> Self {
        Self {
            target,
            keys,
            required,
            location,
            security: RefCell::new(security),
            backend,
            stored: RefCell::new(None),
        }
    }

    /// Global listing of `attributes` for every job matching `constraint`
    /// across all schedds; returns the ads unkeyed
    pub fn attribute_values(
        ctx: &QueryContext,
        constraint: &str,
        attributes: &[String],
    ) -> Result<Vec<Record>> {
        ctx.external_backend()
            .list_attributes(constraint, attributes, &ConfigOverrides::new())
            .map_err(|source| {
                Error::from(QueryError::Fetch {
                    target: "all schedds".to_string(),
                    constraint: constraint.to_string(),
                    format: format!("{:?}", attributes),
                    source,
                })
            })
    }

    pub fn target(&self) -> &QueryTarget {
        &self.target
    }

    pub fn location(&self) -> &ScheddLocation {
        &self.location
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Fetch the records matching `constraint`, projected to `format`
    ///
    /// Key attributes are added to `format` when missing and projected
    /// attributes are coerced to their declared types.
    pub fn fetch(&self, constraint: Option<&str>, format: Option<&FormatSpec>) -> Result<RecordSet> {
        let format = format.map(|f| f.complete(&self.required));
        let records = self
            .run_backend(constraint, format.as_ref())
            .map_err(|source| QueryError::Fetch {
                target: self.target.to_string(),
                constraint: constraint.unwrap_or("None").to_string(),
                format: format
                    .as_ref()
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "None".to_string()),
                source,
            })?;

        let records = match &format {
            Some(format) => records
                .into_iter()
                .map(|record| coerce_record(record, format))
                .collect(),
            None => records,
        };
        Ok(key_records(records, &self.keys))
    }

    fn run_backend(
        &self,
        constraint: Option<&str>,
        format: Option<&FormatSpec>,
    ) -> std::result::Result<Vec<Record>, BackendError> {
        let mut security = self.security.borrow_mut();
        let scope = security.scoped();

        let mut overrides = self.location.overrides.clone();
        overrides.merge(&scope.enforce_requests());

        let request = BackendRequest {
            target: &self.target,
            selector: &self.location.selector,
            constraint,
            format,
            overrides: &overrides,
        };
        self.backend.query(&request)
    }

    /// Fetch and keep the result for [`Query::fetch_stored`]
    pub fn load(&self, constraint: Option<&str>, format: Option<&FormatSpec>) -> Result<()> {
        let data = self.fetch(constraint, format)?;
        debug!("Loaded {} records from {}", data.len(), self.target);
        self.stored.replace(Some(Stored::new(data)));
        Ok(())
    }

    /// When the kept result was loaded
    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        self.stored.borrow().as_ref().map(|s| s.at)
    }

    pub fn require_integrity(&self, required: Option<bool>) {
        self.security.borrow_mut().require_integrity(required);
    }

    pub fn requested_integrity(&self) -> Option<bool> {
        self.security.borrow().requested_integrity()
    }

    pub fn require_encryption(&self, required: Option<bool>) {
        self.security.borrow_mut().require_encryption(required);
    }

    pub fn requested_encryption(&self) -> Option<bool> {
        self.security.borrow().requested_encryption()
    }
}

impl RecordSource for Query {
    fn fetch_records(&self, constraint: Option<&str>) -> Result<RecordSet> {
        self.fetch(constraint, None)
    }

    fn fetch_stored(&self, filter: Option<RecordFilter<'_>>) -> RecordSet {
        filter_stored(&self.stored, filter)
    }
}

/// Copy the caller's security context, refusing one mid-transaction
fn checked_security(security: Option<&SecurityContext>) -> Result<SecurityContext> {
    match security {
        Some(security) if security.has_saved_state() => Err(Error::Precondition(
            "Cannot use a security context which has saved state".to_string(),
        )),
        Some(security) => Ok(security.clone()),
        None => Ok(SecurityContext::new()),
    }
}
