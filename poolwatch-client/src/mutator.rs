//! Atomic batches of job attribute edits
//!
//! Edits go through the native binding only; there is no external tool
//! equivalent of a multi-job transaction.

use poolwatch_core::JobId;
use tracing::{debug, info};

use crate::backend::NativeBackend;
use crate::context::QueryContext;
use crate::error::{BackendError, Error, FailedEdit, QueryError, Result};
use crate::overrides::ConfigOverrides;

/// Applies edits to one schedd in a single transaction
pub struct BulkEditor {
    backend: NativeBackend,
    pool: Option<String>,
    schedd: Option<String>,
}

impl BulkEditor {
    /// # Errors
    /// [`QueryError::Edit`] when the native backend is not selected.
    pub fn new(ctx: &QueryContext, pool: Option<&str>, schedd: Option<&str>) -> Result<Self> {
        let Some(backend) = ctx.native_backend() else {
            return Err(QueryError::Edit {
                schedd: or_default(schedd),
                pool: or_default(pool),
                failed: FailedEdit(None),
                source: BackendError::Unsupported(
                    "bulk edits require the native binding".to_string(),
                ),
            }
            .into());
        };

        Ok(Self {
            backend,
            pool: pool.map(str::to_string),
            schedd: schedd.map(str::to_string),
        })
    }

    /// Set `attributes[i]` to the string `values[i]` on `jobs[i]`
    ///
    /// Either every edit is committed or none is.
    pub fn apply(&self, jobs: &[JobId], attributes: &[String], values: &[String]) -> Result<()> {
        if jobs.len() != attributes.len() || jobs.len() != values.len() {
            return Err(Error::Precondition(format!(
                "edit batch needs equal lengths, got {} jobs, {} attributes, {} values",
                jobs.len(),
                attributes.len(),
                values.len()
            )));
        }

        let mut current: Option<(JobId, String, String)> = None;
        self.run_batch(jobs, attributes, values, &mut current)
            .map_err(|source| {
                Error::from(QueryError::Edit {
                    schedd: or_default(self.schedd.as_deref()),
                    pool: or_default(self.pool.as_deref()),
                    failed: FailedEdit(current),
                    source,
                })
            })?;

        info!(
            "Committed {} edits on schedd {}",
            jobs.len(),
            or_default(self.schedd.as_deref())
        );
        Ok(())
    }

    fn run_batch(
        &self,
        jobs: &[JobId],
        attributes: &[String],
        values: &[String],
        current: &mut Option<(JobId, String, String)>,
    ) -> std::result::Result<(), BackendError> {
        let mut transaction = self.backend.begin_edit(
            self.pool.as_deref(),
            self.schedd.as_deref(),
            &ConfigOverrides::new(),
        )?;

        for ((job, attribute), value) in jobs.iter().zip(attributes).zip(values) {
            let quoted = quote(value);
            *current = Some((*job, attribute.clone(), quoted.clone()));
            debug!("Setting {} = {} on job {}", attribute, quoted, job);
            transaction.edit(*job, attribute, &quoted)?;
        }

        *current = None;
        transaction.commit()
    }
}

fn or_default(name: Option<&str>) -> String {
    name.unwrap_or("default").to_string()
}

/// Quote `value` as a scheduler string literal
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
