//! Backend driving the scheduler's command-line tools

use std::path::PathBuf;
use std::rc::Rc;

use poolwatch_core::{FormatSpec, Record};
use tracing::debug;

use super::runner::CommandRunner;
use super::{BackendKind, BackendRequest, QueryBackend, QueryTarget};
use crate::decoder;
use crate::error::BackendError;
use crate::overrides::ConfigOverrides;

pub const CONDOR_Q: &str = "condor_q";
pub const CONDOR_STATUS: &str = "condor_status";

/// Spawns `condor_q`/`condor_status` and decodes their XML output
#[derive(Clone)]
pub struct ExternalBackend {
    runner: Rc<dyn CommandRunner>,
    bin_dir: Option<PathBuf>,
}

impl ExternalBackend {
    /// Create a backend; tools are looked up in `bin_dir`, or on `PATH`
    pub fn new(runner: Rc<dyn CommandRunner>, bin_dir: Option<PathBuf>) -> Self {
        Self { runner, bin_dir }
    }

    fn program(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Command line for a request: `(program, args)`
    pub fn command_line(request: &BackendRequest<'_>) -> (&'static str, Vec<String>) {
        let (program, mut args) = match request.target {
            QueryTarget::Schedd { .. } => (CONDOR_Q, request.selector.to_args()),
            QueryTarget::Status { subsystem, .. } => (
                CONDOR_STATUS,
                subsystem
                    .iter()
                    .map(|s| format!("-{}", s))
                    .collect::<Vec<_>>(),
            ),
        };

        if let Some(format) = request.format {
            args.extend(format_args(format));
        }
        args.push("-xml".to_string());
        if let Some(pool) = request.target.pool() {
            args.push("-pool".to_string());
            args.push(pool.to_string());
        }
        if let Some(constraint) = request.constraint {
            args.push("-constraint".to_string());
            args.push(constraint.to_string());
        }
        (program, args)
    }

    /// Global long listing of selected attributes for every matching job
    /// across all schedds (`condor_q -g -l`)
    pub fn list_attributes(
        &self,
        constraint: &str,
        attributes: &[String],
        overrides: &ConfigOverrides,
    ) -> Result<Vec<Record>, BackendError> {
        let mut args = vec!["-g".to_string(), "-l".to_string()];
        for attribute in attributes {
            args.push("-attr".to_string());
            args.push(attribute.clone());
        }
        args.push("-xml".to_string());
        args.push("-constraint".to_string());
        args.push(constraint.to_string());

        self.execute(CONDOR_Q, &args, overrides)
    }

    fn execute(
        &self,
        name: &str,
        args: &[String],
        overrides: &ConfigOverrides,
    ) -> Result<Vec<Record>, BackendError> {
        let program = self.program(name);
        let output = self
            .runner
            .run(&program, args, &overrides.to_env())
            .map_err(|source| BackendError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        if !output.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!("{} failed: {}", name, stderr);
            return Err(BackendError::ExitStatus {
                program: name.to_string(),
                code: output.code.unwrap_or(-1),
                stderr,
            });
        }

        let records = decoder::decode_bytes(&output.stdout)?;
        debug!("{} returned {} ads", name, records.len());
        Ok(records)
    }
}

impl QueryBackend for ExternalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::External
    }

    fn query(&self, request: &BackendRequest<'_>) -> Result<Vec<Record>, BackendError> {
        let (program, args) = Self::command_line(request);
        self.execute(program, &args, request.overrides)
    }
}

/// `-format <conversion> <attribute>` for each projected attribute
fn format_args(format: &FormatSpec) -> Vec<String> {
    format
        .iter()
        .flat_map(|(name, attr_type)| {
            [
                "-format".to_string(),
                attr_type.printf_conversion().to_string(),
                name.clone(),
            ]
        })
        .collect()
}
