//! Fakes standing in for the scheduler in unit tests

use std::cell::{Cell, RefCell};
use std::io;
use std::path::{Path, PathBuf};

use poolwatch_core::JobId;
use poolwatch_core::dto::location::DaemonLocation;

use crate::backend::{AdType, CommandOutput, CommandRunner, NativeAd, NativeBinding, Transaction};
use crate::error::BackendError;
use crate::overrides::ConfigOverrides;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, Option<String>)>,
}

/// Runner replaying canned outputs; the last reply repeats
pub struct FakeRunner {
    replies: Vec<Option<CommandOutput>>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl FakeRunner {
    pub fn sequence(stdouts: &[&str]) -> Self {
        Self {
            replies: stdouts
                .iter()
                .map(|out| {
                    Some(CommandOutput {
                        code: Some(0),
                        stdout: out.as_bytes().to_vec(),
                        stderr: Vec::new(),
                    })
                })
                .collect(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn replying(stdout: &str) -> Self {
        Self::sequence(&[stdout])
    }

    pub fn failing(code: i32, stderr: &str) -> Self {
        Self {
            replies: vec![Some(CommandOutput {
                code: Some(code),
                stdout: Vec::new(),
                stderr: stderr.as_bytes().to_vec(),
            })],
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Every spawn fails as if the program did not exist
    pub fn unspawnable() -> Self {
        Self {
            replies: vec![None],
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        env: &[(String, Option<String>)],
    ) -> io::Result<CommandOutput> {
        let index = self.calls.borrow().len().min(self.replies.len().saturating_sub(1));
        self.calls.borrow_mut().push(RecordedCall {
            program: program.to_path_buf(),
            args: args.to_vec(),
            env: env.to_vec(),
        });
        match self.replies.get(index).cloned().flatten() {
            Some(output) => Ok(output),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no such program")),
        }
    }
}

/// Binding serving canned ads and recording what it was asked
pub struct FakeBinding {
    pub available: bool,
    pub schedd_ads: Vec<NativeAd>,
    pub collector_ads: Vec<NativeAd>,
    pub fail_queries: Option<String>,
    /// Edits of this attribute fail
    pub fail_edit_of: Option<String>,
    /// Commits fail with this message
    pub fail_commit: Option<String>,
    pub locate_calls: Cell<usize>,
    pub reloads: RefCell<Vec<ConfigOverrides>>,
    pub schedd_queries: RefCell<Vec<(String, Vec<String>)>>,
    pub collector_queries: RefCell<Vec<AdType>>,
    pub committed: RefCell<Vec<(JobId, String, String)>>,
}

impl Default for FakeBinding {
    fn default() -> Self {
        Self {
            available: true,
            schedd_ads: Vec::new(),
            collector_ads: Vec::new(),
            fail_queries: None,
            fail_edit_of: None,
            fail_commit: None,
            locate_calls: Cell::new(0),
            reloads: RefCell::new(Vec::new()),
            schedd_queries: RefCell::new(Vec::new()),
            collector_queries: RefCell::new(Vec::new()),
            committed: RefCell::new(Vec::new()),
        }
    }
}

impl FakeBinding {
    fn check_failure(&self) -> Result<(), BackendError> {
        match &self.fail_queries {
            Some(message) => Err(BackendError::binding(message.clone())),
            None => Ok(()),
        }
    }
}

impl NativeBinding for FakeBinding {
    fn is_available(&self) -> bool {
        self.available
    }

    fn reload_config(&self, knobs: &ConfigOverrides) -> Result<(), BackendError> {
        self.reloads.borrow_mut().push(knobs.clone());
        Ok(())
    }

    fn locate_schedd(
        &self,
        pool: Option<&str>,
        name: &str,
    ) -> Result<DaemonLocation, BackendError> {
        self.locate_calls.set(self.locate_calls.get() + 1);
        Ok(DaemonLocation {
            name: name.to_string(),
            address: "<10.0.0.5:9618>".to_string(),
            pool: pool.map(str::to_string),
        })
    }

    fn query_schedd(
        &self,
        _schedd: Option<&DaemonLocation>,
        constraint: &str,
        projection: &[String],
    ) -> Result<Vec<NativeAd>, BackendError> {
        self.check_failure()?;
        self.schedd_queries
            .borrow_mut()
            .push((constraint.to_string(), projection.to_vec()));
        Ok(self.schedd_ads.clone())
    }

    fn query_collector(
        &self,
        _pool: Option<&str>,
        ad_type: AdType,
        _constraint: &str,
        _projection: &[String],
    ) -> Result<Vec<NativeAd>, BackendError> {
        self.check_failure()?;
        self.collector_queries.borrow_mut().push(ad_type);
        Ok(self.collector_ads.clone())
    }

    fn begin_transaction<'a>(
        &'a self,
        _schedd: Option<&DaemonLocation>,
    ) -> Result<Box<dyn Transaction + 'a>, BackendError> {
        Ok(Box::new(FakeTransaction {
            binding: self,
            pending: Vec::new(),
        }))
    }
}

struct FakeTransaction<'a> {
    binding: &'a FakeBinding,
    pending: Vec<(JobId, String, String)>,
}

impl Transaction for FakeTransaction<'_> {
    fn edit(&mut self, job: JobId, attribute: &str, value: &str) -> Result<(), BackendError> {
        if self.binding.fail_edit_of.as_deref() == Some(attribute) {
            return Err(BackendError::binding(format!("cannot set {}", attribute)));
        }
        self.pending
            .push((job, attribute.to_string(), value.to_string()));
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), BackendError> {
        let FakeTransaction { binding, pending } = *self;
        if let Some(message) = &binding.fail_commit {
            return Err(BackendError::binding(message.clone()));
        }
        binding.committed.borrow_mut().extend(pending);
        Ok(())
    }
}
