//! Poolwatch Engine
//!
//! Queries batch-scheduler job queues and collector ads and hands them back
//! as keyed record sets.
//!
//! Queries run through one of two backends picked once per process: the
//! scheduler's command-line tools (`condor_q`, `condor_status`) with their
//! XML output decoded, or an in-process [`NativeBinding`] registered by the
//! embedder. Both produce the same records.
//!
//! On top of plain queries the crate provides:
//! - Derived queries: filter ([`SubQuery`]), group and reduce ([`Group`]),
//!   group into nested sets ([`NestedGroup`])
//! - Summaries: counts and key lists by a hash function ([`Summarize`])
//! - Per-query security requests ([`SecurityContext`])
//! - A location cache deciding when a local schedd's spool is read directly
//! - Atomic batches of attribute edits ([`BulkEditor`])
//!
//! # Example
//!
//! ```no_run
//! use poolwatch_client::{Config, Query, QueryContext};
//!
//! fn main() -> poolwatch_client::Result<()> {
//!     let ctx = QueryContext::new(Config::from_env()?)?;
//!
//!     let query = Query::schedd(&ctx, Some("schedd1@submit.example.org"), None, None)?;
//!     let jobs = query.fetch(Some("JobStatus == 2"), None)?;
//!
//!     println!("{} running jobs", jobs.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod decoder;
pub mod derived;
pub mod error;
pub mod keying;
pub mod location;
pub mod mutator;
pub mod overrides;
pub mod query;
pub mod security;
pub mod store;
pub mod summarize;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use backend::{BackendKind, CommandRunner, NativeBinding, QueryBackend, QueryTarget};
pub use config::Config;
pub use context::QueryContext;
pub use derived::{Group, NestedGroup, NestedRecordSet, SubQuery};
pub use error::{BackendError, Error, ParseError, QueryError, Result};
pub use mutator::BulkEditor;
pub use overrides::ConfigOverrides;
pub use query::{Query, RecordFilter, RecordSource};
pub use security::{SecurityContext, SecurityLevel};
pub use store::{DiskStore, MemoryStore, NoneStore, PersistentStore};
pub use summarize::{CountTree, ListTree, Summarize, SummarizeMulti, SummaryKey, Tally};
