//! Queue command handler

use anyhow::Result;
use poolwatch_client::{Query, RecordSource};
use poolwatch_core::FormatSpec;
use tracing::info;

use crate::config::Settings;
use crate::output;

/// Fetch and print a schedd's jobs
pub fn list_queue(
    settings: &Settings,
    schedd: Option<&str>,
    pool: Option<&str>,
    constraint: Option<&str>,
    format: Option<&FormatSpec>,
    lite: bool,
) -> Result<()> {
    let ctx = settings.context()?;
    let security = settings.security();

    let query = if lite {
        Query::schedd_lite(&ctx, schedd, pool, security.as_ref())?
    } else {
        Query::schedd(&ctx, schedd, pool, security.as_ref())?
    };
    info!("Querying {} via {} backend", query.target(), query.backend_kind());

    query.load(constraint, format)?;

    if settings.json {
        output::print_snapshot(&query)
    } else {
        output::print_records(&query.fetch_stored(None), "job(s)");
        Ok(())
    }
}
