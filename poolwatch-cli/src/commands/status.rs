//! Status command handler

use anyhow::Result;
use poolwatch_client::{Query, RecordSource};
use poolwatch_core::FormatSpec;
use tracing::info;

use crate::config::Settings;
use crate::output;

/// Fetch and print collector ads of a subsystem
pub fn list_ads(
    settings: &Settings,
    subsystem: Option<&str>,
    pool: Option<&str>,
    constraint: Option<&str>,
    format: Option<&FormatSpec>,
) -> Result<()> {
    let ctx = settings.context()?;
    let security = settings.security();

    let query = Query::status(&ctx, subsystem, pool, security.as_ref())?;
    info!("Querying {} via {} backend", query.target(), query.backend_kind());

    query.load(constraint, format)?;

    if settings.json {
        output::print_snapshot(&query)
    } else {
        output::print_records(&query.fetch_stored(None), "ad(s)");
        Ok(())
    }
}
