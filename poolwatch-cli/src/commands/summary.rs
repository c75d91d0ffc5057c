//! Summary command handler

use anyhow::{Result, bail};
use poolwatch_client::{Query, Summarize, SummaryKey};
use poolwatch_core::{Record, Value};
use tracing::info;

use crate::config::Settings;
use crate::output;

/// Count a schedd's jobs by the values of `by`
pub fn count_jobs(
    settings: &Settings,
    schedd: Option<&str>,
    pool: Option<&str>,
    constraint: Option<&str>,
    by: &[String],
    flat: bool,
) -> Result<()> {
    if flat && by.len() != 1 {
        bail!("--flat counts by exactly one attribute, got {}", by.len());
    }

    let ctx = settings.context()?;
    let security = settings.security();
    let query = Query::schedd(&ctx, schedd, pool, security.as_ref())?;
    info!("Summarizing {} by {}", query.target(), by.join("/"));

    let summary = Summarize::new(&query, |record: &Record| hash_path(record, by));

    if flat {
        let counts = summary.count_flat(constraint, &|record: &Record| record.get(&by[0]).cloned())?;
        if settings.json {
            let object: serde_json::Map<String, serde_json::Value> = counts
                .iter()
                .map(|(value, count)| (value.to_string(), serde_json::json!(count)))
                .collect();
            return output::print_json(&serde_json::Value::Object(object));
        }
        output::print_flat_counts(&counts);
        return Ok(());
    }

    let counts = summary.count(constraint, None)?;
    if settings.json {
        output::print_json(&output::counts_json(&counts))
    } else {
        output::print_counts(&counts);
        Ok(())
    }
}

/// Path of `by` values; a job missing any of them is not counted
fn hash_path(record: &Record, by: &[String]) -> Option<SummaryKey> {
    let path = by
        .iter()
        .map(|attribute| record.get(attribute).cloned())
        .collect::<Option<Vec<Value>>>()?;
    Some(match <[Value; 1]>::try_from(path) {
        Ok([single]) => SummaryKey::Scalar(single),
        Err(path) => SummaryKey::Path(path),
    })
}
