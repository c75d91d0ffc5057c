//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod queue;
mod status;
mod summary;

use anyhow::Result;
use clap::Subcommand;
use poolwatch_core::{AttrType, FormatSpec};

use crate::config::Settings;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List jobs in a schedd's queue
    Queue {
        /// Schedd name; the pool's default schedd when omitted
        #[arg(long)]
        schedd: Option<String>,

        /// Collector host of the pool
        #[arg(long)]
        pool: Option<String>,

        /// Scheduler expression selecting jobs
        #[arg(long)]
        constraint: Option<String>,

        /// Attribute to fetch, as NAME:TYPE (TYPE one of s, i, r, b)
        #[arg(long = "attr", value_parser = parse_attr)]
        attrs: Vec<(String, AttrType)>,

        /// One job per cluster
        #[arg(long)]
        lite: bool,
    },
    /// List collector ads
    Status {
        /// Ad subsystem (schedd, collector, ...); startd ads when omitted
        #[arg(long)]
        subsystem: Option<String>,

        /// Collector host of the pool
        #[arg(long)]
        pool: Option<String>,

        /// Scheduler expression selecting ads
        #[arg(long)]
        constraint: Option<String>,

        /// Attribute to fetch, as NAME:TYPE
        #[arg(long = "attr", value_parser = parse_attr)]
        attrs: Vec<(String, AttrType)>,
    },
    /// Count jobs by attribute values
    Summary {
        #[arg(long)]
        schedd: Option<String>,

        #[arg(long)]
        pool: Option<String>,

        #[arg(long)]
        constraint: Option<String>,

        /// Attribute to count by; repeat to nest
        #[arg(long, required = true)]
        by: Vec<String>,

        /// Single-level count by the first attribute
        #[arg(long)]
        flat: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub fn handle_command(command: Commands, settings: &Settings) -> Result<()> {
    match command {
        Commands::Queue {
            schedd,
            pool,
            constraint,
            attrs,
            lite,
        } => queue::list_queue(
            settings,
            schedd.as_deref(),
            pool.as_deref(),
            constraint.as_deref(),
            format_from(attrs).as_ref(),
            lite,
        ),
        Commands::Status {
            subsystem,
            pool,
            constraint,
            attrs,
        } => status::list_ads(
            settings,
            subsystem.as_deref(),
            pool.as_deref(),
            constraint.as_deref(),
            format_from(attrs).as_ref(),
        ),
        Commands::Summary {
            schedd,
            pool,
            constraint,
            by,
            flat,
        } => summary::count_jobs(
            settings,
            schedd.as_deref(),
            pool.as_deref(),
            constraint.as_deref(),
            &by,
            flat,
        ),
    }
}

/// Parse `NAME:TYPE`
fn parse_attr(arg: &str) -> std::result::Result<(String, AttrType), String> {
    let (name, attr_type) = arg
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:TYPE, got '{}'", arg))?;
    if name.is_empty() {
        return Err(format!("attribute name is empty in '{}'", arg));
    }
    Ok((name.to_string(), attr_type.parse::<AttrType>()?))
}

/// `None` when no attribute was asked for
fn format_from(attrs: Vec<(String, AttrType)>) -> Option<FormatSpec> {
    (!attrs.is_empty()).then(|| attrs.into_iter().collect())
}
