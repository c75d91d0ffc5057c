//! Output rendering
//!
//! Record sets and summaries print either as JSON or as colored text.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use colored::*;
use poolwatch_client::{CountTree, Query, RecordSource, Tally};
use poolwatch_core::dto::snapshot::RecordSetSnapshot;
use poolwatch_core::{RecordSet, Value};
use serde_json::json;

/// Print a loaded query's stored records as a JSON snapshot
pub fn print_snapshot(query: &Query) -> Result<()> {
    let fetched_at = query
        .stored_at()
        .context("Query has no stored result to print")?;
    let snapshot =
        RecordSetSnapshot::new(query.target().to_string(), fetched_at, &query.fetch_stored(None));
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Count tree as nested JSON objects
pub fn counts_json(tree: &CountTree) -> serde_json::Value {
    let object: serde_json::Map<String, serde_json::Value> = tree
        .iter()
        .map(|(value, tally)| {
            let node = match tally {
                Tally::Leaf(count) => json!(count),
                Tally::Nested(children) => counts_json(children),
            };
            (value.to_string(), node)
        })
        .collect();
    serde_json::Value::Object(object)
}

pub fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print each record under its key
pub fn print_records(data: &RecordSet, what: &str) {
    if data.is_empty() {
        println!("{}", format!("No {} found.", what).yellow());
        return;
    }

    println!("{}", format!("Found {} {}:", data.len(), what).bold());
    println!();
    for (key, record) in data {
        println!("{}", key.to_string().cyan().bold());
        for (name, value) in record {
            println!("  {} = {}", name.dimmed(), format_value(value));
        }
    }
}

/// Print a count tree, one indented line per node
pub fn print_counts(tree: &CountTree) {
    if tree.is_empty() {
        println!("{}", "Nothing to count.".yellow());
        return;
    }
    print_level(tree, 0);
    println!("{}", "─".repeat(40).dimmed());
    println!("{} {}", "Total:".bold(), poolwatch_client::summarize::total(tree));
}

fn print_level(tree: &CountTree, depth: usize) {
    let indent = "  ".repeat(depth);
    for (value, tally) in tree {
        match tally {
            Tally::Leaf(count) => println!("{}{}: {}", indent, format_value(value), count),
            Tally::Nested(children) => {
                println!("{}{} ({})", indent, format_value(value).bold(), tally.total());
                print_level(children, depth + 1);
            }
        }
    }
}

pub fn print_flat_counts(counts: &BTreeMap<Value, usize>) {
    if counts.is_empty() {
        println!("{}", "Nothing to count.".yellow());
        return;
    }
    for (value, count) in counts {
        println!("{}: {}", format_value(value), count);
    }
}

fn format_value(value: &Value) -> ColoredString {
    match value {
        Value::String(s) => s.green(),
        Value::Undefined => "undefined".dimmed(),
        other => other.to_string().normal(),
    }
}
