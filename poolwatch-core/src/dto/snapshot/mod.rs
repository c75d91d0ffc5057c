//! Record set snapshots for external consumers
//!
//! JSON object keys must be strings, so a snapshot flattens the record set
//! into a list of `(key, attributes)` entries with the key rendered as text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::record::{Record, RecordKey, RecordSet};

/// One keyed record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyedRecord {
    /// Rendered key, e.g. `100.0` or `slot1@node01`
    pub key: String,
    /// Raw key components
    pub key_parts: RecordKey,
    pub attributes: Record,
}

/// A record set captured at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSetSnapshot {
    /// Description of the queried target (pool/schedd/subsystem)
    pub target: String,
    pub fetched_at: DateTime<Utc>,
    pub records: Vec<KeyedRecord>,
}

impl RecordSetSnapshot {
    pub fn new(target: impl Into<String>, fetched_at: DateTime<Utc>, data: &RecordSet) -> Self {
        let records = data
            .iter()
            .map(|(key, record)| KeyedRecord {
                key: key.to_string(),
                key_parts: key.clone(),
                attributes: record.clone(),
            })
            .collect();
        Self {
            target: target.into(),
            fetched_at,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
