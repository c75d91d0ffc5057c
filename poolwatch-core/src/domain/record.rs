//! Records and record sets

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// One ad: attribute name to typed value
pub type Record = BTreeMap<String, Value>;

/// Records keyed by the values of their identifying attribute(s)
///
/// Inserting under an existing key replaces the earlier record.
pub type RecordSet = BTreeMap<RecordKey, Record>;

/// Composite key built from one or more attribute values
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey(pub Vec<Value>);

impl RecordKey {
    pub fn new(parts: Vec<Value>) -> Self {
        Self(parts)
    }

    /// Key with a single component
    pub fn single(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl From<Value> for RecordKey {
    fn from(value: Value) -> Self {
        Self(vec![value])
    }
}

impl From<(i64, i64)> for RecordKey {
    fn from((a, b): (i64, i64)) -> Self {
        Self(vec![Value::Integer(a), Value::Integer(b)])
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        Self::single(s)
    }
}
