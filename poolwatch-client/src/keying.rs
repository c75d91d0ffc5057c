//! Keying decoded records into record sets
//!
//! A key part is the value of the exact-named attribute, falling back to the
//! first attribute whose name matches case-insensitively; a key attribute
//! missing under both rules is left out of the key. Only the exact-named key
//! attributes are removed from the record body, so a case-insensitive match
//! stays in the body as well. Later records replace earlier ones that share a
//! key.

use poolwatch_core::{FormatSpec, Record, RecordKey, RecordSet, Value};

/// Attribute name(s) identifying a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttrs(Vec<String>);

impl KeyAttrs {
    /// Key on a single attribute
    pub fn single(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Key on several attributes, in order
    pub fn multi<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Build the key for one record
    pub fn key_of(&self, record: &Record) -> RecordKey {
        let parts = self
            .0
            .iter()
            .filter_map(|name| lookup(record, name).cloned())
            .collect();
        RecordKey::new(parts)
    }

    fn is_key(&self, attribute: &str) -> bool {
        self.0.iter().any(|name| name == attribute)
    }
}

fn lookup<'a>(record: &'a Record, name: &str) -> Option<&'a Value> {
    record.get(name).or_else(|| {
        record
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

/// Key a list of records; later records win on collisions
pub fn key_records(records: Vec<Record>, keys: &KeyAttrs) -> RecordSet {
    let mut out = RecordSet::new();
    for record in records {
        let key = keys.key_of(&record);
        let body: Record = record
            .into_iter()
            .filter(|(name, _)| !keys.is_key(name))
            .collect();
        out.insert(key, body);
    }
    out
}

/// Coerce each projected attribute to its declared type
pub fn coerce_record(record: Record, format: &FormatSpec) -> Record {
    record
        .into_iter()
        .map(|(name, value)| match format.type_of(&name) {
            Some(attr_type) => (name, value.coerce(attr_type)),
            None => (name, value),
        })
        .collect()
}
