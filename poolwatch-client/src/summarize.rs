//! Counting and listing records by a hash function
//!
//! A hash function maps a record to a [`SummaryKey`]. A scalar key tallies
//! at the top level; a path key nests one level per element, tallying under
//! the last one. Records hashing to `None`, to an empty path, or to a path
//! holding an undefined value are left out.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use poolwatch_core::{Record, RecordKey, RecordSet, Value};
use tracing::warn;

use crate::error::Result;
use crate::query::{RecordFilter, RecordSource};

/// Where a record is tallied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryKey {
    Scalar(Value),
    Path(Vec<Value>),
}

impl SummaryKey {
    fn into_path(self) -> Vec<Value> {
        match self {
            SummaryKey::Scalar(value) => vec![value],
            SummaryKey::Path(path) => path,
        }
    }
}

impl From<Value> for SummaryKey {
    fn from(value: Value) -> Self {
        SummaryKey::Scalar(value)
    }
}

impl From<Vec<Value>> for SummaryKey {
    fn from(path: Vec<Value>) -> Self {
        SummaryKey::Path(path)
    }
}

/// A node of a summary tree
#[derive(Debug, Clone, PartialEq)]
pub enum Tally<L> {
    Leaf(L),
    Nested(BTreeMap<Value, Tally<L>>),
}

impl Tally<usize> {
    /// Sum of all counts below this node
    pub fn total(&self) -> usize {
        match self {
            Tally::Leaf(count) => *count,
            Tally::Nested(children) => children.values().map(Tally::total).sum(),
        }
    }
}

/// Counts per hash value
pub type CountTree = BTreeMap<Value, Tally<usize>>;

/// Record keys per hash value
pub type ListTree = BTreeMap<Value, Tally<Vec<RecordKey>>>;

/// Hash function for nested summaries
pub type HashFn<'a> = dyn Fn(&Record) -> Option<SummaryKey> + 'a;

/// Hash function for flat summaries
pub type FlatHashFn<'a> = dyn Fn(&Record) -> Option<Value> + 'a;

/// Sum of all counts in a tree
pub fn total(tree: &CountTree) -> usize {
    tree.values().map(Tally::total).sum()
}

/// Whether tallying at `prefix`/`last` would run through a leaf or land on
/// a branch
fn conflicts<L>(tree: &BTreeMap<Value, Tally<L>>, prefix: &[Value], last: &Value) -> bool {
    let mut node = tree;
    for step in prefix {
        match node.get(step) {
            Some(Tally::Nested(children)) => node = children,
            Some(Tally::Leaf(_)) => return true,
            None => return false,
        }
    }
    matches!(node.get(last), Some(Tally::Nested(_)))
}

/// The tally path of `record`, `None` when it is not counted
fn summary_path(hash: &HashFn<'_>, record: &Record) -> Option<Vec<Value>> {
    let path = hash(record)?.into_path();
    (!path.is_empty() && !path.iter().any(Value::is_undefined)).then_some(path)
}

/// Descend `path`, creating branches, and update the leaf at its end
///
/// Returns `false` and leaves the tree untouched on a conflicting shape.
fn accumulate<L: Default>(
    tree: &mut BTreeMap<Value, Tally<L>>,
    path: &[Value],
    update: impl FnOnce(&mut L),
) -> bool {
    let Some((last, prefix)) = path.split_last() else {
        return false;
    };
    if conflicts(tree, prefix, last) {
        return false;
    }

    let mut node = tree;
    for step in prefix {
        match node
            .entry(step.clone())
            .or_insert_with(|| Tally::Nested(BTreeMap::new()))
        {
            Tally::Nested(children) => node = children,
            Tally::Leaf(_) => return false,
        }
    }
    match node
        .entry(last.clone())
        .or_insert_with(|| Tally::Leaf(L::default()))
    {
        Tally::Leaf(leaf) => {
            update(leaf);
            true
        }
        Tally::Nested(_) => false,
    }
}

/// Nested count of the hash values of `data`
pub fn count_records(data: &RecordSet, hash: &HashFn<'_>) -> CountTree {
    let mut tree = CountTree::new();
    for (key, record) in data {
        let Some(path) = summary_path(hash, record) else {
            continue;
        };
        if !accumulate(&mut tree, &path, |count| *count += 1) {
            warn!("Skipping record {}: summary path {:?} conflicts with earlier ones", key, path);
        }
    }
    tree
}

/// Single-level count of scalar hash values
pub fn count_records_flat(data: &RecordSet, hash: &FlatHashFn<'_>) -> BTreeMap<Value, usize> {
    let mut values: Vec<Value> = data
        .values()
        .filter_map(hash)
        .filter(|value| !value.is_undefined())
        .collect();
    values.sort();
    values
        .chunk_by(|a, b| a == b)
        .map(|group| (group[0].clone(), group.len()))
        .collect()
}

/// Nested lists of record keys per hash value
pub fn list_records(data: &RecordSet, hash: &HashFn<'_>) -> ListTree {
    let mut tree = ListTree::new();
    for (key, record) in data {
        let Some(path) = summary_path(hash, record) else {
            continue;
        };
        if !accumulate(&mut tree, &path, |keys| keys.push(key.clone())) {
            warn!("Skipping record {}: summary path {:?} conflicts with earlier ones", key, path);
        }
    }
    tree
}

/// Recursively add `new` into `base`
pub fn add_tallies(base: &mut CountTree, new: &CountTree) {
    for (value, tally) in new {
        match base.entry(value.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(tally.clone());
            }
            Entry::Occupied(mut slot) => match (slot.get_mut(), tally) {
                (Tally::Leaf(count), Tally::Leaf(more)) => *count += more,
                (Tally::Nested(children), Tally::Nested(more)) => add_tallies(children, more),
                _ => warn!("Cannot add tallies of different shapes under {}", value),
            },
        }
    }
}

/// Summaries of one record source
pub struct Summarize<'a, S: RecordSource + ?Sized> {
    source: &'a S,
    hash: Box<HashFn<'a>>,
}

impl<'a, S: RecordSource + ?Sized> Summarize<'a, S> {
    pub fn new(source: &'a S, hash: impl Fn(&Record) -> Option<SummaryKey> + 'a) -> Self {
        Self {
            source,
            hash: Box::new(hash),
        }
    }

    /// Count every record under a single key
    pub fn totals(source: &'a S) -> Self {
        Self::new(source, |_| Some(SummaryKey::Scalar(Value::Integer(1))))
    }

    fn pick<'h>(&'h self, hash: Option<&'h HashFn<'h>>) -> &'h HashFn<'h> {
        hash.unwrap_or(self.hash.as_ref())
    }

    /// Fetch from the source and count; `hash` overrides the default
    pub fn count(&self, constraint: Option<&str>, hash: Option<&HashFn<'_>>) -> Result<CountTree> {
        let data = self.source.fetch_records(constraint)?;
        Ok(count_records(&data, self.pick(hash)))
    }

    /// Count the source's stored data
    pub fn count_stored(
        &self,
        filter: Option<RecordFilter<'_>>,
        hash: Option<&HashFn<'_>>,
    ) -> CountTree {
        count_records(&self.source.fetch_stored(filter), self.pick(hash))
    }

    /// Fetch and count by a scalar-only hash
    pub fn count_flat(
        &self,
        constraint: Option<&str>,
        hash: &FlatHashFn<'_>,
    ) -> Result<BTreeMap<Value, usize>> {
        let data = self.source.fetch_records(constraint)?;
        Ok(count_records_flat(&data, hash))
    }

    /// Count the stored data by a scalar-only hash
    pub fn count_stored_flat(
        &self,
        filter: Option<RecordFilter<'_>>,
        hash: &FlatHashFn<'_>,
    ) -> BTreeMap<Value, usize> {
        count_records_flat(&self.source.fetch_stored(filter), hash)
    }

    /// Fetch and list record keys per hash value
    pub fn list(&self, constraint: Option<&str>, hash: Option<&HashFn<'_>>) -> Result<ListTree> {
        let data = self.source.fetch_records(constraint)?;
        Ok(list_records(&data, self.pick(hash)))
    }

    /// List record keys of the stored data per hash value
    pub fn list_stored(
        &self,
        filter: Option<RecordFilter<'_>>,
        hash: Option<&HashFn<'_>>,
    ) -> ListTree {
        list_records(&self.source.fetch_stored(filter), self.pick(hash))
    }
}

/// Counts over several sources, added together
pub struct SummarizeMulti<'a> {
    sources: Vec<&'a dyn RecordSource>,
    hash: Box<HashFn<'a>>,
}

impl<'a> SummarizeMulti<'a> {
    pub fn new(
        sources: Vec<&'a dyn RecordSource>,
        hash: impl Fn(&Record) -> Option<SummaryKey> + 'a,
    ) -> Self {
        Self {
            sources,
            hash: Box::new(hash),
        }
    }

    pub fn count(&self, constraint: Option<&str>, hash: Option<&HashFn<'_>>) -> Result<CountTree> {
        let hash = hash.unwrap_or(self.hash.as_ref());
        let mut out = CountTree::new();
        for source in &self.sources {
            let data = source.fetch_records(constraint)?;
            add_tallies(&mut out, &count_records(&data, hash));
        }
        Ok(out)
    }

    pub fn count_stored(
        &self,
        filter: Option<RecordFilter<'_>>,
        hash: Option<&HashFn<'_>>,
    ) -> CountTree {
        let hash = hash.unwrap_or(self.hash.as_ref());
        let mut out = CountTree::new();
        for source in &self.sources {
            add_tallies(&mut out, &count_records(&source.fetch_stored(filter), hash));
        }
        out
    }
}
