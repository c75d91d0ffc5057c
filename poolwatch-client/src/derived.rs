//! Derived queries
//!
//! Views over another [`RecordSource`]: [`SubQuery`] filters, [`Group`]
//! reduces each group to one record, [`NestedGroup`] keeps the members of
//! each group. They hold a reference to their source, never its data.
//! `fetch` recomputes from a fresh source fetch; `load` derives from what
//! the source already stored.

use std::cell::RefCell;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use poolwatch_core::{Record, RecordKey, RecordSet};

use crate::error::Result;
use crate::query::{RecordFilter, RecordSource, Stored, filter_stored};

/// Records partitioned by group key, members keyed as in the source
pub type NestedRecordSet = BTreeMap<RecordKey, RecordSet>;

/// Records of the source satisfying a predicate
pub struct SubQuery<'a, S: RecordSource + ?Sized> {
    source: &'a S,
    predicate: Box<dyn Fn(&Record) -> bool + 'a>,
    stored: RefCell<Option<Stored>>,
}

impl<'a, S: RecordSource + ?Sized> SubQuery<'a, S> {
    pub fn new(source: &'a S, predicate: impl Fn(&Record) -> bool + 'a) -> Self {
        Self {
            source,
            predicate: Box::new(predicate),
            stored: RefCell::new(None),
        }
    }

    fn derive(&self, data: RecordSet) -> RecordSet {
        data.into_iter()
            .filter(|(_, record)| (self.predicate)(record))
            .collect()
    }

    pub fn fetch(&self, constraint: Option<&str>) -> Result<RecordSet> {
        Ok(self.derive(self.source.fetch_records(constraint)?))
    }

    /// Keep the filtered view of the source's stored data
    ///
    /// `filter` narrows the source's stored records first; the source is
    /// not queried again.
    pub fn load(&self, filter: Option<RecordFilter<'_>>) {
        let data = self.derive(self.source.fetch_stored(filter));
        self.stored.replace(Some(Stored::new(data)));
    }

    pub fn fetch_stored(&self, filter: Option<RecordFilter<'_>>) -> RecordSet {
        filter_stored(&self.stored, filter)
    }

    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        self.stored.borrow().as_ref().map(|s| s.at)
    }
}

impl<S: RecordSource + ?Sized> RecordSource for SubQuery<'_, S> {
    fn fetch_records(&self, constraint: Option<&str>) -> Result<RecordSet> {
        self.fetch(constraint)
    }

    fn fetch_stored(&self, filter: Option<RecordFilter<'_>>) -> RecordSet {
        SubQuery::fetch_stored(self, filter)
    }
}

fn partition<F>(data: RecordSet, key_fn: F) -> BTreeMap<RecordKey, RecordSet>
where
    F: Fn(&Record) -> RecordKey,
{
    let mut groups: BTreeMap<RecordKey, RecordSet> = BTreeMap::new();
    for (key, record) in data {
        groups
            .entry(key_fn(&record))
            .or_default()
            .insert(key, record);
    }
    groups
}

/// One summary record per group of source records
pub struct Group<'a, S: RecordSource + ?Sized> {
    source: &'a S,
    key_fn: Box<dyn Fn(&Record) -> RecordKey + 'a>,
    reduce_fn: Box<dyn Fn(Vec<Record>) -> Record + 'a>,
    stored: RefCell<Option<Stored>>,
}

impl<'a, S: RecordSource + ?Sized> Group<'a, S> {
    pub fn new(
        source: &'a S,
        key_fn: impl Fn(&Record) -> RecordKey + 'a,
        reduce_fn: impl Fn(Vec<Record>) -> Record + 'a,
    ) -> Self {
        Self {
            source,
            key_fn: Box::new(key_fn),
            reduce_fn: Box::new(reduce_fn),
            stored: RefCell::new(None),
        }
    }

    fn derive(&self, data: RecordSet) -> RecordSet {
        partition(data, &self.key_fn)
            .into_iter()
            .map(|(group, members)| (group, (self.reduce_fn)(members.into_values().collect())))
            .collect()
    }

    pub fn fetch(&self, constraint: Option<&str>) -> Result<RecordSet> {
        Ok(self.derive(self.source.fetch_records(constraint)?))
    }

    /// Derive from the source's stored data, narrowed by `filter`
    pub fn load(&self, filter: Option<RecordFilter<'_>>) {
        let data = self.derive(self.source.fetch_stored(filter));
        self.stored.replace(Some(Stored::new(data)));
    }

    pub fn fetch_stored(&self, filter: Option<RecordFilter<'_>>) -> RecordSet {
        filter_stored(&self.stored, filter)
    }

    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        self.stored.borrow().as_ref().map(|s| s.at)
    }
}

impl<S: RecordSource + ?Sized> RecordSource for Group<'_, S> {
    fn fetch_records(&self, constraint: Option<&str>) -> Result<RecordSet> {
        self.fetch(constraint)
    }

    fn fetch_stored(&self, filter: Option<RecordFilter<'_>>) -> RecordSet {
        Group::fetch_stored(self, filter)
    }
}

/// Source records partitioned by group key, members kept
///
/// An optional element function transforms each group's members; without
/// one the members are kept verbatim.
pub struct NestedGroup<'a, S: RecordSource + ?Sized> {
    source: &'a S,
    key_fn: Box<dyn Fn(&Record) -> RecordKey + 'a>,
    element_fn: Option<Box<dyn Fn(RecordSet) -> RecordSet + 'a>>,
    stored: RefCell<Option<Stored<NestedRecordSet>>>,
}

impl<'a, S: RecordSource + ?Sized> NestedGroup<'a, S> {
    pub fn new(
        source: &'a S,
        key_fn: impl Fn(&Record) -> RecordKey + 'a,
        element_fn: Option<Box<dyn Fn(RecordSet) -> RecordSet + 'a>>,
    ) -> Self {
        Self {
            source,
            key_fn: Box::new(key_fn),
            element_fn,
            stored: RefCell::new(None),
        }
    }

    fn derive(&self, data: RecordSet) -> NestedRecordSet {
        let groups = partition(data, &self.key_fn);
        match &self.element_fn {
            Some(element_fn) => groups
                .into_iter()
                .map(|(group, members)| (group, element_fn(members)))
                .collect(),
            None => groups,
        }
    }

    pub fn fetch(&self, constraint: Option<&str>) -> Result<NestedRecordSet> {
        Ok(self.derive(self.source.fetch_records(constraint)?))
    }

    /// Derive from the source's stored data, narrowed by `filter`
    pub fn load(&self, filter: Option<RecordFilter<'_>>) {
        let data = self.derive(self.source.fetch_stored(filter));
        self.stored.replace(Some(Stored::new(data)));
    }

    /// Kept groups, optionally only those whose members satisfy `filter`
    pub fn fetch_stored(&self, filter: Option<&dyn Fn(&RecordSet) -> bool>) -> NestedRecordSet {
        let stored = self.stored.borrow();
        let Some(stored) = stored.as_ref() else {
            return NestedRecordSet::new();
        };
        stored
            .data
            .iter()
            .filter(|(_, members)| filter.is_none_or(|f| f(members)))
            .map(|(group, members)| (group.clone(), members.clone()))
            .collect()
    }

    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        self.stored.borrow().as_ref().map(|s| s.at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolwatch_core::Value;
    use std::cell::Cell;

    /// In-memory source counting its fetches
    struct Fixed {
        data: RecordSet,
        fetches: Cell<usize>,
        stored: RefCell<Option<Stored>>,
    }

    impl Fixed {
        fn new(data: RecordSet) -> Self {
            Self {
                data,
                fetches: Cell::new(0),
                stored: RefCell::new(None),
            }
        }

        fn load(&self) {
            self.stored.replace(Some(Stored::new(self.data.clone())));
        }
    }

    impl RecordSource for Fixed {
        fn fetch_records(&self, _constraint: Option<&str>) -> Result<RecordSet> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(self.data.clone())
        }

        fn fetch_stored(&self, filter: Option<RecordFilter<'_>>) -> RecordSet {
            filter_stored(&self.stored, filter)
        }
    }

    fn jobs() -> RecordSet {
        let mut data = RecordSet::new();
        for (proc, owner, cpus) in [(0, "alice", 1), (1, "bob", 4), (2, "alice", 2)] {
            let mut record = Record::new();
            record.insert("Owner".to_string(), Value::from(owner));
            record.insert("RequestCpus".to_string(), Value::Integer(cpus));
            data.insert(RecordKey::from((7, proc)), record);
        }
        data
    }

    fn by_owner(record: &Record) -> RecordKey {
        record
            .get("Owner")
            .cloned()
            .unwrap_or(Value::Undefined)
            .into()
    }

    #[test]
    fn test_subquery_filters_and_refetches() {
        let source = Fixed::new(jobs());
        let sub = SubQuery::new(&source, |r| r.get("Owner") == Some(&Value::from("alice")));

        let data = sub.fetch(None).unwrap();
        assert_eq!(data.len(), 2);
        assert!(data.contains_key(&RecordKey::from((7, 2))));

        sub.fetch(None).unwrap();
        assert_eq!(source.fetches.get(), 2);
    }

    #[test]
    fn test_subqueries_compose() {
        let source = Fixed::new(jobs());
        let alice = SubQuery::new(&source, |r| r.get("Owner") == Some(&Value::from("alice")));
        let big = SubQuery::new(&alice, |r| {
            r.get("RequestCpus").and_then(Value::as_i64).unwrap_or(0) > 1
        });

        let data = big.fetch(None).unwrap();
        assert_eq!(data.keys().collect::<Vec<_>>(), vec![&RecordKey::from((7, 2))]);
    }

    #[test]
    fn test_group_keys_are_distinct_key_values() {
        let source = Fixed::new(jobs());
        let group = Group::new(&source, by_owner, |members| {
            let total: i64 = members
                .iter()
                .filter_map(|r| r.get("RequestCpus").and_then(Value::as_i64))
                .sum();
            let mut out = Record::new();
            out.insert("Jobs".to_string(), Value::Integer(members.len() as i64));
            out.insert("Cpus".to_string(), Value::Integer(total));
            out
        });

        let data = group.fetch(None).unwrap();
        let keys: Vec<_> = data.keys().cloned().collect();
        assert_eq!(keys, vec![RecordKey::from("alice"), RecordKey::from("bob")]);
        assert_eq!(data[&RecordKey::from("alice")]["Cpus"], Value::Integer(3));
        assert_eq!(data[&RecordKey::from("alice")]["Jobs"], Value::Integer(2));
    }

    #[test]
    fn test_nested_group_without_element_fn_keeps_everything() {
        let source = Fixed::new(jobs());
        let nested = NestedGroup::new(&source, by_owner, None);

        let data = nested.fetch(None).unwrap();
        let regrouped: RecordSet = data.values().flat_map(|m| m.clone()).collect();
        assert_eq!(regrouped, jobs());
        assert_eq!(data[&RecordKey::from("alice")].len(), 2);
    }

    #[test]
    fn test_nested_group_element_fn() {
        let source = Fixed::new(jobs());
        let first_only: Box<dyn Fn(RecordSet) -> RecordSet> =
            Box::new(|members| members.into_iter().take(1).collect());
        let nested = NestedGroup::new(&source, by_owner, Some(first_only));

        let data = nested.fetch(None).unwrap();
        assert_eq!(data[&RecordKey::from("alice")].len(), 1);
        assert!(data[&RecordKey::from("alice")].contains_key(&RecordKey::from((7, 0))));
    }

    #[test]
    fn test_load_derives_from_source_store() {
        let source = Fixed::new(jobs());
        let group = Group::new(&source, by_owner, |members| {
            let mut out = Record::new();
            out.insert("Jobs".to_string(), Value::Integer(members.len() as i64));
            out
        });
        assert!(group.fetch_stored(None).is_empty());

        source.load();
        group.load(None);
        assert!(group.stored_at().is_some());
        assert_eq!(source.fetch_stored(None).len(), 3);

        let busy = |r: &Record| r.get("Jobs") == Some(&Value::Integer(2));
        let stored = group.fetch_stored(Some(&busy));
        assert_eq!(stored.len(), 1);
        assert!(stored.contains_key(&RecordKey::from("alice")));

        let nested = NestedGroup::new(&source, by_owner, None);
        nested.load(None);
        let pairs = |members: &RecordSet| members.len() == 2;
        assert_eq!(nested.fetch_stored(Some(&pairs)).len(), 1);
        assert_eq!(nested.fetch_stored(None).len(), 2);
        assert_eq!(source.fetches.get(), 0);
    }
}
