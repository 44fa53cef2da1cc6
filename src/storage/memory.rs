//! In-memory storage backend.
//!
//! [`InMemoryStore`] is a thread-safe graph store with stamped writes,
//! parent/child edges and a committed/working snapshot pair backing
//! commit and rollback. It is intended for embedded usage, tests, and as a
//! reference implementation of the [`Store`] contract.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::address::{Address, Tag};
use crate::error::StorageError;
use crate::query::Predicate;
use crate::storage::traits::{RecordContext, Store};
use crate::value::{ContentMap, UpdateMap, Value};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Clone)]
struct Stamped {
    value: Value,
    modified: DateTime<Utc>,
}

type Fields = BTreeMap<Tag, Stamped>;

#[derive(Debug, Clone, Default)]
struct Record {
    attributes: Fields,
    content: BTreeMap<Address, Fields>,
    children: BTreeSet<Address>,
    parents: BTreeSet<Address>,
}

#[derive(Debug, Clone, Default)]
struct Graph {
    records: BTreeMap<Address, Record>,
}

#[derive(Debug)]
struct StoreState {
    committed: Graph,
    working: Graph,
    last_stamp: DateTime<Utc>,
}

impl StoreState {
    /// Strictly increasing stamp: wall clock, bumped past the previous stamp.
    fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = if now > self.last_stamp {
            now
        } else {
            self.last_stamp + Duration::nanoseconds(1)
        };
        self.last_stamp = stamp;
        stamp
    }
}

/// Field filter folded from `newer` and `attribute` predicates.
#[derive(Debug, Default)]
struct FieldFilter {
    since: Option<DateTime<Utc>>,
    tags: Option<BTreeSet<Tag>>,
}

impl FieldFilter {
    fn from_predicates(predicates: &[Predicate]) -> Self {
        let mut filter = Self::default();
        for p in predicates {
            match p {
                Predicate::Newer { since } => {
                    filter.since = Some(filter.since.map_or(*since, |s| s.max(*since)));
                }
                Predicate::Attribute { tags } => {
                    filter.tags = Some(match filter.tags.take() {
                        Some(prev) => prev.intersection(tags).cloned().collect(),
                        None => tags.clone(),
                    });
                }
                _ => {}
            }
        }
        filter
    }

    fn apply(&self, fields: &Fields) -> UpdateMap {
        fields
            .iter()
            .filter(|(tag, _)| self.tags.as_ref().map_or(true, |t| t.contains(*tag)))
            .filter(|(_, f)| self.since.map_or(true, |s| f.modified > s))
            .map(|(tag, f)| (tag.clone(), f.value.clone()))
            .collect()
    }
}

fn walk(graph: &Graph, origin: Address, hops: i32) -> BTreeSet<Address> {
    let mut out = BTreeSet::new();
    if hops == 0 || !graph.records.contains_key(&origin) {
        return out;
    }
    let limit = hops.unsigned_abs();
    let mut seen = BTreeSet::from([origin]);
    let mut queue = VecDeque::from([(origin, 0u32)]);
    while let Some((at, dist)) = queue.pop_front() {
        if dist == limit {
            continue;
        }
        let Some(record) = graph.records.get(&at) else {
            continue;
        };
        let next = if hops > 0 { &record.children } else { &record.parents };
        for &n in next {
            if seen.insert(n) {
                out.insert(n);
                queue.push_back((n, dist + 1));
            }
        }
    }
    out
}

/// Candidate records after intersecting every record-scoping predicate.
fn candidates(graph: &Graph, predicates: &[Predicate]) -> BTreeSet<Address> {
    let mut scope: Option<BTreeSet<Address>> = None;
    for p in predicates {
        let set = match p {
            Predicate::Address { addresses } => addresses
                .iter()
                .copied()
                .filter(|a| graph.records.contains_key(a))
                .collect(),
            Predicate::Context { address } => graph
                .records
                .contains_key(address)
                .then_some(*address)
                .into_iter()
                .collect(),
            Predicate::Depth { address, hops } => walk(graph, *address, *hops),
            Predicate::Newer { .. } | Predicate::Attribute { .. } => continue,
        };
        scope = Some(match scope {
            Some(prev) => prev.intersection(&set).copied().collect(),
            None => set,
        });
    }
    scope.unwrap_or_else(|| graph.records.keys().copied().collect())
}

/// In-memory graph store.
///
/// Writes land in a working snapshot and become durable on [`Store::commit`];
/// [`Store::rollback`] discards them. Queries always read the working
/// snapshot.
#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    reads: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                committed: Graph::default(),
                working: Graph::default(),
                last_stamp: DateTime::<Utc>::MIN_UTC,
            }),
            reads: AtomicU64::new(0),
        }
    }

    /// Number of `select`, `select_content` and `address` calls served.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Creates an empty record at `address` if none exists.
    pub fn create(&self, address: Address) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("create"))?;
        state.working.records.entry(address).or_default();
        Ok(())
    }

    /// Sets attribute `tag` of the record at `address`, creating the record.
    pub fn set(
        &self,
        address: Address,
        tag: impl Into<Tag>,
        value: impl Into<Value>,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("set"))?;
        let modified = state.next_stamp();
        state
            .working
            .records
            .entry(address)
            .or_default()
            .attributes
            .insert(
                tag.into(),
                Stamped {
                    value: value.into(),
                    modified,
                },
            );
        Ok(())
    }

    /// Sets field `tag` of sub-record `sub` nested under `address`.
    pub fn set_content(
        &self,
        address: Address,
        sub: Address,
        tag: impl Into<Tag>,
        value: impl Into<Value>,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("set_content"))?;
        let modified = state.next_stamp();
        state
            .working
            .records
            .entry(address)
            .or_default()
            .content
            .entry(sub)
            .or_default()
            .insert(
                tag.into(),
                Stamped {
                    value: value.into(),
                    modified,
                },
            );
        Ok(())
    }

    /// Adds an edge `parent → child`, creating both records.
    pub fn link(&self, parent: Address, child: Address) -> Result<(), StorageError> {
        if parent == child {
            return Err(StorageError::BackendError(format!(
                "refusing self-edge at {parent}"
            )));
        }
        let mut state = self.state.write().map_err(|_| lock_err("link"))?;
        let records = &mut state.working.records;
        records.entry(parent).or_default().children.insert(child);
        records.entry(child).or_default().parents.insert(parent);
        Ok(())
    }

    /// Number of records in the working snapshot.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("len"))?;
        Ok(state.working.records.len())
    }

    /// Returns true if the working snapshot holds no records.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl Store for InMemoryStore {
    fn select(&self, predicates: &[Predicate]) -> Result<BTreeMap<Address, UpdateMap>, StorageError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read().map_err(|_| lock_err("select"))?;
        let graph = &state.working;
        let filter = FieldFilter::from_predicates(predicates);

        let mut out = BTreeMap::new();
        for ea in candidates(graph, predicates) {
            if let Some(record) = graph.records.get(&ea) {
                out.insert(ea, filter.apply(&record.attributes));
            }
        }
        Ok(out)
    }

    fn select_content(&self, predicates: &[Predicate]) -> Result<ContentMap, StorageError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read().map_err(|_| lock_err("select_content"))?;
        let graph = &state.working;
        let filter = FieldFilter::from_predicates(predicates);

        let mut out = ContentMap::new();
        for ea in candidates(graph, predicates) {
            let Some(record) = graph.records.get(&ea) else {
                continue;
            };
            for (sub, fields) in &record.content {
                let matched = filter.apply(fields);
                if !matched.is_empty() {
                    out.entry(*sub).or_default().extend(matched);
                }
            }
        }
        Ok(out)
    }

    fn address(&self, address: Address) -> Result<RecordContext, StorageError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read().map_err(|_| lock_err("address"))?;
        let record = state
            .working
            .records
            .get(&address)
            .ok_or(StorageError::RecordNotFound(address))?;
        Ok(RecordContext {
            id: address,
            attributes: record
                .attributes
                .iter()
                .map(|(tag, f)| (tag.clone(), f.value.clone()))
                .collect(),
        })
    }

    fn commit(&self) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("commit"))?;
        state.committed = state.working.clone();
        Ok(())
    }

    fn rollback(&self) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("rollback"))?;
        state.working = state.committed.clone();
        Ok(())
    }

    fn clock(&self) -> DateTime<Utc> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.next_stamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query;

    fn ea(raw: u64) -> Address {
        Address::new(raw)
    }

    fn tree() -> InMemoryStore {
        // 0x10 → 0x20 → 0x30, 0x10 → 0x21
        let store = InMemoryStore::new();
        store.link(ea(0x10), ea(0x20)).unwrap();
        store.link(ea(0x20), ea(0x30)).unwrap();
        store.link(ea(0x10), ea(0x21)).unwrap();
        store
    }

    #[test]
    fn select_filters_fields_by_tag_and_scope() {
        let store = InMemoryStore::new();
        store.set(ea(1), "name", "foo").unwrap();
        store.set(ea(1), "color", 3).unwrap();
        store.set(ea(2), "name", "bar").unwrap();

        let out = store
            .select(&[query::attribute(["name"]), query::address([ea(1)])])
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[&ea(1)].len(), 1);
        assert_eq!(out[&ea(1)][&Tag::new("name")], Value::from("foo"));
    }

    #[test]
    fn select_keeps_matched_records_with_no_fields() {
        let store = InMemoryStore::new();
        store.create(ea(1)).unwrap();
        let out = store.select(&[query::address([ea(1), ea(9)])]).unwrap();
        assert_eq!(out.keys().copied().collect::<Vec<_>>(), vec![ea(1)]);
        assert!(out[&ea(1)].is_empty());
    }

    #[test]
    fn newer_is_strict_against_store_clock() {
        let store = InMemoryStore::new();
        store.set(ea(1), "name", "foo").unwrap();
        let cursor = store.clock();

        let out = store.select(&[query::newer(cursor)]).unwrap();
        assert!(out[&ea(1)].is_empty());

        store.set(ea(1), "name", "baz").unwrap();
        let out = store.select(&[query::newer(cursor)]).unwrap();
        assert_eq!(out[&ea(1)][&Tag::new("name")], Value::from("baz"));
    }

    #[test]
    fn depth_walks_both_directions() {
        let store = tree();
        let down1 = store.select(&[query::depth(ea(0x10), 1)]).unwrap();
        assert_eq!(down1.keys().copied().collect::<Vec<_>>(), vec![ea(0x20), ea(0x21)]);

        let down2 = store.select(&[query::depth(ea(0x10), 2)]).unwrap();
        assert_eq!(down2.len(), 3);

        let up = store.select(&[query::depth(ea(0x30), -2)]).unwrap();
        assert_eq!(up.keys().copied().collect::<Vec<_>>(), vec![ea(0x10), ea(0x20)]);

        assert!(store.select(&[query::depth(ea(0x10), 0)]).unwrap().is_empty());
    }

    #[test]
    fn content_is_scoped_and_drops_empty_sub_records() {
        let store = InMemoryStore::new();
        store.set_content(ea(1), ea(0x100), "comment", "hi").unwrap();
        store.set_content(ea(1), ea(0x104), "mark", 1).unwrap();
        store.set_content(ea(2), ea(0x200), "comment", "other").unwrap();

        let out = store
            .select_content(&[query::context(ea(1)), query::attribute(["comment"])])
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[&ea(0x100)][&Tag::new("comment")], Value::from("hi"));
    }

    #[test]
    fn rollback_discards_uncommitted_writes() {
        let store = InMemoryStore::new();
        store.set(ea(1), "name", "foo").unwrap();
        store.commit().unwrap();
        store.set(ea(1), "name", "bar").unwrap();
        store.set(ea(2), "name", "new").unwrap();

        store.rollback().unwrap();
        let ctx = store.address(ea(1)).unwrap();
        assert_eq!(ctx.attributes[&Tag::new("name")], Value::from("foo"));
        assert!(matches!(store.address(ea(2)), Err(StorageError::RecordNotFound(_))));
    }

    #[test]
    fn reads_are_counted() {
        let store = tree();
        assert_eq!(store.reads(), 0);
        store.select(&[]).unwrap();
        store.select_content(&[]).unwrap();
        store.address(ea(0x10)).unwrap();
        assert_eq!(store.reads(), 3);
    }

    #[test]
    fn link_rejects_self_edge() {
        let store = InMemoryStore::new();
        assert!(store.link(ea(1), ea(1)).is_err());
    }
}
