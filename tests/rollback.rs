use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use graphview::{
    Address, ContentMap, FailurePolicy, InMemoryStore, MemoryRender, Predicate, RecordContext,
    StorageError, Store, Tag, UpdateMap, Value, View, ViewConfig,
};

fn ea(raw: u64) -> Address {
    Address::new(raw)
}

/// Store whose content queries can be switched to fail.
struct FlakyStore {
    inner: InMemoryStore,
    fail_content: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            fail_content: AtomicBool::new(false),
        }
    }
}

impl Store for FlakyStore {
    fn select(&self, predicates: &[Predicate]) -> Result<BTreeMap<Address, UpdateMap>, StorageError> {
        self.inner.select(predicates)
    }

    fn select_content(&self, predicates: &[Predicate]) -> Result<ContentMap, StorageError> {
        if self.fail_content.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError("content index offline".to_string()));
        }
        self.inner.select_content(predicates)
    }

    fn address(&self, address: Address) -> Result<RecordContext, StorageError> {
        self.inner.address(address)
    }

    fn commit(&self) -> Result<(), StorageError> {
        self.inner.commit()
    }

    fn rollback(&self) -> Result<(), StorageError> {
        self.inner.rollback()
    }

    fn clock(&self) -> DateTime<Utc> {
        self.inner.clock()
    }
}

fn committed_view(tags: &[&str]) -> (Arc<InMemoryStore>, Arc<MemoryRender>, View) {
    let store = Arc::new(InMemoryStore::new());
    store.set(ea(1), "name", "foo").unwrap();
    store.commit().unwrap();

    let render = Arc::new(MemoryRender::new());
    let mut view = View::new(store.clone(), render.clone(), tags.iter().copied()).unwrap();
    view.add([ea(1)]).unwrap();
    view.sync().unwrap();
    (store, render, view)
}

#[test]
fn rollback_restores_committed_values() {
    let (store, render, mut view) = committed_view(&["name"]);
    store.set(ea(1), "name", "bar").unwrap();
    view.sync().unwrap();
    assert_eq!(render.get(&[ea(1)], &Tag::new("name")), Some(Value::from("bar")));

    let report = view.rollback().unwrap();
    let expected: UpdateMap = [(Tag::new("name"), Value::from("foo"))].into_iter().collect();
    assert_eq!(report.updates(ea(1)), Some(&expected));
    assert_eq!(
        view.node(ea(1)).unwrap().attribute(&Tag::new("name")),
        Some(&Value::from("foo"))
    );
    assert_eq!(render.get(&[ea(1)], &Tag::new("name")), Some(Value::from("foo")));
}

#[test]
fn second_rollback_reports_nothing() {
    let (store, render, mut view) = committed_view(&["name"]);
    store.set(ea(1), "name", "bar").unwrap();
    view.sync().unwrap();

    assert!(!view.rollback().unwrap().is_empty());
    let writes = render.writes();

    let second = view.rollback().unwrap();
    assert!(second.is_empty());
    assert!(second.content().is_empty());
    assert_eq!(render.writes(), writes);
}

#[test]
fn rollback_drops_fields_that_vanished() {
    let (store, _render, mut view) = committed_view(&["name", "size", "comment"]);
    store.set(ea(1), "size", 4).unwrap();
    store.set_content(ea(1), ea(0x10), "comment", "draft").unwrap();
    view.sync().unwrap();
    assert!(view.node(ea(1)).unwrap().attribute(&Tag::new("size")).is_some());
    assert!(view.node(ea(1)).unwrap().content_group(&Tag::new("comment")).is_some());

    let report = view.rollback().unwrap();
    assert!(report.is_empty());
    let node = view.node(ea(1)).unwrap();
    assert!(node.attribute(&Tag::new("size")).is_none());
    assert!(node.content().is_empty());
    assert_eq!(node.attribute(&Tag::new("name")), Some(&Value::from("foo")));
}

#[test]
fn commit_makes_writes_survive_rollback() {
    let (store, _render, mut view) = committed_view(&["name"]);
    store.set(ea(1), "name", "bar").unwrap();
    view.commit().unwrap();

    view.rollback().unwrap();
    assert_eq!(
        view.node(ea(1)).unwrap().attribute(&Tag::new("name")),
        Some(&Value::from("bar"))
    );
}

fn flaky_view(policy: FailurePolicy) -> (Arc<FlakyStore>, View) {
    let store = Arc::new(FlakyStore::new());
    store.inner.set(ea(1), "name", "foo").unwrap();

    let render = Arc::new(MemoryRender::new());
    let config = ViewConfig::default()
        .with_label("flaky")
        .with_failure_policy(policy);
    let mut view = View::with_config(store.clone(), render, ["name"], config).unwrap();
    view.add([ea(1)]).unwrap();
    view.sync().unwrap();
    (store, view)
}

#[test]
fn keep_partial_leaves_attribute_merges_applied() {
    let (store, mut view) = flaky_view(FailurePolicy::KeepPartial);
    let age = view.age();
    store.inner.set(ea(1), "name", "bar").unwrap();
    store.fail_content.store(true, Ordering::SeqCst);

    let err = view.sync().unwrap_err();
    assert!(err.is_storage());
    assert_eq!(view.age(), age);
    assert_eq!(
        view.node(ea(1)).unwrap().attribute(&Tag::new("name")),
        Some(&Value::from("bar"))
    );
}

#[test]
fn restore_policy_undoes_the_failed_pass() {
    let (store, mut view) = flaky_view(FailurePolicy::Restore);
    let age = view.age();
    store.inner.set(ea(1), "name", "bar").unwrap();
    store.fail_content.store(true, Ordering::SeqCst);

    assert!(view.sync().is_err());
    assert_eq!(view.age(), age);
    assert_eq!(
        view.node(ea(1)).unwrap().attribute(&Tag::new("name")),
        Some(&Value::from("foo"))
    );

    // the cursor did not move, so the change is picked up once the store recovers
    store.fail_content.store(false, Ordering::SeqCst);
    let report = view.sync().unwrap();
    assert!(report.completed().contains(&ea(1)));
    assert_eq!(view.config().label, "flaky");
}
