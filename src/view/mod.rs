//! Views: incrementally synchronized subsets of a graph store.
//!
//! A [`View`] tracks a set of record addresses, keeps a cached [`Node`] for
//! each, and on every [`View::sync`] pulls only what changed since its cursor.
//! Changes are dispatched through a [`TriggerRegistry`] whose default
//! subscribers forward values into a [`RenderSink`].
//!
//! A sync pass runs in two phases:
//!
//! 1. **Attributes**: one query over all tracked addresses for watched fields
//!    newer than the cursor; changed nodes fire `CallbackKey::Node`.
//! 2. **Content**: one query per tracked address for nested sub-records,
//!    whether or not the address's own attributes changed; each changed
//!    content group fires `CallbackKey::Content`.
//!
//! The cursor only advances once both phases finish for every address.
//! Addresses added since the last pass are queried from the epoch instead, so
//! their existing data arrives without re-reporting the rest of the view.

mod config;
mod report;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Span};

use crate::address::{Address, Tag, ViewId};
use crate::error::ViewResult;
use crate::node::Node;
use crate::query::{self, Predicate};
use crate::render::RenderSink;
use crate::storage::Store;
use crate::time::Age;
use crate::trigger::{
    Callback, CallbackKey, ForwardAttributes, ForwardContent, TriggerEvent, TriggerRegistry,
};
use crate::value::{UpdateMap, Value};
use crate::watch::{Watch, WatchHandle};

pub use config::{FailurePolicy, ViewConfig};
pub use report::SyncReport;

/// How a pass folds fetched data into the node cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// Overlay fetched fields and report all of them.
    Incremental,
    /// Replace cached fields with the fetched state and report only fields
    /// whose value differs from the cache.
    Reconcile,
}

/// An incrementally synchronized set of store records.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use graphview::render::MemoryRender;
/// use graphview::storage::InMemoryStore;
/// use graphview::{Address, View};
///
/// let store = Arc::new(InMemoryStore::new());
/// let ea = Address::new(0x1000);
/// store.set(ea, "name", "foo")?;
///
/// let render = Arc::new(MemoryRender::new());
/// let mut view = View::new(store, render, ["name"])?;
/// view.add([ea])?;
///
/// let report = view.sync()?;
/// assert!(report.completed().contains(&ea));
/// assert!(view.sync()?.is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct View {
    id: ViewId,
    nodes: BTreeMap<Address, Node>,
    watch: Watch,
    age: Age,
    /// Added since the last successful pass; synced from the epoch.
    pending: BTreeSet<Address>,
    triggers: TriggerRegistry,
    store: Arc<dyn Store>,
    render: Arc<dyn RenderSink>,
    config: ViewConfig,
    span: Span,
}

impl View {
    /// Create a view with default configuration and run an initial sync.
    pub fn new<I, T>(store: Arc<dyn Store>, render: Arc<dyn RenderSink>, tags: I) -> ViewResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        Self::with_config(store, render, tags, ViewConfig::default())
    }

    /// Create a view and run an initial sync.
    ///
    /// # Errors
    ///
    /// Propagates store failures from the initial sync.
    pub fn with_config<I, T>(
        store: Arc<dyn Store>,
        render: Arc<dyn RenderSink>,
        tags: I,
        config: ViewConfig,
    ) -> ViewResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        let id = ViewId::new();
        let span = config
            .span
            .clone()
            .unwrap_or_else(|| info_span!("view", %id, label = %config.label));

        let mut view = Self {
            id,
            nodes: BTreeMap::new(),
            watch: Watch::new(tags),
            age: Age::EPOCH,
            pending: BTreeSet::new(),
            triggers: TriggerRegistry::new(),
            store,
            render,
            config,
            span,
        };
        view.dirty();
        view.sync()?;
        Ok(view)
    }

    /// A fresh, empty view sharing this view's store, sink, tags and config.
    fn sibling(&self) -> ViewResult<Self> {
        Self::with_config(
            Arc::clone(&self.store),
            Arc::clone(&self.render),
            self.watch.iter().cloned(),
            self.config.clone(),
        )
    }

    // syncing records with the store

    /// Force the next sync to treat all matching data as new.
    pub fn dirty(&mut self) {
        self.age.reset();
    }

    /// Commit the store's pending writes.
    pub fn commit(&self) -> ViewResult<()> {
        let _enter = self.span.enter();
        self.store.commit()?;
        debug!("committed");
        Ok(())
    }

    /// Roll the store back and reconcile every node with the result.
    ///
    /// Only values that differ from the cached copy are dispatched and
    /// reported, so a second rollback with no store change in between
    /// reports nothing.
    pub fn rollback(&mut self) -> ViewResult<SyncReport> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.store.rollback()?;
        self.dirty();
        self.pass(Pass::Reconcile)
    }

    /// Pull changes since the last sync and dispatch them. Call this every
    /// once in a while.
    ///
    /// # Errors
    ///
    /// Store failures propagate and leave the cursor where it was; callback
    /// failures are logged and counted in the report instead.
    pub fn sync(&mut self) -> ViewResult<SyncReport> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.pass(Pass::Incremental)
    }

    fn pass(&mut self, mode: Pass) -> ViewResult<SyncReport> {
        if self.watch.is_empty() {
            info!("refusing to sync due to an empty watch");
            return Ok(SyncReport::default());
        }

        let snapshot = match self.config.on_failure {
            FailurePolicy::Restore => Some(self.nodes.clone()),
            FailurePolicy::KeepPartial => None,
        };

        self.run(mode).map_err(|err| {
            if let Some(nodes) = snapshot {
                self.nodes = nodes;
                warn!(error = %err, "sync failed; node cache restored");
            } else {
                warn!(error = %err, "sync failed; partial merges kept");
            }
            err
        })
    }

    fn run(&mut self, mode: Pass) -> ViewResult<SyncReport> {
        let since = self.age.timestamp();
        let epoch = Age::EPOCH.timestamp();
        let tracked: Vec<Address> = self.nodes.keys().copied().collect();
        let fresh: BTreeSet<Address> = if self.age.is_epoch() {
            BTreeSet::new()
        } else {
            self.pending.clone()
        };
        let baseline = |ea: &Address| if fresh.contains(ea) { epoch } else { since };
        let mut report = SyncReport::default();

        // attributes
        let (added, settled): (Vec<Address>, Vec<Address>) =
            tracked.iter().partition(|ea| fresh.contains(*ea));
        let mut fetched: BTreeMap<Address, UpdateMap> = BTreeMap::new();
        for (from, group) in [(since, &settled), (epoch, &added)] {
            if group.is_empty() {
                continue;
            }
            fetched.extend(self.store.select(&[
                query::newer(from),
                query::attribute(self.watch.iter()),
                query::address(group.iter().copied()),
            ])?);
        }

        let mut updated: BTreeMap<Address, UpdateMap> = BTreeMap::new();
        for ea in &tracked {
            let Some(node) = self.nodes.get_mut(ea) else {
                continue;
            };
            let fields = fetched.remove(ea).unwrap_or_default();
            let changes = match mode {
                Pass::Incremental => {
                    node.merge_attributes(&fields);
                    fields
                }
                Pass::Reconcile => {
                    let changed: UpdateMap = fields
                        .iter()
                        .filter(|(tag, value)| node.attribute(tag) != Some(*value))
                        .map(|(tag, value)| (tag.clone(), value.clone()))
                        .collect();
                    node.replace_attributes(fields);
                    changed
                }
            };
            if !changes.is_empty() {
                updated.insert(*ea, changes);
            }
        }

        for (ea, changes) in &updated {
            let Some(node) = self.nodes.get(ea) else {
                continue;
            };
            let event = TriggerEvent::Attributes {
                node,
                updates: changes,
            };
            if let Err(err) = self.triggers.execute(&CallbackKey::Node(*ea), &event) {
                warn!(address = %ea, error = %err, "callback for node returned a failure");
                report.record_failure();
            }
        }
        for (ea, changes) in updated {
            report.record_update(ea, changes);
        }

        // content
        for ea in &tracked {
            let result = self.store.select_content(&[
                query::newer(baseline(ea)),
                query::attribute(self.watch.iter()),
                query::context(*ea),
            ])?;
            let Some(node) = self.nodes.get(ea) else {
                continue;
            };

            let mut groups: BTreeMap<Tag, BTreeMap<Address, Value>> = BTreeMap::new();
            for (sub, fields) in &result {
                for (tag, value) in fields {
                    let unchanged = mode == Pass::Reconcile
                        && node.content_group(tag).and_then(|g| g.get(sub)) == Some(value);
                    if !unchanged {
                        groups.entry(tag.clone()).or_default().insert(*sub, value.clone());
                    }
                }
            }

            for (tag, subs) in &groups {
                report.record_content(*ea, tag.clone());
                let event = TriggerEvent::Content {
                    node,
                    tag,
                    updates: subs,
                };
                let key = CallbackKey::Content(*ea, tag.clone());
                if let Err(err) = self.triggers.execute(&key, &event) {
                    warn!(address = %ea, %tag, error = %err, "callback for content returned a failure");
                    report.record_failure();
                }
            }

            if let Some(node) = self.nodes.get_mut(ea) {
                match mode {
                    Pass::Incremental => node.merge_content(&result),
                    Pass::Reconcile => node.replace_content(&result),
                }
            }
        }

        self.age.advance(self.store.clock());
        self.pending.clear();
        debug!(
            updated = report.len(),
            content = report.content().len(),
            failed = report.failed_callbacks(),
            age = %self.age,
            "sync complete"
        );
        Ok(report)
    }

    // adding nodes to the view

    /// Track `addresses`, binding their render forwarders. Returns how many
    /// were newly tracked.
    ///
    /// Already-tracked addresses are skipped. The next sync delivers the new
    /// nodes' existing data without re-reporting nodes tracked before.
    ///
    /// # Errors
    ///
    /// Propagates the store failure for the first address that cannot be
    /// looked up; addresses added before it stay tracked.
    pub fn add<I>(&mut self, addresses: I) -> ViewResult<usize>
    where
        I: IntoIterator,
        I::Item: Into<Address>,
    {
        let mut added = 0;
        for ea in addresses {
            let ea = ea.into();
            if self.nodes.contains_key(&ea) {
                debug!(address = %ea, "already tracked");
                continue;
            }

            let node = Node::new(self.store.address(ea)?);
            self.nodes.insert(ea, node);
            self.pending.insert(ea);

            self.triggers.add(
                CallbackKey::Node(ea),
                Arc::new(ForwardAttributes::new(Arc::clone(&self.render), ea)),
            );
            for tag in &self.watch {
                self.triggers.add(
                    CallbackKey::Content(ea, tag.clone()),
                    Arc::new(ForwardContent::new(Arc::clone(&self.render), ea, tag.clone())),
                );
            }
            added += 1;
        }
        Ok(added)
    }

    /// Track every address the store returns for `predicates`.
    pub fn extend(&mut self, predicates: &[Predicate]) -> ViewResult<usize> {
        let found = self.store.select(predicates)?;
        self.add(found.into_keys())
    }

    // deriving views

    /// A new view over the tracked addresses that also match `predicates`.
    ///
    /// The receiver is left untouched; the new view has not synced its nodes.
    pub fn select(&self, predicates: &[Predicate]) -> ViewResult<Self> {
        let mut sub = self.sibling()?;
        if !self.nodes.is_empty() {
            let mut scoped = predicates.to_vec();
            scoped.push(query::address(self.nodes.keys().copied()));
            sub.extend(&scoped)?;
        }
        Ok(sub)
    }

    /// A new view over the tracked addresses plus everything within `depth`
    /// hops of them, in both directions.
    pub fn grow(&self, depth: i32) -> ViewResult<Self> {
        let mut grown = self.sibling()?;
        grown.add(self.nodes.keys().copied())?;

        let hops = depth.saturating_abs();
        if hops == 0 {
            return Ok(grown);
        }
        for ea in self.nodes.keys() {
            grown.extend(&[query::depth(*ea, hops)])?;
            grown.extend(&[query::depth(*ea, -hops)])?;
        }
        Ok(grown)
    }

    // navigation

    /// Addresses one hop above the tracked node at `address`; empty when the
    /// address is not tracked.
    pub fn up(&self, address: Address) -> ViewResult<BTreeSet<Address>> {
        match self.nodes.get(&address) {
            Some(node) => Ok(node.up(self.store.as_ref())?),
            None => Ok(BTreeSet::new()),
        }
    }

    /// Addresses one hop below the tracked node at `address`; empty when the
    /// address is not tracked.
    pub fn down(&self, address: Address) -> ViewResult<BTreeSet<Address>> {
        match self.nodes.get(&address) {
            Some(node) => Ok(node.down(self.store.as_ref())?),
            None => Ok(BTreeSet::new()),
        }
    }

    // subscribers

    /// Register an extra callback after the built-in forwarders.
    pub fn subscribe(&mut self, key: CallbackKey, callback: Arc<dyn Callback>) {
        self.triggers.add(key, callback);
    }

    #[must_use]
    pub const fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    // accessors

    #[must_use]
    pub const fn id(&self) -> ViewId {
        self.id
    }

    /// The sync cursor.
    #[must_use]
    pub const fn age(&self) -> Age {
        self.age
    }

    #[must_use]
    pub const fn watch(&self) -> &Watch {
        &self.watch
    }

    /// Grow the watch; adding tags marks the view dirty.
    pub fn watch_mut(&mut self) -> WatchHandle<'_> {
        WatchHandle::new(&mut self.watch, &mut self.age)
    }

    #[must_use]
    pub fn node(&self, address: Address) -> Option<&Node> {
        self.nodes.get(&address)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.nodes.keys().copied()
    }

    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        self.nodes.contains_key(&address)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub const fn config(&self) -> &ViewConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    #[must_use]
    pub fn render(&self) -> &Arc<dyn RenderSink> {
        &self.render
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<String> = self.nodes.keys().map(ToString::to_string).collect();
        write!(f, "view {} watch:{} node:[{}]", self.id, self.watch, nodes.join(","))
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id)
            .field("watch", &self.watch)
            .field("age", &self.age)
            .field("pending", &self.pending)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("triggers", &self.triggers.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
