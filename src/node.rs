//! Cached view of one store record.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::address::{Address, Tag};
use crate::error::StorageError;
use crate::query::{self, Predicate};
use crate::storage::{RecordContext, Store};
use crate::value::{ContentMap, UpdateMap, Value};

/// Content groups of a node: tag → (sub-address → value).
pub type ContentGroups = BTreeMap<Tag, BTreeMap<Address, Value>>;

/// A view's cached copy of one record's attributes and named content groups.
///
/// Nodes are owned by a [`View`](crate::View) and mutated only by its sync
/// pass. Navigation helpers take the store explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    context: RecordContext,
    attributes: UpdateMap,
    content: ContentGroups,
}

impl Node {
    /// Creates an empty node for the record described by `context`.
    ///
    /// Attributes start empty; the next sync fills them.
    #[must_use]
    pub fn new(context: RecordContext) -> Self {
        Self {
            context,
            attributes: UpdateMap::new(),
            content: ContentGroups::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> Address {
        self.context.id
    }

    /// The record context fetched when the node was added.
    #[must_use]
    pub const fn context(&self) -> &RecordContext {
        &self.context
    }

    #[must_use]
    pub const fn attributes(&self) -> &UpdateMap {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, tag: &Tag) -> Option<&Value> {
        self.attributes.get(tag)
    }

    #[must_use]
    pub const fn content(&self) -> &ContentGroups {
        &self.content
    }

    /// One content group, keyed by sub-address.
    #[must_use]
    pub fn content_group(&self, tag: &Tag) -> Option<&BTreeMap<Address, Value>> {
        self.content.get(tag)
    }

    /// Addresses one hop above this node.
    pub fn up(&self, store: &dyn Store) -> Result<BTreeSet<Address>, StorageError> {
        Ok(store.select(&[query::depth(self.id(), -1)])?.into_keys().collect())
    }

    /// Addresses one hop below this node.
    pub fn down(&self, store: &dyn Store) -> Result<BTreeSet<Address>, StorageError> {
        Ok(store.select(&[query::depth(self.id(), 1)])?.into_keys().collect())
    }

    /// Run a content query scoped to this node.
    pub fn select(&self, store: &dyn Store, predicates: &[Predicate]) -> Result<ContentMap, StorageError> {
        let mut scoped = predicates.to_vec();
        scoped.push(query::context(self.id()));
        store.select_content(&scoped)
    }

    /// Overlay `updates` onto the cached attributes; later values win.
    pub(crate) fn merge_attributes(&mut self, updates: &UpdateMap) {
        self.attributes
            .extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Replace the cached attributes wholesale.
    pub(crate) fn replace_attributes(&mut self, attributes: UpdateMap) {
        self.attributes = attributes;
    }

    /// Overlay a content query result onto the cached content groups.
    pub(crate) fn merge_content(&mut self, result: &ContentMap) {
        for (sub, fields) in result {
            for (tag, value) in fields {
                self.content
                    .entry(tag.clone())
                    .or_default()
                    .insert(*sub, value.clone());
            }
        }
    }

    /// Replace the cached content groups with `result`.
    pub(crate) fn replace_content(&mut self, result: &ContentMap) {
        self.content.clear();
        self.merge_content(result);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node {:#010x} attributes:{} content:{}",
            self.id(),
            self.attributes.len(),
            self.content.values().map(BTreeMap::len).sum::<usize>()
        )
    }
}
