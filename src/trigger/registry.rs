//! Callback storage and dispatch.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::address::{Address, Tag};
use crate::error::{CallbackError, TriggerError};
use crate::node::Node;
use crate::value::{UpdateMap, Value};

/// Identity callbacks are registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallbackKey {
    /// Attribute changes of one record.
    Node(Address),
    /// Changes to one named content group under a record.
    Content(Address, Tag),
}

impl CallbackKey {
    /// The record this key belongs to.
    #[must_use]
    pub const fn address(&self) -> Address {
        match self {
            Self::Node(ea) | Self::Content(ea, _) => *ea,
        }
    }
}

impl fmt::Display for CallbackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(ea) => write!(f, "{ea}"),
            Self::Content(ea, tag) => write!(f, "{ea}:{tag}"),
        }
    }
}

/// What a callback is invoked with.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy)]
pub enum TriggerEvent<'a> {
    /// Attributes of `node` changed; `updates` holds only the changed fields.
    Attributes {
        node: &'a Node,
        updates: &'a UpdateMap,
    },
    /// Content group `tag` under `node` changed, keyed by sub-address.
    Content {
        node: &'a Node,
        tag: &'a Tag,
        updates: &'a BTreeMap<Address, Value>,
    },
}

impl TriggerEvent<'_> {
    /// Address of the record the event is about.
    #[must_use]
    pub fn address(&self) -> Address {
        match self {
            Self::Attributes { node, .. } | Self::Content { node, .. } => node.id(),
        }
    }
}

/// A subscriber registered in a [`TriggerRegistry`].
pub trait Callback: Send + Sync {
    /// Name used when reporting failures.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle one event. An error is a failure signal; it does not stop the
    /// remaining callbacks under the same key.
    fn call(&self, event: &TriggerEvent<'_>) -> Result<(), CallbackError>;
}

impl<F> Callback for F
where
    F: Fn(&TriggerEvent<'_>) -> Result<(), CallbackError> + Send + Sync,
{
    fn call(&self, event: &TriggerEvent<'_>) -> Result<(), CallbackError> {
        self(event)
    }
}

/// Wrap a closure as a shareable callback.
pub fn callback<F>(f: F) -> Arc<dyn Callback>
where
    F: Fn(&TriggerEvent<'_>) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Ordered callback lists keyed by [`CallbackKey`].
#[derive(Default)]
pub struct TriggerRegistry {
    entries: HashMap<CallbackKey, Vec<Arc<dyn Callback>>>,
}

impl TriggerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` under `key`, after anything already registered.
    pub fn add(&mut self, key: CallbackKey, callback: Arc<dyn Callback>) {
        self.entries.entry(key).or_default().push(callback);
    }

    /// Invoke every callback under `key` in registration order.
    ///
    /// All callbacks run even if some fail. Returns how many ran, or an
    /// aggregate error describing the failures.
    pub fn execute(&self, key: &CallbackKey, event: &TriggerEvent<'_>) -> Result<usize, TriggerError> {
        let Some(callbacks) = self.entries.get(key) else {
            return Ok(0);
        };

        let mut failed = 0usize;
        let mut first = None;
        for cb in callbacks {
            if let Err(err) = cb.call(event) {
                failed += 1;
                first.get_or_insert(err);
            }
        }

        match first {
            None => Ok(callbacks.len()),
            Some(first) => Err(TriggerError::CallbacksFailed {
                key: key.clone(),
                failed,
                total: callbacks.len(),
                first,
            }),
        }
    }

    /// Number of callbacks under `key`.
    #[must_use]
    pub fn count(&self, key: &CallbackKey) -> usize {
        self.entries.get(key).map_or(0, Vec::len)
    }

    /// Number of callbacks bound to `address`, node-level and content-level.
    #[must_use]
    pub fn bindings_for(&self, address: Address) -> usize {
        self.entries
            .iter()
            .filter(|(key, _)| key.address() == address)
            .map(|(_, cbs)| cbs.len())
            .sum()
    }

    /// Total number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }
}

impl fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, cbs) in &self.entries {
            let names: Vec<&str> = cbs.iter().map(|cb| cb.name()).collect();
            map.entry(&key.to_string(), &names);
        }
        map.finish()
    }
}
