//! Render sinks: write-only destinations for synchronized values.
//!
//! A sink receives assignments addressed by a path of record addresses and a
//! key. The path is built by chaining [`RenderPath::address`]:
//!
//! ```
//! use std::sync::Arc;
//! use graphview::render::{MemoryRender, RenderSink};
//! use graphview::{Address, Tag, Value};
//!
//! let sink: Arc<dyn RenderSink> = Arc::new(MemoryRender::new());
//! sink.address(Address::new(0x1000))
//!     .address(Address::new(0x1004))
//!     .set(&Tag::new("comment"), &Value::from("hi"))
//!     .unwrap();
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::address::{Address, Tag};
use crate::error::RenderError;
use crate::value::{UpdateMap, Value};

/// Write-only destination for synchronized values.
///
/// Writes are fire-and-forget from the view's point of view: nothing reads
/// them back.
pub trait RenderSink: Send + Sync {
    /// Assign `value` to `key` at the record reached by `path`.
    fn assign(&self, path: &[Address], key: &Tag, value: &Value) -> Result<(), RenderError>;
}

impl dyn RenderSink {
    /// Start a path at `address`.
    pub fn address(&self, address: Address) -> RenderPath<'_> {
        RenderPath {
            sink: self,
            path: vec![address],
        }
    }
}

/// Chained accessor into a [`RenderSink`].
pub struct RenderPath<'a> {
    sink: &'a dyn RenderSink,
    path: Vec<Address>,
}

impl RenderPath<'_> {
    /// Descend into a nested record.
    #[must_use]
    pub fn address(mut self, address: Address) -> Self {
        self.path.push(address);
        self
    }

    /// Assign `value` to `key` at this path.
    pub fn set(&self, key: &Tag, value: &Value) -> Result<(), RenderError> {
        self.sink.assign(&self.path, key, value)
    }

    /// The addresses making up this path.
    #[must_use]
    pub fn path(&self) -> &[Address] {
        &self.path
    }
}

impl std::fmt::Debug for RenderPath<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPath").field("path", &self.path).finish()
    }
}

/// In-memory render sink.
///
/// Keeps the last value written per `(path, key)` and a write counter, which
/// makes it the sink of choice for tests and headless embedding.
#[derive(Debug, Default)]
pub struct MemoryRender {
    slots: RwLock<BTreeMap<Vec<Address>, UpdateMap>>,
    writes: AtomicU64,
}

impl MemoryRender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value written to `key` at `path`.
    pub fn get(&self, path: &[Address], key: &Tag) -> Option<Value> {
        let slots = self.slots.read().ok()?;
        slots.get(path).and_then(|m| m.get(key)).cloned()
    }

    /// Every key written at `path`.
    pub fn slot(&self, path: &[Address]) -> UpdateMap {
        self.slots
            .read()
            .ok()
            .and_then(|s| s.get(path).cloned())
            .unwrap_or_default()
    }

    /// Total number of assignments received.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl RenderSink for MemoryRender {
    fn assign(&self, path: &[Address], key: &Tag, value: &Value) -> Result<(), RenderError> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| RenderError::BackendError("poisoned lock: assign".to_string()))?;
        slots
            .entry(path.to_vec())
            .or_default()
            .insert(key.clone(), value.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn chained_paths_address_nested_slots() {
        let render = Arc::new(MemoryRender::new());
        let sink: Arc<dyn RenderSink> = render.clone();
        let (a, b) = (Address::new(0x1000), Address::new(0x1004));
        let tag = Tag::new("comment");

        sink.address(a).set(&Tag::new("name"), &Value::from("foo")).unwrap();
        sink.address(a).address(b).set(&tag, &Value::from("hi")).unwrap();

        assert_eq!(render.get(&[a], &Tag::new("name")), Some(Value::from("foo")));
        assert_eq!(render.get(&[a, b], &tag), Some(Value::from("hi")));
        assert_eq!(render.get(&[b], &tag), None);
        assert_eq!(render.writes(), 2);
    }

    #[test]
    fn later_writes_overwrite() {
        let render = MemoryRender::new();
        let path = [Address::new(1)];
        let key = Tag::new("name");
        render.assign(&path, &key, &Value::from("a")).unwrap();
        render.assign(&path, &key, &Value::from("b")).unwrap();
        assert_eq!(render.slot(&path).len(), 1);
        assert_eq!(render.get(&path, &key), Some(Value::from("b")));
    }
}
