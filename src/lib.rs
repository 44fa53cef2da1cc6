//! # graphview - incremental view synchronization over graph stores
//!
//! graphview keeps a subset of records from a graph-shaped store in sync with
//! downstream consumers. A [`View`] tracks record addresses, remembers how far
//! it has synchronized, and on each poll pulls only what changed, dispatching
//! per-record and per-content-group callbacks that forward values into a
//! render sink.
//!
//! ## Core Concepts
//!
//! - **Address**: opaque identifier of a store record (a graph vertex)
//! - **Tag**: an attribute or content category under synchronization
//! - **Age**: the sync cursor, "synchronized up to here"
//! - **Watch**: the tags a view keeps synchronized
//! - **Node**: a view's cached copy of one record
//! - **Trigger**: callbacks keyed by address or (address, tag)
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use graphview::render::MemoryRender;
//! use graphview::storage::InMemoryStore;
//! use graphview::{query, Address, View};
//!
//! let store = Arc::new(InMemoryStore::new());
//! store.set(Address::new(0x2000), "name", "sub_2000")?;
//! store.set(Address::new(0x3000), "name", "sub_3000")?;
//!
//! let render = Arc::new(MemoryRender::new());
//! let mut view = View::new(store, render, ["name"])?;
//! assert_eq!(view.extend(&[query::address([0x2000u64, 0x3000])])?, 2);
//!
//! let report = view.sync()?;
//! assert_eq!(report.len(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Synchronization is a cooperative poll: nothing runs in the background, the
//! caller decides when to call [`View::sync`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod address;
pub mod error;
pub mod node;
pub mod query;
pub mod render;
pub mod storage;
pub mod time;
pub mod trigger;
pub mod value;
pub mod view;
pub mod watch;

// Re-export primary types at crate root for convenience
pub use address::{Address, Tag, ViewId};
pub use error::{CallbackError, RenderError, StorageError, TriggerError, ViewError, ViewResult};
pub use node::Node;
pub use query::Predicate;
pub use render::{MemoryRender, RenderSink};
pub use storage::{InMemoryStore, RecordContext, Store};
pub use time::Age;
pub use trigger::{Callback, CallbackKey, TriggerEvent, TriggerRegistry};
pub use value::{ContentMap, UpdateMap, Value};
pub use view::{FailurePolicy, SyncReport, View, ViewConfig};
pub use watch::{Watch, WatchHandle};
