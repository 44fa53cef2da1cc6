//! Trigger registry.
//!
//! Callbacks are registered under a [`CallbackKey`]: a record address for
//! attribute changes, or an (address, tag) pair for one named content group.
//! Dispatch runs every callback under a key and aggregates failures so one
//! broken subscriber never starves the rest.

/// Render-sink forwarding callbacks.
pub mod forward;
/// Callback storage and dispatch.
pub mod registry;

pub use forward::{ForwardAttributes, ForwardContent};
pub use registry::{callback, Callback, CallbackKey, TriggerEvent, TriggerRegistry};
