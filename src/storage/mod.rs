//! Storage trait definitions and the in-memory backend.

mod memory;
mod traits;

pub use memory::InMemoryStore;
pub use traits::{RecordContext, Store};
