//! Abstract storage trait for graphview.
//!
//! A [`Store`] is the graph-shaped data source a view synchronizes from. The
//! view only ever talks to it through predicates and transaction control, so
//! backends can range from the in-memory reference store to a remote database.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::StorageError;
use crate::query::Predicate;
use crate::value::{ContentMap, UpdateMap};

/// Attribute context of a single record, as returned by [`Store::address`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordContext {
    /// Address of the record.
    pub id: Address,

    /// Snapshot of the record's attributes at lookup time.
    pub attributes: UpdateMap,
}

impl RecordContext {
    /// Creates a context with no attributes.
    #[must_use]
    pub fn empty(id: Address) -> Self {
        Self {
            id,
            attributes: UpdateMap::new(),
        }
    }
}

/// Storage trait for graph records.
///
/// # Predicate Semantics
/// - Predicates in one call are ANDed
/// - Record-scoping predicates choose records, field predicates choose which
///   attributes of each record are returned
/// - `select` may return a record with an empty map when the record matched
///   but none of its fields did
pub trait Store: Send + Sync {
    /// Records matching `predicates`, with their matching attributes.
    fn select(&self, predicates: &[Predicate]) -> Result<BTreeMap<Address, UpdateMap>, StorageError>;

    /// Content sub-records matching `predicates`, keyed by sub-address.
    fn select_content(&self, predicates: &[Predicate]) -> Result<ContentMap, StorageError>;

    /// Attribute context of the record at `address`.
    ///
    /// # Errors
    /// - `RecordNotFound`: if no record exists at `address`
    fn address(&self, address: Address) -> Result<RecordContext, StorageError>;

    /// Make pending writes durable.
    fn commit(&self) -> Result<(), StorageError>;

    /// Discard pending writes.
    fn rollback(&self) -> Result<(), StorageError>;

    /// Current time on the clock the store stamps modifications with.
    ///
    /// A view advances its sync cursor to this value, so backends with their
    /// own notion of time should override it.
    fn clock(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_store_object_safe(_: &dyn Store) {}

    #[test]
    fn test_empty_context() {
        let ctx = RecordContext::empty(Address::new(0x1000));
        assert_eq!(ctx.id, Address::new(0x1000));
        assert!(ctx.attributes.is_empty());
    }
}
