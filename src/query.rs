//! Query predicates.
//!
//! Predicates are built with the factory functions in this module and handed
//! to a [`Store`](crate::storage::Store) as a slice; a store ANDs them.
//!
//! ```
//! use graphview::query;
//! use graphview::{Address, Age};
//!
//! let q = [
//!     query::newer(Age::epoch()),
//!     query::attribute(["name", "comment"]),
//!     query::address([Address::new(0x1000)]),
//! ];
//! assert_eq!(q.len(), 3);
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::{Address, Tag};

/// A single query condition.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Fields modified strictly after the timestamp.
    Newer { since: DateTime<Utc> },

    /// Fields whose tag is in the set.
    Attribute { tags: BTreeSet<Tag> },

    /// Records at one of the addresses.
    Address { addresses: BTreeSet<Address> },

    /// Data nested under the record at `address`.
    Context { address: Address },

    /// Records within `hops` graph hops of `address`; negative walks upwards.
    Depth { address: Address, hops: i32 },
}

/// Fields changed after `since`.
pub fn newer(since: impl Into<DateTime<Utc>>) -> Predicate {
    Predicate::Newer {
        since: since.into(),
    }
}

/// Fields tagged with any of `tags`.
pub fn attribute<I, T>(tags: I) -> Predicate
where
    I: IntoIterator<Item = T>,
    T: Into<Tag>,
{
    Predicate::Attribute {
        tags: tags.into_iter().map(Into::into).collect(),
    }
}

/// Records at any of `addresses`.
pub fn address<I>(addresses: I) -> Predicate
where
    I: IntoIterator,
    I::Item: Into<Address>,
{
    Predicate::Address {
        addresses: addresses.into_iter().map(Into::into).collect(),
    }
}

/// Content nested under the record at `address`.
pub fn context(address: impl Into<Address>) -> Predicate {
    Predicate::Context {
        address: address.into(),
    }
}

/// Records within `hops` hops of `address` (below for positive, above for
/// negative).
pub fn depth(address: impl Into<Address>, hops: i32) -> Predicate {
    Predicate::Depth {
        address: address.into(),
        hops,
    }
}
