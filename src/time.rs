//! The sync cursor.
//!
//! An [`Age`] marks "synchronized up to here". It has two notable states:
//! the minimal epoch, which makes the next sync treat every matching field as
//! new, and a concrete timestamp taken from the store clock at the end of a
//! successful pass.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sync cursor timestamp.
///
/// # Examples
///
/// ```
/// use graphview::Age;
/// use chrono::Utc;
///
/// let mut age = Age::at(Utc::now());
/// assert!(!age.is_epoch());
///
/// age.reset();
/// assert!(age.is_epoch());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Age(DateTime<Utc>);

impl Age {
    /// The minimal epoch. Every stamped write is newer than this.
    pub const EPOCH: Self = Self(DateTime::<Utc>::MIN_UTC);

    /// Creates a cursor at the minimal epoch.
    #[must_use]
    pub const fn epoch() -> Self {
        Self::EPOCH
    }

    /// Creates a cursor at the given instant.
    #[must_use]
    pub const fn at(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Returns true if the cursor forces a full resync.
    #[must_use]
    pub fn is_epoch(&self) -> bool {
        *self == Self::EPOCH
    }

    /// Moves the cursor back to the minimal epoch.
    pub fn reset(&mut self) {
        *self = Self::EPOCH;
    }

    /// Advances the cursor to `at`.
    pub fn advance(&mut self, at: DateTime<Utc>) {
        self.0 = at;
    }

    /// The underlying timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for Age {
    fn default() -> Self {
        Self::EPOCH
    }
}

impl From<Age> for DateTime<Utc> {
    fn from(age: Age) -> Self {
        age.0
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_epoch() {
            f.write_str("epoch")
        } else {
            write!(f, "{}", self.0.to_rfc3339())
        }
    }
}
