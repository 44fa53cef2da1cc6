//! The set of tags a view keeps synchronized.

use std::collections::BTreeSet;
use std::fmt;

use crate::address::Tag;
use crate::error::{ViewError, ViewResult};
use crate::time::Age;

/// Tags a [`View`](crate::View) keeps incrementally synchronized.
///
/// Read it through [`View::watch`](crate::View::watch); grow it through
/// [`View::watch_mut`](crate::View::watch_mut), which resets the view's sync
/// cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watch {
    tags: BTreeSet<Tag>,
}

impl Watch {
    #[must_use]
    pub fn new<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl<'a> IntoIterator for &'a Watch {
    type Item = &'a Tag;
    type IntoIter = std::collections::btree_set::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

impl fmt::Display for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.tags.iter().map(Tag::as_str).collect();
        write!(f, "[{}]", tags.join(","))
    }
}

/// Mutable access to a view's watch, tied to the view's sync cursor.
#[derive(Debug)]
pub struct WatchHandle<'v> {
    watch: &'v mut Watch,
    age: &'v mut Age,
}

impl<'v> WatchHandle<'v> {
    pub(crate) fn new(watch: &'v mut Watch, age: &'v mut Age) -> Self {
        Self { watch, age }
    }

    /// Watch more tags. Returns how many were not already watched.
    ///
    /// The owning view is marked dirty even when nothing new was added: a
    /// newly watched tag has no sync baseline.
    pub fn add<I, T>(&mut self, tags: I) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        self.age.reset();
        tags.into_iter()
            .map(Into::<Tag>::into)
            .filter(|tag| self.watch.tags.insert(tag.clone()))
            .count()
    }

    /// Stop watching tags.
    ///
    /// # Errors
    ///
    /// Always fails with [`ViewError::Unsupported`]: evicting the tags'
    /// previously rendered values from the sink has no contract yet.
    pub fn discard<I, T>(&mut self, tags: I) -> ViewResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        let _ = tags;
        Err(ViewError::Unsupported {
            operation: "watch.discard",
        })
    }
}

impl std::ops::Deref for WatchHandle<'_> {
    type Target = Watch;

    fn deref(&self) -> &Watch {
        self.watch
    }
}
