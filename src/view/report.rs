use std::collections::{BTreeMap, BTreeSet};

use crate::address::{Address, Tag};
use crate::value::UpdateMap;

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    updated: BTreeMap<Address, UpdateMap>,
    content: BTreeMap<Address, BTreeSet<Tag>>,
    failed_callbacks: usize,
}

impl SyncReport {
    pub(crate) fn record_update(&mut self, address: Address, updates: UpdateMap) {
        self.updated.insert(address, updates);
    }

    pub(crate) fn record_content(&mut self, address: Address, tag: Tag) {
        self.content.entry(address).or_default().insert(tag);
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed_callbacks += 1;
    }

    /// Addresses whose attributes changed during the pass.
    #[must_use]
    pub fn completed(&self) -> BTreeSet<Address> {
        self.updated.keys().copied().collect()
    }

    /// Attribute updates per address.
    #[must_use]
    pub const fn updated(&self) -> &BTreeMap<Address, UpdateMap> {
        &self.updated
    }

    /// Changed attributes of one address.
    #[must_use]
    pub fn updates(&self, address: Address) -> Option<&UpdateMap> {
        self.updated.get(&address)
    }

    /// Content groups that changed under each address.
    #[must_use]
    pub const fn content(&self) -> &BTreeMap<Address, BTreeSet<Tag>> {
        &self.content
    }

    /// Callback dispatches that signalled failure.
    #[must_use]
    pub const fn failed_callbacks(&self) -> usize {
        self.failed_callbacks
    }

    /// True when no attribute of any address changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
    }

    /// Number of addresses with attribute changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.updated.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn completed_is_keys_of_updated() {
        let mut report = SyncReport::default();
        assert!(report.is_empty());

        let mut u = UpdateMap::new();
        u.insert(Tag::new("name"), Value::from("foo"));
        report.record_update(Address::new(2), u.clone());
        report.record_update(Address::new(1), u);
        report.record_content(Address::new(3), Tag::new("comment"));

        assert_eq!(
            report.completed().into_iter().collect::<Vec<_>>(),
            vec![Address::new(1), Address::new(2)]
        );
        assert_eq!(report.len(), 2);
        assert!(report.updates(Address::new(3)).is_none());
        assert_eq!(report.content()[&Address::new(3)].len(), 1);
    }
}
