//! Patch-and-mask layer over a read-only mapping.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};

/// Where a key's value comes from.
#[derive(Debug, PartialEq, Eq)]
pub enum Layer<'a, V> {
    /// Overridden or added locally.
    Patched(&'a V),
    /// Deleted locally.
    Masked,
    /// Untouched; ask the layer below.
    Inner,
}

/// Local overrides and deletions of some lower mapping.
///
/// A key is never both patched and masked: writing clears the mask and
/// deleting drops the patch.
#[derive(Debug, Clone)]
pub struct Overlay<K, V> {
    patch: BTreeMap<K, V>,
    mask: BTreeSet<K>,
}

impl<K, V> Default for Overlay<K, V> {
    fn default() -> Self {
        Self {
            patch: BTreeMap::new(),
            mask: BTreeSet::new(),
        }
    }
}

impl<K: Ord + Clone, V> Overlay<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup<Q>(&self, key: &Q) -> Layer<'_, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if let Some(value) = self.patch.get(key) {
            Layer::Patched(value)
        } else if self.mask.contains(key) {
            Layer::Masked
        } else {
            Layer::Inner
        }
    }

    pub fn put(&mut self, key: K, value: V) {
        self.mask.remove(&key);
        self.patch.insert(key, value);
    }

    pub fn mask(&mut self, key: K) {
        self.patch.remove(&key);
        self.mask.insert(key);
    }

    /// `inner` keys that are not masked, plus the patched ones, in order.
    pub fn merge_keys(&self, inner: impl IntoIterator<Item = K>) -> Vec<K> {
        let mut keys: BTreeSet<K> = inner
            .into_iter()
            .filter(|key| !self.mask.contains(key))
            .collect();
        keys.extend(self.patch.keys().cloned());
        keys.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.patch.is_empty() && self.mask.is_empty()
    }
}
