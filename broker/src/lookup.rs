use std::{collections::HashMap, hash::Hash};

/// A multimap from a key to an ordered list of values.
///
/// Slots are created on first insert and kept (empty) after their last value
/// is removed. Values are matched by `PartialEq`, which for handler handles
/// means identity.
pub(crate) struct Lookup<K, V> {
    slots: HashMap<K, Vec<V>>,
}

impl<K: Hash + Eq, V: PartialEq> Lookup<K, V> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Appends `value` to the slot for `key`.
    pub fn add(&mut self, key: K, value: V) {
        self.slots.entry(key).or_default().push(value);
    }

    /// Removes the first value equal to `value` from the slot for `key`.
    ///
    /// Returns `true` if a value was removed.
    pub fn remove(&mut self, key: &K, value: &V) -> bool {
        let Some(slot) = self.slots.get_mut(key) else {
            return false;
        };
        match slot.iter().position(|v| v == value) {
            Some(index) => {
                slot.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns the values for `key` in insertion order, or an empty slice.
    pub fn get(&self, key: &K) -> &[V] {
        self.slots.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns `true` if `value` is in the slot for `key`.
    pub fn contains(&self, key: &K, value: &V) -> bool {
        self.get(key).contains(value)
    }

    /// Number of values stored for `key`.
    pub fn len(&self, key: &K) -> usize {
        self.get(key).len()
    }

    /// Empties the slot for `key`, returning what it held.
    pub fn clear_key(&mut self, key: &K) -> Vec<V> {
        self.slots
            .get_mut(key)
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

impl<K: Hash + Eq, V: PartialEq> Default for Lookup<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
