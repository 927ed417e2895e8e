use std::collections::BTreeMap;

/// Write overlay over a projection's committed entries.
///
/// Reads see staged writes first and fall through to the committed map.
/// Only the entries the handler writes are copied; the overlay is merged
/// into the live state when the event commits and dropped otherwise.
#[derive(Debug)]
pub struct Transaction<'a, K, V> {
    committed: &'a BTreeMap<K, V>,
    staged: BTreeMap<K, Option<V>>,
}

impl<'a, K, V> Transaction<'a, K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    pub(crate) fn new(committed: &'a BTreeMap<K, V>) -> Self {
        Self {
            committed,
            staged: BTreeMap::new(),
        }
    }

    /// The value of `key` as this transaction sees it.
    pub fn get(&self, key: &K) -> Option<&V> {
        match self.staged.get(key) {
            Some(staged) => staged.as_ref(),
            None => self.committed.get(key),
        }
    }

    /// Whether `key` has a value in this transaction.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Set `key` to `value`, returning the value it replaces.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.get(&key).cloned();
        let _ = self.staged.insert(key, Some(value));
        previous
    }

    /// Remove `key`, returning the value it had.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let previous = self.get(key).cloned();
        if previous.is_some() {
            let _ = self.staged.insert(key.clone(), None);
        }
        previous
    }

    /// Remove every entry for which `keep` returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) {
        let mut dropped = Vec::new();
        for (key, value) in self.committed {
            if !self.staged.contains_key(key) && !keep(key, value) {
                dropped.push(key.clone());
            }
        }
        for (key, value) in &self.staged {
            if let Some(value) = value {
                if !keep(key, value) {
                    dropped.push(key.clone());
                }
            }
        }
        for key in dropped {
            let _ = self.staged.insert(key, None);
        }
    }

    /// Number of staged writes, removals included.
    pub fn pending_writes(&self) -> usize {
        self.staged.len()
    }

    pub(crate) fn into_writes(self) -> BTreeMap<K, Option<V>> {
        self.staged
    }
}

pub(crate) fn apply<K: Ord, V>(state: &mut BTreeMap<K, V>, writes: BTreeMap<K, Option<V>>) {
    for (key, value) in writes {
        match value {
            Some(value) => {
                let _ = state.insert(key, value);
            }
            None => {
                let _ = state.remove(&key);
            }
        }
    }
}
