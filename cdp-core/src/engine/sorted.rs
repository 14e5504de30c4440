//! ICR-ordered index of the open positions of one asset.
//!
//! Ordered by [`SortKey`]: the price-independent share ratio, then creation
//! sequence. Every mutation of a position removes its old key and inserts the
//! new one, so traversal is always ascending without a rebuild.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{AccountId, SortKey};

#[derive(Debug, Clone, Default)]
pub struct SortedPositions {
    order: BTreeMap<SortKey, AccountId>,
    keys: HashMap<AccountId, SortKey>,
}

impl SortedPositions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `owner` under `key`, replacing any previous key.
    pub fn insert(&mut self, owner: AccountId, key: SortKey) {
        if let Some(previous) = self.keys.insert(owner.clone(), key) {
            self.order.remove(&previous);
        }
        self.order.insert(key, owner);
    }

    pub fn remove(&mut self, owner: &AccountId) -> Option<SortKey> {
        let key = self.keys.remove(owner)?;
        self.order.remove(&key);
        Some(key)
    }

    pub fn key_of(&self, owner: &AccountId) -> Option<SortKey> {
        self.keys.get(owner).copied()
    }

    pub fn contains(&self, owner: &AccountId) -> bool {
        self.keys.contains_key(owner)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Owners from lowest to highest ICR.
    pub fn iter(&self) -> impl Iterator<Item = (&SortKey, &AccountId)> {
        self.order.iter()
    }

    /// Lowest-ICR owner.
    pub fn first(&self) -> Option<&AccountId> {
        self.order.values().next()
    }

    /// Owners from lowest to highest ICR, cloned.
    pub fn owners(&self) -> Vec<AccountId> {
        self.order.values().cloned().collect()
    }

    /// Both maps describe the same set.
    pub fn is_consistent(&self) -> bool {
        self.order.len() == self.keys.len()
            && self
                .order
                .iter()
                .all(|(key, owner)| self.keys.get(owner) == Some(key))
    }
}
