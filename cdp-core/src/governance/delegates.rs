//! Per-owner delegate whitelist.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::domain::AccountId;

/// (owner, delegate) -> enabled, default false.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegateRegistry {
    approvals: HashMap<AccountId, HashSet<AccountId>>,
}

/// One whitelist entry, for snapshots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DelegateEntry {
    pub owner: AccountId,
    pub delegate: AccountId,
}

impl DelegateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag for `(owner, delegate)`. Returns whether it changed.
    pub fn set(&mut self, owner: &AccountId, delegate: &AccountId, enabled: bool) -> bool {
        if enabled {
            return self
                .approvals
                .entry(owner.clone())
                .or_default()
                .insert(delegate.clone());
        }
        let Some(delegates) = self.approvals.get_mut(owner) else {
            return false;
        };
        let changed = delegates.remove(delegate);
        if delegates.is_empty() {
            self.approvals.remove(owner);
        }
        changed
    }

    pub fn is_whitelisted(&self, owner: &AccountId, delegate: &AccountId) -> bool {
        self.approvals
            .get(owner)
            .is_some_and(|delegates| delegates.contains(delegate))
    }

    /// Every enabled pair, sorted.
    pub fn entries(&self) -> Vec<DelegateEntry> {
        let mut entries: Vec<_> = self
            .approvals
            .iter()
            .flat_map(|(owner, delegates)| {
                delegates.iter().map(move |delegate| DelegateEntry {
                    owner: owner.clone(),
                    delegate: delegate.clone(),
                })
            })
            .collect();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_whitelisted() {
        let registry = DelegateRegistry::new();
        assert!(!registry.is_whitelisted(&"alice".into(), &"bob".into()));
    }

    #[test]
    fn set_is_idempotent_and_reports_changes() {
        let mut registry = DelegateRegistry::new();
        let (alice, bob) = (AccountId::from("alice"), AccountId::from("bob"));
        assert!(registry.set(&alice, &bob, true));
        assert!(!registry.set(&alice, &bob, true));
        assert!(registry.is_whitelisted(&alice, &bob));
        assert!(registry.set(&alice, &bob, false));
        assert!(!registry.set(&alice, &bob, false));
        assert!(!registry.is_whitelisted(&alice, &bob));
        assert!(registry.entries().is_empty());
    }

    #[test]
    fn approvals_are_directional() {
        let mut registry = DelegateRegistry::new();
        let (alice, bob) = (AccountId::from("alice"), AccountId::from("bob"));
        registry.set(&alice, &bob, true);
        assert!(!registry.is_whitelisted(&bob, &alice));
        assert_eq!(
            registry.entries(),
            vec![DelegateEntry {
                owner: alice,
                delegate: bob
            }]
        );
    }
}
