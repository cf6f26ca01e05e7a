//! Account → key → owning backend map
//!
//! Every account has a *home* backend (the one that supplied or created it,
//! and the one asked to delete it) plus per-key owners recorded by the
//! startup merge and by successful writes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::StorageKey;

#[derive(Debug, Clone)]
struct AccountOwnership {
    home: usize,
    keys: HashMap<StorageKey, usize>,
}

/// Ownership records for all known accounts, by backend id
#[derive(Debug, Default, Clone)]
pub struct OwnershipMap {
    accounts: BTreeMap<String, AccountOwnership>,
}

impl OwnershipMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `backend` the home of `account`. Returns `true` if the account
    /// was not known before.
    pub fn adopt(&mut self, account: &str, backend: usize) -> bool {
        match self.accounts.get_mut(account) {
            Some(entry) => {
                entry.home = backend;
                false
            }
            None => {
                self.accounts.insert(
                    account.to_string(),
                    AccountOwnership {
                        home: backend,
                        keys: HashMap::new(),
                    },
                );
                true
            }
        }
    }

    /// Record `backend` as owner of `key`, replacing any previous owner.
    /// An unknown account is adopted by `backend`.
    pub fn claim(&mut self, account: &str, key: StorageKey, backend: usize) -> Option<usize> {
        self.accounts
            .entry(account.to_string())
            .or_insert_with(|| AccountOwnership {
                home: backend,
                keys: HashMap::new(),
            })
            .keys
            .insert(key, backend)
    }

    /// Drop the owner record for `key`, leaving the account and other keys alone.
    pub fn release(&mut self, account: &str, key: &StorageKey) -> Option<usize> {
        self.accounts.get_mut(account)?.keys.remove(key)
    }

    /// Remove the account and every key record. Returns `false` if it was unknown.
    pub fn forget(&mut self, account: &str) -> bool {
        self.accounts.remove(account).is_some()
    }

    pub fn contains(&self, account: &str) -> bool {
        self.accounts.contains_key(account)
    }

    pub fn home(&self, account: &str) -> Option<usize> {
        self.accounts.get(account).map(|entry| entry.home)
    }

    pub fn owner(&self, account: &str, key: &StorageKey) -> Option<usize> {
        self.accounts.get(account)?.keys.get(key).copied()
    }

    /// Home backend plus every backend owning at least one key, ascending by id
    pub fn backends_for(&self, account: &str) -> BTreeSet<usize> {
        self.accounts
            .get(account)
            .map(|entry| {
                std::iter::once(entry.home)
                    .chain(entry.keys.values().copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Keys of `account` owned by `backend`
    pub fn keys_owned_by(&self, account: &str, backend: usize) -> Vec<StorageKey> {
        let mut keys: Vec<StorageKey> = self
            .accounts
            .get(account)
            .map(|entry| {
                entry
                    .keys
                    .iter()
                    .filter(|&(_, &owner)| owner == backend)
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Account names in sorted order
    pub fn account_names(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
