//! Volatile account storage
//!
//! Keeps typed values in process memory. Useful as the lowest-priority
//! fallback backend, for embedding, and as a stand-in for a real store in
//! tests. Nothing survives a restart; `commit` only clears the pending mark.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use account_storage_plugin::log_sanitizer::value_for_log;
use account_storage_plugin::{
    priority, AccountManager, AccountStorage, Cancellable, CommitTarget, KeyFlags, Notifier,
    SetResult, StorageError, StorageFlags, StorageResult, Value, ValueType,
};

#[derive(Debug, Default, Clone)]
struct MemoryAccount {
    attributes: HashMap<String, Value>,
    parameters: HashMap<String, Value>,
}

/// In-memory [`AccountStorage`] backend
pub struct MemoryStorage {
    name: String,
    description: String,
    provider: String,
    priority: i32,
    accounts: RwLock<BTreeMap<String, MemoryAccount>>,
    /// Accounts with changes not yet committed
    pending: Mutex<BTreeSet<String>>,
    notifier: Mutex<Option<Notifier>>,
}

impl MemoryStorage {
    /// Create an empty store at [`priority::DEFAULT`].
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "Accounts kept in memory".to_string(),
            provider: String::new(),
            priority: priority::DEFAULT,
            accounts: RwLock::new(BTreeMap::new()),
            pending: Mutex::new(BTreeSet::new()),
            notifier: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Seed an attribute before registration. No notification is sent.
    #[must_use]
    pub fn with_attribute(self, account: &str, name: &str, value: impl Into<Value>) -> Self {
        self.write()
            .entry(account.to_string())
            .or_default()
            .attributes
            .insert(name.to_string(), value.into());
        self
    }

    /// Seed a parameter before registration. No notification is sent.
    #[must_use]
    pub fn with_parameter(self, account: &str, name: &str, value: impl Into<Value>) -> Self {
        self.write()
            .entry(account.to_string())
            .or_default()
            .parameters
            .insert(name.to_string(), value.into());
        self
    }

    pub fn has_account(&self, account: &str) -> bool {
        self.read().contains_key(account)
    }

    /// Whether `account` changed since its last commit
    pub fn has_pending_changes(&self, account: &str) -> bool {
        self.pending_set().contains(account)
    }

    /// Stored attribute, bypassing the coordinator
    pub fn stored_attribute(&self, account: &str, name: &str) -> Option<Value> {
        self.read().get(account)?.attributes.get(name).cloned()
    }

    /// Stored parameter, bypassing the coordinator
    pub fn stored_parameter(&self, account: &str, name: &str) -> Option<Value> {
        self.read().get(account)?.parameters.get(name).cloned()
    }

    // ===== Changes made outside the account manager =====
    //
    // Each one updates the store first and notifies second, so listeners
    // reading back see the new state.

    /// Add an account and announce it.
    pub fn insert_account(&self, account: &str, attributes: impl IntoIterator<Item = (String, Value)>) {
        {
            let mut accounts = self.write();
            let entry = accounts.entry(account.to_string()).or_default();
            entry.attributes.extend(attributes);
        }
        self.notify(|n| n.emit_created(account));
    }

    /// Change or remove an attribute and announce it.
    pub fn update_attribute(&self, account: &str, name: &str, value: Option<Value>) {
        if !self.change(account, |a| put(&mut a.attributes, name, value.as_ref())) {
            return;
        }
        self.notify(|n| n.emit_altered_attribute(account, name));
    }

    /// Change or remove a parameter and announce it.
    pub fn update_parameter(&self, account: &str, name: &str, value: Option<Value>) {
        if !self.change(account, |a| put(&mut a.parameters, name, value.as_ref())) {
            return;
        }
        self.notify(|n| n.emit_altered_parameter(account, name));
    }

    /// Enable or disable an account and announce it.
    pub fn set_enabled(&self, account: &str, enabled: bool) {
        let value = Value::Boolean(enabled);
        if !self.change(account, |a| put(&mut a.attributes, "Enabled", Some(&value))) {
            return;
        }
        self.notify(|n| n.emit_toggled(account, enabled));
    }

    /// Remove an account and announce it.
    pub fn remove_account(&self, account: &str) {
        if self.write().remove(account).is_none() {
            return;
        }
        self.pending_set().remove(account);
        self.notify(|n| n.emit_deleted(account));
    }

    /// Ask for the account to reconnect.
    pub fn request_reconnect(&self, account: &str) {
        if self.has_account(account) {
            self.notify(|n| n.emit_reconnect(account));
        }
    }

    /// Apply `f` to an existing account. Returns whether anything changed.
    fn change(&self, account: &str, f: impl FnOnce(&mut MemoryAccount) -> SetResult) -> bool {
        let changed = match self.write().get_mut(account) {
            Some(entry) => f(entry) == SetResult::Changed,
            None => {
                log::debug!("{}: ignoring change to unknown account {account}", self.name);
                false
            }
        };
        if changed {
            self.pending_set().insert(account.to_string());
        }
        changed
    }

    fn notify(&self, emit: impl FnOnce(&Notifier)) {
        let notifier = self
            .notifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match notifier {
            Some(notifier) => emit(&notifier),
            None => log::debug!("{}: not attached, change not announced", self.name),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, MemoryAccount>> {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, MemoryAccount>> {
        self.accounts.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending_set(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_key(
        &self,
        account: &str,
        key: &str,
        value: Option<&Value>,
        flags: KeyFlags,
        select: impl FnOnce(&mut MemoryAccount) -> &mut HashMap<String, Value>,
    ) -> SetResult {
        let result = {
            let mut accounts = self.write();
            if value.is_none() && !accounts.contains_key(account) {
                // nothing to delete from an account this store never held
                SetResult::Unchanged
            } else {
                let entry = accounts.entry(account.to_string()).or_default();
                put(select(entry), key, value)
            }
        };
        if result == SetResult::Changed {
            log::debug!(
                "{}: {account} {key} := {}",
                self.name,
                value_for_log(value, flags)
            );
            self.pending_set().insert(account.to_string());
        }
        result
    }
}

fn put(map: &mut HashMap<String, Value>, key: &str, value: Option<&Value>) -> SetResult {
    match value {
        Some(v) if map.get(key) == Some(v) => SetResult::Unchanged,
        Some(v) => {
            map.insert(key.to_string(), v.clone());
            SetResult::Changed
        }
        None if map.remove(key).is_some() => SetResult::Changed,
        None => SetResult::Unchanged,
    }
}

#[async_trait]
impl AccountStorage for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn attach(&self, notifier: Notifier) {
        *self.notifier.lock().unwrap_or_else(PoisonError::into_inner) = Some(notifier);
    }

    fn flags(&self, _account: &str) -> StorageFlags {
        StorageFlags::STORES_TYPES
    }

    fn list_accounts(&self, _manager: &dyn AccountManager) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    fn get_attribute(&self, account: &str, attribute: &str, _hint: ValueType) -> Option<Value> {
        self.stored_attribute(account, attribute)
    }

    fn get_parameter(
        &self,
        account: &str,
        parameter: &str,
        _hint: Option<ValueType>,
    ) -> Option<Value> {
        self.stored_parameter(account, parameter)
    }

    fn list_typed_parameters(&self, account: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .get(account)
            .map(|a| a.parameters.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    fn set_attribute(
        &self,
        account: &str,
        attribute: &str,
        value: Option<&Value>,
        flags: KeyFlags,
    ) -> SetResult {
        self.set_key(account, attribute, value, flags, |a| &mut a.attributes)
    }

    fn set_parameter(
        &self,
        account: &str,
        parameter: &str,
        value: Option<&Value>,
        flags: KeyFlags,
    ) -> SetResult {
        self.set_key(account, parameter, value, flags, |a| &mut a.parameters)
    }

    fn create(
        &self,
        manager: &dyn AccountManager,
        cm_name: &str,
        protocol: &str,
        identification: &str,
    ) -> StorageResult<String> {
        let account = manager.unique_name(cm_name, protocol, identification);
        self.write().insert(account.clone(), MemoryAccount::default());
        self.pending_set().insert(account.clone());
        Ok(account)
    }

    fn commit(&self, target: &CommitTarget) -> bool {
        let mut pending = self.pending_set();
        match target.as_account() {
            Some(account) => {
                pending.remove(account);
            }
            None => pending.clear(),
        }
        true
    }

    async fn delete(&self, account: &str, cancellable: &Cancellable) -> StorageResult<()> {
        if cancellable.is_cancelled() {
            return Err(StorageError::Cancelled {
                backend: self.name.clone(),
            });
        }
        if self.write().remove(account).is_none() {
            return Err(StorageError::NotFound {
                backend: self.name.clone(),
                what: account.to_string(),
            });
        }
        self.pending_set().remove(account);
        self.notify(|n| n.emit_deleted(account));
        Ok(())
    }
}
