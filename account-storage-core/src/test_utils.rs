//! 测试工具模块
//!
//! An in-memory backend with switchable capabilities, plus factory functions
//! for a ready-made [`StorageContext`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;

use account_storage_plugin::{
    AccountManager, AccountStorage, Cancellable, CommitTarget, KeyFlags, Notifier,
    RestrictionFlags, SetResult, StorageError, StorageFlags, StorageResult, Value, ValueType,
};

use crate::notification::NotificationBus;
use crate::registry::BackendRegistryBuilder;
use crate::services::StorageContext;
use crate::types::StorageConfig;

#[derive(Debug, Default, Clone)]
struct MockAccount {
    attributes: HashMap<String, Value>,
    parameters: HashMap<String, Value>,
    untyped: HashMap<String, String>,
}

/// In-memory backend
pub struct MockBackend {
    name: String,
    priority: i32,
    writable: bool,
    deletable: bool,
    creatable: bool,
    honours_cancel: bool,
    restrictions: RestrictionFlags,
    accounts: RwLock<BTreeMap<String, MockAccount>>,
    commits: Mutex<Vec<CommitTarget>>,
    notifier: Mutex<Option<Notifier>>,
}

impl MockBackend {
    pub fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            writable: true,
            deletable: true,
            creatable: true,
            honours_cancel: true,
            restrictions: RestrictionFlags::NONE,
            accounts: RwLock::new(BTreeMap::new()),
            commits: Mutex::new(Vec::new()),
            notifier: Mutex::new(None),
        }
    }

    /// Reject writes, creation and deletion
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self.deletable = false;
        self.creatable = false;
        self
    }

    /// Finish deletions even when cancelled
    pub fn ignoring_cancellation(mut self) -> Self {
        self.honours_cancel = false;
        self
    }

    pub fn with_restrictions(mut self, restrictions: RestrictionFlags) -> Self {
        self.restrictions = restrictions;
        self
    }

    pub fn with_account(self, account: &str) -> Self {
        self.account_mut(account, |_| ());
        self
    }

    pub fn with_attribute(self, account: &str, name: &str, value: Value) -> Self {
        self.insert_attribute(account, name, value);
        self
    }

    pub fn with_parameter(self, account: &str, name: &str, value: Value) -> Self {
        self.account_mut(account, |a| {
            a.parameters.insert(name.to_string(), value);
        });
        self
    }

    pub fn with_untyped_parameter(self, account: &str, name: &str, text: &str) -> Self {
        self.account_mut(account, |a| {
            a.untyped.insert(name.to_string(), text.to_string());
        });
        self
    }

    /// Change the cache directly, without notifying
    pub fn insert_attribute(&self, account: &str, name: &str, value: Value) {
        self.account_mut(account, |a| {
            a.attributes.insert(name.to_string(), value);
        });
    }

    pub fn has_account(&self, account: &str) -> bool {
        self.read().contains_key(account)
    }

    pub fn attribute(&self, account: &str, name: &str) -> Option<Value> {
        self.read().get(account)?.attributes.get(name).cloned()
    }

    pub fn parameter(&self, account: &str, name: &str) -> Option<Value> {
        self.read().get(account)?.parameters.get(name).cloned()
    }

    pub fn commits(&self) -> Vec<CommitTarget> {
        self.commits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Simulate another process adding an account
    pub fn external_create(&self, account: &str) {
        self.account_mut(account, |_| ());
        self.notify(|n| n.emit_created(account));
    }

    fn notify(&self, emit: impl FnOnce(&Notifier)) {
        if let Some(notifier) = self
            .notifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            emit(notifier);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, MockAccount>> {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn account_mut<R>(&self, account: &str, f: impl FnOnce(&mut MockAccount) -> R) -> R {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        f(accounts.entry(account.to_string()).or_default())
    }

    fn store(map: &mut HashMap<String, Value>, key: &str, value: Option<&Value>) -> SetResult {
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
}

#[async_trait]
impl AccountStorage for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "In-memory test backend"
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
        self.attribute(account, attribute)
    }

    fn get_parameter(
        &self,
        account: &str,
        parameter: &str,
        hint: Option<ValueType>,
    ) -> Option<Value> {
        let accounts = self.read();
        let entry = accounts.get(account)?;
        if let Some(value) = entry.parameters.get(parameter) {
            return Some(value.clone());
        }
        hint?;
        entry
            .untyped
            .get(parameter)
            .map(|text| Value::Untyped(text.clone()))
    }

    fn list_typed_parameters(&self, account: &str) -> Vec<String> {
        self.read()
            .get(account)
            .map(|a| a.parameters.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn list_untyped_parameters(&self, account: &str) -> Vec<String> {
        self.read()
            .get(account)
            .map(|a| a.untyped.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn set_attribute(
        &self,
        account: &str,
        attribute: &str,
        value: Option<&Value>,
        _flags: KeyFlags,
    ) -> SetResult {
        if !self.writable {
            return SetResult::Rejected;
        }
        if value.is_none() && !self.has_account(account) {
            return SetResult::Unchanged;
        }
        self.account_mut(account, |a| Self::store(&mut a.attributes, attribute, value))
    }

    fn set_parameter(
        &self,
        account: &str,
        parameter: &str,
        value: Option<&Value>,
        _flags: KeyFlags,
    ) -> SetResult {
        if !self.writable {
            return SetResult::Rejected;
        }
        if value.is_none() && !self.has_account(account) {
            return SetResult::Unchanged;
        }
        self.account_mut(account, |a| {
            let dropped_untyped = a.untyped.remove(parameter).is_some();
            match Self::store(&mut a.parameters, parameter, value) {
                SetResult::Unchanged if dropped_untyped => SetResult::Changed,
                other => other,
            }
        })
    }

    fn create(
        &self,
        manager: &dyn AccountManager,
        cm_name: &str,
        protocol: &str,
        identification: &str,
    ) -> StorageResult<String> {
        if !self.creatable {
            return Err(StorageError::not_implemented(&self.name, "create"));
        }
        let account = manager.unique_name(cm_name, protocol, identification);
        self.account_mut(&account, |_| ());
        Ok(account)
    }

    fn commit(&self, target: &CommitTarget) -> bool {
        self.commits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.clone());
        self.writable
    }

    async fn delete(&self, account: &str, cancellable: &Cancellable) -> StorageResult<()> {
        if !self.deletable {
            return Err(StorageError::not_implemented(&self.name, "delete"));
        }
        if self.honours_cancel && cancellable.is_cancelled() {
            return Err(StorageError::Cancelled {
                backend: self.name.clone(),
            });
        }
        let removed = self
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(account);
        if removed.is_none() {
            return Err(StorageError::NotFound {
                backend: self.name.clone(),
                what: account.to_string(),
            });
        }
        self.notify(|n| n.emit_deleted(account));
        Ok(())
    }

    fn restrictions(&self, _account: &str) -> RestrictionFlags {
        self.restrictions
    }
}

/// Context over `backends` (registered in the given order) with default config
pub fn context(backends: Vec<Arc<MockBackend>>) -> Arc<StorageContext> {
    context_with_config(backends, StorageConfig::default())
}

pub fn context_with_config(
    backends: Vec<Arc<MockBackend>>,
    config: StorageConfig,
) -> Arc<StorageContext> {
    let bus = NotificationBus::new(config.event_capacity);
    let registry = backends
        .into_iter()
        .fold(BackendRegistryBuilder::new(), |builder, backend| {
            builder.register(backend)
        })
        .build(&bus)
        .unwrap();
    Arc::new(StorageContext::new(registry, bus, config))
}
