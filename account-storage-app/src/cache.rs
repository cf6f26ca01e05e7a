//! The account manager's view of all accounts.
//!
//! [`AccountCache`] keeps a snapshot of every account's known attributes
//! and typed parameters, routes its own changes through the write
//! coordinator, and follows the notification bus for changes backends make
//! on their own.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;

use account_storage_core::error::{CoreError, CoreResult};
use account_storage_core::services::{
    AccountLifecycleService, ResolutionService, StorageContext, WriteService,
};
use account_storage_core::types::{
    CommitTarget, EventKind, KeyFlags, SetResult, StorageEvent, StorageKey, Value,
};
use account_storage_core::Cancellable;

/// Attribute that `toggled` notifications update
pub const ENABLED_ATTRIBUTE: &str = "Enabled";

/// Cached state of one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAccount {
    pub attributes: BTreeMap<String, Value>,
    pub parameters: BTreeMap<String, Value>,
}

impl CachedAccount {
    pub fn enabled(&self) -> bool {
        self.attributes
            .get(ENABLED_ATTRIBUTE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.attributes.get("DisplayName").and_then(Value::as_str)
    }
}

/// What the cache did with a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// Duplicate, stale, or from a backend that does not own the key
    Ignored,
}

/// Account cache
pub struct AccountCache {
    ctx: Arc<StorageContext>,
    resolution: Arc<ResolutionService>,
    writes: Arc<WriteService>,
    lifecycle: Arc<AccountLifecycleService>,
    accounts: RwLock<BTreeMap<String, CachedAccount>>,
    reconnects: Mutex<Vec<String>>,
}

impl AccountCache {
    #[must_use]
    pub fn new(
        ctx: Arc<StorageContext>,
        resolution: Arc<ResolutionService>,
        writes: Arc<WriteService>,
        lifecycle: Arc<AccountLifecycleService>,
    ) -> Self {
        Self {
            ctx,
            resolution,
            writes,
            lifecycle,
            accounts: RwLock::new(BTreeMap::new()),
            reconnects: Mutex::new(Vec::new()),
        }
    }

    // ===== Queries =====

    pub async fn account_names(&self) -> Vec<String> {
        self.accounts.read().await.keys().cloned().collect()
    }

    pub async fn account(&self, account: &str) -> Option<CachedAccount> {
        self.accounts.read().await.get(account).cloned()
    }

    pub async fn attribute(&self, account: &str, attribute: &str) -> Option<Value> {
        self.accounts
            .read()
            .await
            .get(account)?
            .attributes
            .get(attribute)
            .cloned()
    }

    pub async fn parameter(&self, account: &str, parameter: &str) -> Option<Value> {
        self.accounts
            .read()
            .await
            .get(account)?
            .parameters
            .get(parameter)
            .cloned()
    }

    /// Accounts that asked to reconnect since the last call, oldest first
    pub async fn take_reconnects(&self) -> Vec<String> {
        std::mem::take(&mut *self.reconnects.lock().await)
    }

    /// Rebuild the snapshot from the coordinator. Returns the account count.
    pub async fn reload(&self) -> CoreResult<usize> {
        let fresh = self.snapshot(self.resolution.list_accounts().await).await?;
        let count = fresh.len();
        *self.accounts.write().await = fresh;
        log::debug!("Account cache holds {count} account(s)");
        Ok(count)
    }

    /// Read `accounts`, skipping any the coordinator no longer knows.
    async fn snapshot(&self, accounts: Vec<String>) -> CoreResult<BTreeMap<String, CachedAccount>> {
        let mut fresh = BTreeMap::new();
        for account in accounts {
            match self.fetch(&account).await {
                Ok(cached) => {
                    fresh.insert(account, cached);
                }
                // forgotten between listing and reading
                Err(CoreError::AccountNotFound(_)) => {
                    log::debug!("{account} disappeared during reload, skipped");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(fresh)
    }

    // ===== Changes made by the account manager =====

    /// Create an account and record its manager and protocol.
    pub async fn create_account(
        &self,
        manager: &str,
        protocol: &str,
        identification: &str,
    ) -> CoreResult<String> {
        let (account, backend) = self
            .lifecycle
            .create_account(manager, protocol, identification)
            .await?;

        let mut cached = CachedAccount::default();
        for (name, value) in [("manager", manager), ("protocol", protocol)] {
            let value = Value::from(value);
            self.writes
                .set_attribute(&account, name, Some(&value), KeyFlags::NONE)
                .await?;
            cached.attributes.insert(name.to_string(), value);
        }
        self.accounts.write().await.insert(account.clone(), cached);

        if !self.lifecycle.commit(&CommitTarget::account(&account)).await? {
            log::warn!("No backend started committing new account {account}");
        }
        log::info!("Created {account} in {}", backend.name);
        Ok(account)
    }

    /// Set or delete an attribute.
    pub async fn set_attribute(
        &self,
        account: &str,
        attribute: &str,
        value: Option<Value>,
        flags: KeyFlags,
    ) -> CoreResult<SetResult> {
        let result = self
            .writes
            .set_attribute(account, attribute, value.as_ref(), flags)
            .await?;
        self.store(account, &StorageKey::attribute(attribute), value)
            .await;
        Ok(result)
    }

    /// Set or delete a parameter.
    pub async fn set_parameter(
        &self,
        account: &str,
        parameter: &str,
        value: Option<Value>,
        flags: KeyFlags,
    ) -> CoreResult<SetResult> {
        let result = self
            .writes
            .set_parameter(account, parameter, value.as_ref(), flags)
            .await?;
        self.store(account, &StorageKey::parameter(parameter), value)
            .await;
        Ok(result)
    }

    /// Flush one account's changes.
    pub async fn commit(&self, account: &str) -> CoreResult<bool> {
        self.lifecycle.commit(&CommitTarget::account(account)).await
    }

    /// Delete an account through its home backend.
    pub async fn delete_account(&self, account: &str, cancellable: &Cancellable) -> CoreResult<()> {
        self.lifecycle.delete_account(account, cancellable).await?;
        self.accounts.write().await.remove(account);
        Ok(())
    }

    // ===== Notifications =====

    /// Apply one backend notification.
    pub async fn handle_event(&self, event: &StorageEvent) -> CoreResult<EventOutcome> {
        let account = event.account.as_str();
        let outcome = match &event.kind {
            EventKind::Created => {
                if self.lifecycle.adopt_account(event.backend_id, account).await? {
                    let cached = self.fetch(account).await?;
                    self.accounts.write().await.insert(account.to_string(), cached);
                    EventOutcome::Applied
                } else {
                    EventOutcome::Ignored
                }
            }
            EventKind::AlteredOne { key } => {
                let key = StorageKey::from_event_key(key);
                if self
                    .writes
                    .record_external_change(event.backend_id, account, key.clone())
                    .await
                {
                    self.refresh(account, &key).await?;
                    EventOutcome::Applied
                } else {
                    EventOutcome::Ignored
                }
            }
            EventKind::Deleted => {
                if self.lifecycle.forget_account(event.backend_id, account).await {
                    self.accounts.write().await.remove(account);
                    EventOutcome::Applied
                } else {
                    EventOutcome::Ignored
                }
            }
            EventKind::Toggled { enabled } => {
                let key = StorageKey::attribute(ENABLED_ATTRIBUTE);
                if self
                    .writes
                    .record_external_change(event.backend_id, account, key.clone())
                    .await
                {
                    self.store(account, &key, Some(Value::Boolean(*enabled))).await;
                    EventOutcome::Applied
                } else {
                    EventOutcome::Ignored
                }
            }
            EventKind::ReconnectNeeded => {
                let from_home = self
                    .resolution
                    .home_of(account)
                    .await
                    .is_ok_and(|home| home.id == event.backend_id);
                if from_home {
                    let mut queue = self.reconnects.lock().await;
                    if !queue.iter().any(|a| a == account) {
                        queue.push(account.to_string());
                    }
                    EventOutcome::Applied
                } else {
                    EventOutcome::Ignored
                }
            }
        };

        if outcome == EventOutcome::Ignored {
            log::debug!(
                "{}: ignored {:?} for {account}",
                event.backend,
                event.kind
            );
        }
        Ok(outcome)
    }

    /// Follow `events` on a background task until the bus closes.
    ///
    /// A lagging receiver cannot tell which events it lost, so the snapshot
    /// is rebuilt instead.
    pub fn spawn_listener(
        self: Arc<Self>,
        mut events: broadcast::Receiver<StorageEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => self.dispatch(&event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log::warn!("Account cache missed {missed} notification(s), reloading");
                        if let Err(e) = self.reload().await {
                            log::error!("Failed to reload account cache: {e}");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            log::debug!("Notification bus closed, account cache listener stopped");
        })
    }

    /// Handle an event, logging instead of returning errors.
    pub(crate) async fn dispatch(&self, event: &StorageEvent) {
        if let Err(e) = self.handle_event(event).await {
            log_error(&e, &event.account);
        }
    }

    /// Read every known attribute and typed parameter of `account`.
    async fn fetch(&self, account: &str) -> CoreResult<CachedAccount> {
        let mut cached = CachedAccount::default();
        for attr in &self.ctx.config().known_attributes {
            if let Some(value) = self
                .resolution
                .get_attribute(account, &attr.name, attr.value_type)
                .await?
            {
                cached.attributes.insert(attr.name.clone(), value);
            }
        }
        for name in self.resolution.list_parameters(account).await?.typed {
            if let Some(value) = self.resolution.get_parameter(account, &name, None).await? {
                cached.parameters.insert(name, value);
            }
        }
        Ok(cached)
    }

    /// Re-read one key after a backend announced a change to it.
    async fn refresh(&self, account: &str, key: &StorageKey) -> CoreResult<()> {
        let value = match key {
            StorageKey::Attribute(name) => match self.ctx.config().attribute_type(name) {
                Some(hint) => self.resolution.get_attribute(account, name, hint).await?,
                None => {
                    log::debug!("{account}: attribute {name} has no configured type, not cached");
                    return Ok(());
                }
            },
            StorageKey::Parameter(name) => {
                self.resolution.get_parameter(account, name, None).await?
            }
        };
        self.store(account, key, value).await;
        Ok(())
    }

    async fn store(&self, account: &str, key: &StorageKey, value: Option<Value>) {
        let mut accounts = self.accounts.write().await;
        let Some(cached) = accounts.get_mut(account) else {
            return;
        };
        let map = match key {
            StorageKey::Attribute(_) => &mut cached.attributes,
            StorageKey::Parameter(_) => &mut cached.parameters,
        };
        match value {
            Some(value) => {
                map.insert(key.name().to_string(), value);
            }
            None => {
                map.remove(key.name());
            }
        }
    }
}

fn log_error(error: &CoreError, account: &str) {
    if error.is_expected() {
        log::warn!("Notification for {account} not applied: {error}");
    } else {
        log::error!("Notification for {account} not applied: {error}");
    }
}
