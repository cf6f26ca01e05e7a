//! Write coordinator
//!
//! A write walks the backends from highest to lowest priority until one
//! claims it. That backend becomes the owner of the key and every backend
//! below it is asked to drop its copy.

use std::sync::Arc;

use account_storage_plugin::log_sanitizer::value_for_log;

use crate::error::{CoreError, CoreResult};
use crate::registry::RegisteredBackend;
use crate::types::{KeyFlags, SetResult, StorageKey, Value};

use super::StorageContext;

/// Write-side service
pub struct WriteService {
    ctx: Arc<StorageContext>,
}

impl WriteService {
    #[must_use]
    pub fn new(ctx: Arc<StorageContext>) -> Self {
        Self { ctx }
    }

    /// Set (or with `None`, delete) an attribute.
    pub async fn set_attribute(
        &self,
        account: &str,
        attribute: &str,
        value: Option<&Value>,
        flags: KeyFlags,
    ) -> CoreResult<SetResult> {
        self.set_key(account, StorageKey::attribute(attribute), value, flags)
            .await
    }

    /// Set (or with `None`, delete) a parameter.
    pub async fn set_parameter(
        &self,
        account: &str,
        parameter: &str,
        value: Option<&Value>,
        flags: KeyFlags,
    ) -> CoreResult<SetResult> {
        self.set_key(account, StorageKey::parameter(parameter), value, flags)
            .await
    }

    /// Claim-then-purge for one key.
    ///
    /// The ownership lock is held throughout, so concurrent writes to the
    /// same key cannot interleave their purges.
    pub async fn set_key(
        &self,
        account: &str,
        key: StorageKey,
        value: Option<&Value>,
        flags: KeyFlags,
    ) -> CoreResult<SetResult> {
        let mut ownership = self.ctx.ownership().write().await;
        if !ownership.contains(account) {
            return Err(CoreError::AccountNotFound(account.to_string()));
        }

        // 1. 找到第一个接受写入的后端
        let claimed = self.ctx.registry().descending().find_map(|backend| {
            let result = write_one(backend, account, &key, value, flags);
            if result.is_claimed() {
                Some((backend, result))
            } else {
                log::debug!("{}: declined {key} of {account}", backend.name());
                None
            }
        });

        let Some((owner, result)) = claimed else {
            log::warn!("No backend claimed {key} of {account}");
            return Err(CoreError::WriteFailed {
                account: account.to_string(),
                key: key.to_string(),
            });
        };

        log::debug!(
            "{}: {key} of {account} := {} ({result:?})",
            owner.name(),
            value_for_log(value, flags)
        );

        // 2. 更新归属
        match value {
            Some(_) => {
                ownership.claim(account, key.clone(), owner.id());
            }
            None => {
                ownership.release(account, &key);
            }
        }

        // 3. 清理低优先级后端中的旧副本（失败不致命）
        for lower in self.ctx.registry().below(owner.id()) {
            if write_one(lower, account, &key, None, flags) == SetResult::Changed {
                log::info!(
                    "{}: purged stale {key} of {account} superseded by {}",
                    lower.name(),
                    owner.name()
                );
            }
        }

        Ok(result)
    }

    /// Accept a change a backend made on its own, if it speaks for the key.
    ///
    /// The emitter must be the key's recorded owner or, for an unclaimed key,
    /// the account's home backend. Returns `false` for changes that are
    /// ignored.
    pub async fn record_external_change(
        &self,
        backend_id: usize,
        account: &str,
        key: StorageKey,
    ) -> bool {
        let mut ownership = self.ctx.ownership().write().await;
        let Some(home) = ownership.home(account) else {
            return false;
        };

        match ownership.owner(account, &key) {
            Some(owner) if owner == backend_id => true,
            Some(owner) if self.ctx.registry().outranks(backend_id, owner) => {
                // a higher priority backend overrode the key behind our back
                ownership.claim(account, key, backend_id);
                true
            }
            Some(_) => false,
            None if home == backend_id => {
                ownership.claim(account, key, backend_id);
                true
            }
            None => false,
        }
    }
}

fn write_one(
    backend: &RegisteredBackend,
    account: &str,
    key: &StorageKey,
    value: Option<&Value>,
    flags: KeyFlags,
) -> SetResult {
    let storage = backend.storage();
    match key {
        StorageKey::Attribute(name) => storage.set_attribute(account, name, value, flags),
        StorageKey::Parameter(name) => storage.set_parameter(account, name, value, flags),
    }
}
