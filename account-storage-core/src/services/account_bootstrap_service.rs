//! 账户启动加载服务
//!
//! Runs the startup pass: every backend lists its accounts, lowest priority
//! first, and each backend claims the keys it actually supplies. Keys a
//! higher-priority backend does not supply stay with the lower one.

use std::sync::Arc;

use crate::error::CoreResult;
use crate::types::LoadResult;

use super::{supplied_keys, StorageContext};

/// 账户启动加载服务
pub struct AccountBootstrapService {
    ctx: Arc<StorageContext>,
}

impl AccountBootstrapService {
    #[must_use]
    pub fn new(ctx: Arc<StorageContext>) -> Self {
        Self { ctx }
    }

    /// Merge every backend's accounts into the ownership map.
    ///
    /// Backends may block here; this is the only call where that is allowed.
    /// Calling it again re-merges on top of the current state.
    pub async fn load_accounts(&self) -> CoreResult<LoadResult> {
        let config = self.ctx.config();
        let mut ownership = self.ctx.ownership().write().await;
        let mut claimed_keys = 0;

        for backend in self.ctx.registry().ascending() {
            let storage = backend.storage();
            let accounts = storage.list_accounts(self.ctx.names());
            log::info!(
                "{}: listed {} account(s) (priority {})",
                backend.name(),
                accounts.len(),
                backend.priority()
            );

            for account in accounts {
                self.ctx.names().reserve(&account);
                if !ownership.adopt(&account, backend.id()) {
                    log::debug!("{}: takes over {account}", backend.name());
                }

                for key in supplied_keys(&**storage, config, &account) {
                    if let Some(previous) = ownership.claim(&account, key.clone(), backend.id()) {
                        if previous != backend.id() {
                            log::debug!(
                                "{}: overrides {key} of {account}",
                                backend.name()
                            );
                        }
                    }
                    claimed_keys += 1;
                }
            }
        }

        let result = LoadResult {
            account_count: ownership.len(),
            claimed_keys,
        };
        log::info!(
            "Loaded {} account(s), {} key claim(s)",
            result.account_count,
            result.claimed_keys
        );
        Ok(result)
    }
}
