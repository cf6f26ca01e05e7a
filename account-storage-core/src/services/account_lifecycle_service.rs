//! 账户生命周期服务
//!
//! Account creation, commit, deletion, and adoption of accounts that
//! backends announce on their own.

use std::sync::Arc;

use account_storage_plugin::{Cancellable, StorageError};

use crate::error::{CoreError, CoreResult};
use crate::types::{BackendInfo, CommitTarget};

use super::{supplied_keys, StorageContext};

/// 账户生命周期服务
pub struct AccountLifecycleService {
    ctx: Arc<StorageContext>,
}

impl AccountLifecycleService {
    #[must_use]
    pub fn new(ctx: Arc<StorageContext>) -> Self {
        Self { ctx }
    }

    /// Create an account in the highest-priority backend that accepts it.
    ///
    /// Only the name is allocated; attributes and parameters follow through
    /// the write service, then [`commit`](Self::commit).
    pub async fn create_account(
        &self,
        manager: &str,
        protocol: &str,
        identification: &str,
    ) -> CoreResult<(String, BackendInfo)> {
        let mut ownership = self.ctx.ownership().write().await;
        let mut last_error: Option<StorageError> = None;

        for backend in self.ctx.registry().descending() {
            match backend
                .storage()
                .create(self.ctx.names(), manager, protocol, identification)
            {
                Ok(account) => {
                    self.ctx.names().reserve(&account);
                    ownership.adopt(&account, backend.id());
                    log::info!("{}: created account {account}", backend.name());
                    return Ok((account, backend.info()));
                }
                Err(e) => {
                    if e.is_expected() {
                        log::debug!("{e}");
                    } else {
                        log::warn!("{e}");
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(CoreError::CreateFailed {
            manager: manager.to_string(),
            protocol: protocol.to_string(),
            reason: last_error.map_or_else(|| "no backend accepted".to_string(), |e| e.to_string()),
        })
    }

    /// Ask backends to start flushing to long-term storage.
    ///
    /// For one account, every backend that is its home or owns one of its
    /// keys is asked. Returns whether at least one backend started a flush;
    /// that does not mean the data is on disk yet.
    pub async fn commit(&self, target: &CommitTarget) -> CoreResult<bool> {
        let candidates = match target.as_account() {
            Some(account) => {
                let ids = self.ctx.ownership().read().await.backends_for(account);
                if ids.is_empty() {
                    return Err(CoreError::AccountNotFound(account.to_string()));
                }
                ids
            }
            None => self.ctx.registry().descending().map(|b| b.id()).collect(),
        };

        let mut accepted = false;
        for backend in self
            .ctx
            .registry()
            .descending()
            .filter(|b| candidates.contains(&b.id()))
        {
            if backend.storage().commit(target) {
                log::debug!("{}: committing {target}", backend.name());
                accepted = true;
            } else {
                log::debug!("{}: did not commit {target}", backend.name());
            }
        }
        Ok(accepted)
    }

    /// Delete an account through its home backend.
    ///
    /// Only the home backend is asked; it emits the `deleted` notification
    /// itself. On failure the account stays. A deletion that completes after
    /// `cancellable` fired is still honoured.
    pub async fn delete_account(&self, account: &str, cancellable: &Cancellable) -> CoreResult<()> {
        let backend = self.ctx.home_backend(account).await?;

        // 不持锁等待后端完成
        if let Err(e) = backend.storage().delete(account, cancellable).await {
            if e.is_expected() {
                log::warn!("{}: cannot delete {account}: {e}", backend.name());
            } else {
                log::error!("{}: failed to delete {account}: {e}", backend.name());
            }
            return Err(e.into());
        }

        if cancellable.is_cancelled() {
            log::info!("{}: deleted {account} despite cancellation", backend.name());
        }
        if self.ctx.ownership().write().await.forget(account) {
            self.ctx.names().release(account);
        }
        log::info!("{}: deleted account {account}", backend.name());
        Ok(())
    }

    /// Take in an account a backend created outside the account manager.
    ///
    /// Returns `false` if the account is already known; the announcement is
    /// then ignored so no duplicate appears.
    pub async fn adopt_account(&self, backend_id: usize, account: &str) -> CoreResult<bool> {
        let backend = self.ctx.backend(backend_id)?;
        let mut ownership = self.ctx.ownership().write().await;
        if ownership.contains(account) {
            log::debug!("{}: ignoring known account {account}", backend.name());
            return Ok(false);
        }

        ownership.adopt(account, backend_id);
        for key in supplied_keys(&**backend.storage(), self.ctx.config(), account) {
            ownership.claim(account, key, backend_id);
        }
        self.ctx.names().reserve(account);
        log::info!("{}: adopted account {account}", backend.name());
        Ok(true)
    }

    /// Drop an account its home backend reports as deleted.
    ///
    /// Returns `false` if the account is unknown or `backend_id` is not its
    /// home.
    pub async fn forget_account(&self, backend_id: usize, account: &str) -> bool {
        let mut ownership = self.ctx.ownership().write().await;
        if ownership.home(account) != Some(backend_id) {
            return false;
        }
        ownership.forget(account);
        self.ctx.names().release(account);
        log::info!("Forgot account {account}");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{AccountBootstrapService, ResolutionService, WriteService};
    use crate::test_utils::{context, MockBackend};
    use crate::types::{KeyFlags, Value};

    async fn setup(backends: Vec<Arc<MockBackend>>) -> (AccountLifecycleService, Arc<StorageContext>) {
        let ctx = context(backends);
        AccountBootstrapService::new(ctx.clone())
            .load_accounts()
            .await
            .unwrap();
        (AccountLifecycleService::new(ctx.clone()), ctx)
    }

    #[tokio::test]
    async fn create_stops_at_first_accepting_backend() {
        let top = Arc::new(MockBackend::new("top", 100).read_only());
        let mid = Arc::new(MockBackend::new("mid", 50));
        let low = Arc::new(MockBackend::new("low", 0));
        let (lifecycle, ctx) = setup(vec![top, mid.clone(), low.clone()]).await;

        let (account, backend) = lifecycle
            .create_account("gabble", "jabber", "me@example.com")
            .await
            .unwrap();
        assert_eq!(account, "gabble/jabber/me_40example_2ecom0");
        assert_eq!(backend.name, "mid");
        assert!(mid.has_account(&account));
        assert!(!low.has_account(&account));
        assert!(ResolutionService::new(ctx).contains(&account).await);
    }

    #[tokio::test]
    async fn create_fails_when_nobody_accepts() {
        let (lifecycle, _) = setup(vec![Arc::new(MockBackend::new("ro", 0).read_only())]).await;
        let err = lifecycle.create_account("a", "b", "c").await.unwrap_err();
        match err {
            CoreError::CreateFailed { reason, .. } => {
                assert_eq!(reason, "[ro] Operation not implemented: create");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn commit_reaches_every_backend_holding_the_account() {
        let b1 = Arc::new(MockBackend::new("b1", 10).with_attribute("A", "DisplayName", Value::from("x")));
        let b2 = Arc::new(MockBackend::new("b2", 5).with_attribute("A", "Nickname", Value::from("y")));
        let b3 = Arc::new(MockBackend::new("b3", 0));
        let (lifecycle, _) = setup(vec![b1.clone(), b2.clone(), b3.clone()]).await;

        assert!(lifecycle.commit(&CommitTarget::account("A")).await.unwrap());
        assert_eq!(b1.commits(), [CommitTarget::account("A")]);
        assert_eq!(b2.commits(), [CommitTarget::account("A")]);
        assert!(b3.commits().is_empty());

        assert!(lifecycle.commit(&CommitTarget::All).await.unwrap());
        assert_eq!(b3.commits(), [CommitTarget::All]);
    }

    #[tokio::test]
    async fn commit_of_unknown_account_fails() {
        let (lifecycle, _) = setup(vec![Arc::new(MockBackend::new("b", 0))]).await;
        assert!(matches!(
            lifecycle.commit(&CommitTarget::account("ghost")).await,
            Err(CoreError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_on_read_only_backend_is_not_implemented() {
        let ro = Arc::new(MockBackend::new("ro", 0).read_only().with_account("A"));
        let (lifecycle, ctx) = setup(vec![ro.clone()]).await;
        let mut rx = ctx.bus().subscribe();

        let err = lifecycle
            .delete_account("A", &Cancellable::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Storage(StorageError::NotImplemented { .. })
        ));
        assert!(err.is_expected());
        assert!(ro.has_account("A"));
        assert!(ResolutionService::new(ctx).contains("A").await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn delete_goes_to_home_only() {
        let b1 = Arc::new(MockBackend::new("b1", 10).with_account("A"));
        let b2 = Arc::new(MockBackend::new("b2", 5).with_account("A"));
        let (lifecycle, ctx) = setup(vec![b1.clone(), b2.clone()]).await;

        lifecycle.delete_account("A", &Cancellable::new()).await.unwrap();
        assert!(!b1.has_account("A"));
        assert!(b2.has_account("A"));
        assert!(!ResolutionService::new(ctx).contains("A").await);
    }

    #[tokio::test]
    async fn late_completion_after_cancel_is_tolerated() {
        let b = Arc::new(MockBackend::new("b", 0).with_account("A").ignoring_cancellation());
        let (lifecycle, ctx) = setup(vec![b.clone()]).await;

        let cancellable = Cancellable::new();
        cancellable.cancel();
        lifecycle.delete_account("A", &cancellable).await.unwrap();
        assert!(!ResolutionService::new(ctx).contains("A").await);
    }

    #[tokio::test]
    async fn cancelled_delete_keeps_the_account() {
        let b = Arc::new(MockBackend::new("b", 0).with_account("A"));
        let (lifecycle, ctx) = setup(vec![b.clone()]).await;

        let cancellable = Cancellable::new();
        cancellable.cancel();
        let err = lifecycle.delete_account("A", &cancellable).await.unwrap_err();
        assert!(matches!(err, CoreError::Storage(StorageError::Cancelled { .. })));
        assert!(ResolutionService::new(ctx).contains("A").await);
    }

    #[tokio::test]
    async fn adopting_a_known_account_is_ignored() {
        let b1 = Arc::new(MockBackend::new("b1", 10).with_account("A"));
        let b2 = Arc::new(MockBackend::new("b2", 5));
        let (lifecycle, ctx) = setup(vec![b1, b2.clone()]).await;

        assert!(!lifecycle.adopt_account(1, "A").await.unwrap());
        assert_eq!(
            ResolutionService::new(ctx.clone()).home_of("A").await.unwrap().name,
            "b1"
        );

        b2.insert_attribute("B", "DisplayName", Value::from("new"));
        assert!(lifecycle.adopt_account(1, "B").await.unwrap());
        assert_eq!(ResolutionService::new(ctx).list_accounts().await, ["A", "B"]);
    }

    #[tokio::test]
    async fn forget_only_from_home() {
        let b1 = Arc::new(MockBackend::new("b1", 10).with_account("A"));
        let b2 = Arc::new(MockBackend::new("b2", 5));
        let (lifecycle, ctx) = setup(vec![b1, b2]).await;

        assert!(!lifecycle.forget_account(1, "A").await);
        assert!(lifecycle.forget_account(0, "A").await);
        assert!(!lifecycle.forget_account(0, "A").await);

        let err = WriteService::new(ctx)
            .set_attribute("A", "Nickname", Some(&Value::from("x")), KeyFlags::NONE)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AccountNotFound(_)));
    }
}
