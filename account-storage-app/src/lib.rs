//! Application bootstrap for pluggable account storage.
//!
//! Provides `AppState` (service container), `AppStateBuilder` (backend and
//! configuration injection), `StartupHooks` (embedder callbacks around the
//! startup load) and the `AccountCache` that follows backend notifications.

pub mod adapters;
pub mod cache;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use account_storage_core::error::{CoreError, CoreResult};
use account_storage_core::services::{
    AccountBootstrapService, AccountLifecycleService, ResolutionService, StorageContext,
    WriteService,
};
use account_storage_core::types::{LoadResult, StorageConfig, StorageEvent};
use account_storage_core::{AccountStorage, BackendRegistryBuilder, NotificationBus};

pub use cache::{AccountCache, CachedAccount, EventOutcome};

/// Callbacks around the startup sequence.
///
/// Use `NoopStartupHooks` if nothing needs to happen.
#[async_trait::async_trait]
pub trait StartupHooks: Send + Sync {
    /// Called once every backend has listed its accounts and the cache is filled.
    async fn accounts_loaded(&self, _result: &LoadResult) {}

    /// Called when the startup load fails; the app keeps running with
    /// whatever was loaded.
    async fn load_failed(&self, _error: &CoreError) {}
}

/// No-op startup hooks.
pub struct NoopStartupHooks;

#[async_trait::async_trait]
impl StartupHooks for NoopStartupHooks {}

/// Application state.
///
/// Holds the `StorageContext`, every service and the account cache. Build it
/// once at startup via `AppStateBuilder`.
pub struct AppState {
    /// Service context (registry, bus, config, ownership)
    pub ctx: Arc<StorageContext>,
    pub bootstrap_service: AccountBootstrapService,
    pub resolution_service: Arc<ResolutionService>,
    pub write_service: Arc<WriteService>,
    pub lifecycle_service: Arc<AccountLifecycleService>,
    pub cache: Arc<AccountCache>,
    /// Whether the startup load has completed
    pub startup_completed: AtomicBool,
    /// Subscribed at build time so nothing emitted during startup is lost
    events: Mutex<Option<broadcast::Receiver<StorageEvent>>>,
}

impl AppState {
    /// Run the startup sequence: merge every backend's accounts, then fill
    /// the cache. Sets `startup_completed` when done.
    pub async fn run_startup(&self, hooks: &dyn StartupHooks) -> CoreResult<LoadResult> {
        let loaded = match self.bootstrap_service.load_accounts().await {
            Ok(result) => self.cache.reload().await.map(|_| result),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(result) => {
                log::info!(
                    "Startup load complete: {} account(s) from {} backend(s)",
                    result.account_count,
                    self.ctx.registry().len()
                );
                hooks.accounts_loaded(&result).await;
                self.startup_completed.store(true, Ordering::SeqCst);
                Ok(result)
            }
            Err(e) => {
                log::error!("Startup load failed: {e}");
                hooks.load_failed(&e).await;
                Err(e)
            }
        }
    }

    /// Hand notifications to the cache on a background task.
    ///
    /// Returns `None` if the listener was already started.
    pub async fn start_event_listener(&self) -> Option<JoinHandle<()>> {
        let events = self.events.lock().await.take()?;
        Some(Arc::clone(&self.cache).spawn_listener(events))
    }

    /// Apply notifications already queued, without a background task.
    /// Returns how many were handled.
    pub async fn process_pending_events(&self) -> usize {
        let mut guard = self.events.lock().await;
        let Some(events) = guard.as_mut() else {
            return 0;
        };

        let mut handled = 0;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    self.cache.dispatch(&event).await;
                    handled += 1;
                }
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    log::warn!("Missed {missed} notification(s), reloading cache");
                    if let Err(e) = self.cache.reload().await {
                        log::error!("Failed to reload account cache: {e}");
                    }
                }
                Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {
                    break
                }
            }
        }
        handled
    }
}

/// Builder for constructing `AppState` from backends and configuration.
///
/// # Required
/// - at least one `backend`
///
/// # Optional
/// - `config` / `config_json`: defaults to `StorageConfig::default()`
pub struct AppStateBuilder {
    backends: Vec<Arc<dyn AccountStorage>>,
    config: Option<StorageConfig>,
    config_json: Option<String>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            config: None,
            config_json: None,
        }
    }

    /// Register a backend. Registration order breaks priority ties.
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn AccountStorage>) -> Self {
        self.backends.push(backend);
        self
    }

    #[must_use]
    pub fn config(mut self, config: StorageConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Configuration as JSON, parsed and validated by `build`.
    #[must_use]
    pub fn config_json(mut self, json: impl Into<String>) -> Self {
        self.config_json = Some(json.into());
        self
    }

    /// Build the `AppState`.
    ///
    /// # Errors
    /// Returns `CoreError::NoBackends` if no backend was registered and
    /// `CoreError::Config` for an invalid configuration.
    pub fn build(self) -> CoreResult<AppState> {
        let config = match (self.config_json, self.config) {
            (Some(json), _) => StorageConfig::from_json_str(&json)?,
            (None, Some(config)) => {
                config.validate()?;
                config
            }
            (None, None) => StorageConfig::default(),
        };

        let bus = NotificationBus::new(config.event_capacity);
        let registry = self
            .backends
            .into_iter()
            .fold(BackendRegistryBuilder::new(), BackendRegistryBuilder::register)
            .build(&bus)?;
        let events = bus.subscribe();

        let ctx = Arc::new(StorageContext::new(registry, bus, config));
        let bootstrap_service = AccountBootstrapService::new(Arc::clone(&ctx));
        let resolution_service = Arc::new(ResolutionService::new(Arc::clone(&ctx)));
        let write_service = Arc::new(WriteService::new(Arc::clone(&ctx)));
        let lifecycle_service = Arc::new(AccountLifecycleService::new(Arc::clone(&ctx)));
        let cache = Arc::new(AccountCache::new(
            Arc::clone(&ctx),
            Arc::clone(&resolution_service),
            Arc::clone(&write_service),
            Arc::clone(&lifecycle_service),
        ));

        Ok(AppState {
            ctx,
            bootstrap_service,
            resolution_service,
            write_service,
            lifecycle_service,
            cache,
            startup_completed: AtomicBool::new(false),
            events: Mutex::new(Some(events)),
        })
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
