//! 业务逻辑服务层

mod account_bootstrap_service;
mod account_lifecycle_service;
mod resolution_service;
mod write_service;

pub use account_bootstrap_service::AccountBootstrapService;
pub use account_lifecycle_service::AccountLifecycleService;
pub use resolution_service::ResolutionService;
pub use write_service::WriteService;

use tokio::sync::RwLock;

use account_storage_plugin::AccountStorage;

use crate::error::{CoreError, CoreResult};
use crate::naming::NameAllocator;
use crate::notification::NotificationBus;
use crate::ownership::OwnershipMap;
use crate::registry::{BackendRegistry, RegisteredBackend};
use crate::types::{StorageConfig, StorageKey};

/// 服务上下文 - 持有所有依赖
///
/// Owns the registry, the bus, the configuration and the ownership map. The
/// map sits behind a single lock; writers hold it for the whole
/// claim-then-purge sequence so ownership changes are serialized.
pub struct StorageContext {
    registry: BackendRegistry,
    bus: NotificationBus,
    config: StorageConfig,
    ownership: RwLock<OwnershipMap>,
    names: NameAllocator,
}

impl StorageContext {
    /// 创建服务上下文
    #[must_use]
    pub fn new(registry: BackendRegistry, bus: NotificationBus, config: StorageConfig) -> Self {
        Self {
            registry,
            bus,
            config,
            ownership: RwLock::new(OwnershipMap::new()),
            names: NameAllocator::new(),
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The account manager handed to backends for `list_accounts` and `create`
    pub fn names(&self) -> &NameAllocator {
        &self.names
    }

    pub(crate) fn ownership(&self) -> &RwLock<OwnershipMap> {
        &self.ownership
    }

    /// Look up a backend by id
    pub(crate) fn backend(&self, id: usize) -> CoreResult<&RegisteredBackend> {
        self.registry
            .get(id)
            .ok_or_else(|| CoreError::Config(format!("no backend registered with id {id}")))
    }

    /// Home backend of a known account
    pub(crate) async fn home_backend(&self, account: &str) -> CoreResult<&RegisteredBackend> {
        let home = self
            .ownership
            .read()
            .await
            .home(account)
            .ok_or_else(|| CoreError::AccountNotFound(account.to_string()))?;
        self.backend(home)
    }
}

impl std::fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageContext")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Keys `storage` holds for `account`: probed known attributes plus every
/// parameter it lists.
pub(crate) fn supplied_keys(
    storage: &dyn AccountStorage,
    config: &StorageConfig,
    account: &str,
) -> Vec<StorageKey> {
    let attributes = config
        .known_attributes
        .iter()
        .filter(|attr| {
            storage
                .get_attribute(account, &attr.name, attr.value_type)
                .is_some()
        })
        .map(|attr| StorageKey::attribute(attr.name.clone()));

    let parameters = storage
        .list_typed_parameters(account)
        .into_iter()
        .chain(storage.list_untyped_parameters(account))
        .map(StorageKey::Parameter);

    let mut keys: Vec<StorageKey> = attributes.chain(parameters).collect();
    keys.sort();
    keys.dedup();
    keys
}
