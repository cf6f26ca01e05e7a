//! Account Storage Core Library
//!
//! Coordinates any number of account storage backends behind one view:
//! - Backend registry, ordered by priority
//! - Resolution of reads to the backend that owns each key
//! - Write coordination (claim by the highest priority, purge the rest)
//! - Account creation, commit and deletion
//! - A notification bus carrying backend change events
//!
//! Backends implement [`AccountStorage`] from `account-storage-plugin`; this
//! crate never touches storage itself.

pub mod error;
pub mod naming;
pub mod notification;
pub mod ownership;
pub mod registry;
pub mod services;
pub mod types;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use account_storage_plugin::{AccountManager, AccountStorage, Cancellable};
pub use error::{CoreError, CoreResult};
pub use naming::{escape_as_identifier, NameAllocator};
pub use notification::NotificationBus;
pub use registry::{BackendRegistry, BackendRegistryBuilder, RegisteredBackend};
pub use services::{
    AccountBootstrapService, AccountLifecycleService, ResolutionService, StorageContext,
    WriteService,
};
