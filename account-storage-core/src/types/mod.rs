//! 类型定义模块

mod backend;
mod config;

pub use backend::{AccountStorageInfo, BackendInfo, LoadResult, ParameterListing, StorageKey};
pub use config::{KnownAttribute, ReadFallback, StorageConfig};

// Re-export plugin 库的公共类型
pub use account_storage_plugin::{
    CommitTarget, EventKind, KeyFlags, RestrictionFlags, SetResult, StorageEvent, StorageFlags,
    Value, ValueType,
};
