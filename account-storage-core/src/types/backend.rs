//! Backend and ownership related type definitions

use std::collections::HashMap;

use serde::Serialize;

use account_storage_plugin::{
    PARAMETER_PREFIX, RestrictionFlags, StorageFlags, Value,
};

/// A key on an account: an attribute or a parameter.
///
/// Attributes and parameters live in separate namespaces; `Display` renders
/// parameters with the `param-` prefix used by change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    /// Backend-agnostic property such as `DisplayName`
    Attribute(String),
    /// Protocol-specific property such as `require-encryption`
    Parameter(String),
}

impl StorageKey {
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::Attribute(name.into())
    }

    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter(name.into())
    }

    /// Parse a notification key: `param-foo` is parameter `foo`, anything
    /// else an attribute.
    pub fn from_event_key(key: &str) -> Self {
        match key.strip_prefix(PARAMETER_PREFIX) {
            Some(param) => Self::Parameter(param.to_string()),
            None => Self::Attribute(key.to_string()),
        }
    }

    /// The unprefixed key name
    pub fn name(&self) -> &str {
        match self {
            Self::Attribute(name) | Self::Parameter(name) => name,
        }
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attribute(name) => f.write_str(name),
            Self::Parameter(name) => write!(f, "{PARAMETER_PREFIX}{name}"),
        }
    }
}

/// Snapshot of a registered backend's identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendInfo {
    /// Registration index
    pub id: usize,
    pub name: String,
    pub description: String,
    /// Namespaced provider identifier, empty if none
    pub provider: String,
    pub priority: i32,
}

/// Storage details of one account, as reported by its owning backend
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStorageInfo {
    pub backend: BackendInfo,
    /// Storage-specific identifier
    pub identifier: Value,
    /// Storage-specific extra information, not interpreted
    pub additional_info: HashMap<String, Value>,
    pub restrictions: RestrictionFlags,
    pub flags: StorageFlags,
}

/// Parameter names of an account, split by whether their type is stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterListing {
    pub typed: Vec<String>,
    pub untyped: Vec<String>,
}

/// Startup load results
#[derive(Debug, Clone, Default)]
pub struct LoadResult {
    /// Number of distinct accounts found
    pub account_count: usize,
    /// Number of (account, key) claims recorded
    pub claimed_keys: usize,
}
