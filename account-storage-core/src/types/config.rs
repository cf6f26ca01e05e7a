//! Coordinator configuration

use serde::{Deserialize, Serialize};

use account_storage_plugin::ValueType;

use crate::error::{CoreError, CoreResult};

/// Where reads go when no backend has claimed the key yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadFallback {
    /// Ask the backend that supplied the account during the startup load.
    #[default]
    StartupOwner,
    /// Ask every backend, highest priority first, and take the first value.
    Descending,
}

/// An attribute the coordinator knows how to probe, with its expected type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownAttribute {
    /// Attribute name, e.g. `DisplayName`
    pub name: String,
    /// Expected type, passed to backends as a hint
    pub value_type: ValueType,
}

impl KnownAttribute {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// Coordinator configuration
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    /// Read path policy for keys without a recorded owner
    pub read_fallback: ReadFallback,
    /// Buffer size of the notification channel
    pub event_capacity: usize,
    /// Attributes probed on each backend when an account is loaded
    ///
    /// Backends cannot enumerate attributes, so ownership of an attribute is
    /// only recorded at load time if it appears here.
    pub known_attributes: Vec<KnownAttribute>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            read_fallback: ReadFallback::default(),
            event_capacity: 256,
            known_attributes: default_attributes(),
        }
    }
}

impl StorageConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> CoreResult<()> {
        if self.event_capacity == 0 {
            return Err(CoreError::Config(
                "eventCapacity must be greater than zero".to_string(),
            ));
        }
        if let Some(attr) = self.known_attributes.iter().find(|a| a.name.is_empty()) {
            return Err(CoreError::Config(format!(
                "known attribute with empty name (type {})",
                attr.value_type
            )));
        }
        Ok(())
    }

    /// Expected type of a known attribute.
    pub fn attribute_type(&self, name: &str) -> Option<ValueType> {
        self.known_attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value_type)
    }
}

/// The account attributes an account manager stores.
fn default_attributes() -> Vec<KnownAttribute> {
    [
        ("manager", ValueType::String),
        ("protocol", ValueType::String),
        ("DisplayName", ValueType::String),
        ("Icon", ValueType::String),
        ("Enabled", ValueType::Boolean),
        ("Nickname", ValueType::String),
        ("Service", ValueType::String),
        ("ConnectAutomatically", ValueType::Boolean),
        ("Supersedes", ValueType::ObjectPathArray),
        ("AvatarMime", ValueType::String),
        ("NormalizedName", ValueType::String),
        ("HasBeenOnline", ValueType::Boolean),
    ]
    .into_iter()
    .map(|(name, value_type)| KnownAttribute::new(name, value_type))
    .collect()
}
