//! Read path: answers attribute and parameter queries from the backend that
//! owns each key.

use std::collections::BTreeSet;
use std::sync::Arc;

use account_storage_plugin::{AccountStorage, StorageFlags};

use crate::error::{CoreError, CoreResult};
use crate::registry::RegisteredBackend;
use crate::types::{
    AccountStorageInfo, BackendInfo, ParameterListing, ReadFallback, StorageKey, Value, ValueType,
};

use super::StorageContext;

/// Read-side service
pub struct ResolutionService {
    ctx: Arc<StorageContext>,
}

impl ResolutionService {
    #[must_use]
    pub fn new(ctx: Arc<StorageContext>) -> Self {
        Self { ctx }
    }

    /// All known account names, sorted
    pub async fn list_accounts(&self) -> Vec<String> {
        self.ctx
            .ownership()
            .read()
            .await
            .account_names()
            .map(str::to_string)
            .collect()
    }

    pub async fn contains(&self, account: &str) -> bool {
        self.ctx.ownership().read().await.contains(account)
    }

    /// Read an attribute as `hint`.
    ///
    /// `Ok(None)` means no backend has a value that converts to `hint`.
    pub async fn get_attribute(
        &self,
        account: &str,
        attribute: &str,
        hint: ValueType,
    ) -> CoreResult<Option<Value>> {
        let key = StorageKey::attribute(attribute);
        let value = self
            .resolve(account, &key, |storage| {
                storage.get_attribute(account, attribute, hint)
            })
            .await?;
        Ok(value.and_then(|v| coerce_logged(account, &key, &v, hint)))
    }

    /// Read an attribute listed in the configured known attributes, using
    /// its configured type.
    pub async fn get_known_attribute(
        &self,
        account: &str,
        attribute: &str,
    ) -> CoreResult<Option<Value>> {
        let hint = self.ctx.config().attribute_type(attribute).ok_or_else(|| {
            CoreError::Config(format!("attribute {attribute} has no configured type"))
        })?;
        self.get_attribute(account, attribute, hint).await
    }

    /// Read a parameter.
    ///
    /// Without a hint only values whose type the backend stored are returned;
    /// untyped text is treated as absent since it cannot be interpreted.
    pub async fn get_parameter(
        &self,
        account: &str,
        parameter: &str,
        hint: Option<ValueType>,
    ) -> CoreResult<Option<Value>> {
        let key = StorageKey::parameter(parameter);
        let value = self
            .resolve(account, &key, |storage| {
                storage.get_parameter(account, parameter, hint)
            })
            .await?;

        Ok(value.and_then(|v| match hint {
            Some(hint) => coerce_logged(account, &key, &v, hint),
            None if v.is_typed() => Some(v),
            None => None,
        }))
    }

    /// Parameter names across every backend holding the account.
    ///
    /// A name typed in any backend is only listed as typed.
    pub async fn list_parameters(&self, account: &str) -> CoreResult<ParameterListing> {
        let backends = self.backends_for(account).await?;

        let mut typed = BTreeSet::new();
        let mut untyped = BTreeSet::new();
        for backend in backends {
            typed.extend(backend.storage().list_typed_parameters(account));
            untyped.extend(backend.storage().list_untyped_parameters(account));
        }
        let untyped = untyped.difference(&typed).cloned().collect();

        Ok(ParameterListing {
            typed: typed.into_iter().collect(),
            untyped,
        })
    }

    /// The backend currently authoritative for `key`, if recorded
    pub async fn owner_of(&self, account: &str, key: &StorageKey) -> Option<BackendInfo> {
        let owner = self.ctx.ownership().read().await.owner(account, key)?;
        self.ctx.registry().get(owner).map(RegisteredBackend::info)
    }

    /// The backend an account lives in
    pub async fn home_of(&self, account: &str) -> CoreResult<BackendInfo> {
        Ok(self.ctx.home_backend(account).await?.info())
    }

    /// Storage details reported by the account's home backend
    pub async fn storage_info(&self, account: &str) -> CoreResult<AccountStorageInfo> {
        let backend = self.ctx.home_backend(account).await?;
        let storage = backend.storage();
        Ok(AccountStorageInfo {
            backend: backend.info(),
            identifier: storage.identifier(account),
            additional_info: storage.additional_info(account),
            restrictions: storage.restrictions(account),
            flags: storage.flags(account),
        })
    }

    pub async fn has_all_flags(&self, account: &str, required: StorageFlags) -> CoreResult<bool> {
        let backend = self.ctx.home_backend(account).await?;
        Ok(backend.storage().has_all_flags(account, required))
    }

    pub async fn has_any_flag(&self, account: &str, required: StorageFlags) -> CoreResult<bool> {
        let backend = self.ctx.home_backend(account).await?;
        Ok(backend.storage().has_any_flag(account, required))
    }

    async fn backends_for(&self, account: &str) -> CoreResult<Vec<&RegisteredBackend>> {
        let ids = self.ctx.ownership().read().await.backends_for(account);
        if ids.is_empty() {
            return Err(CoreError::AccountNotFound(account.to_string()));
        }
        Ok(self
            .ctx
            .registry()
            .descending()
            .filter(|b| ids.contains(&b.id()))
            .collect())
    }

    /// Ask the recorded owner of `key`, or fall back per configuration.
    async fn resolve<F>(&self, account: &str, key: &StorageKey, read: F) -> CoreResult<Option<Value>>
    where
        F: Fn(&dyn AccountStorage) -> Option<Value>,
    {
        let (home, owner) = {
            let ownership = self.ctx.ownership().read().await;
            let home = ownership
                .home(account)
                .ok_or_else(|| CoreError::AccountNotFound(account.to_string()))?;
            (home, ownership.owner(account, key))
        };

        if let Some(owner) = owner {
            let backend = self.ctx.backend(owner)?;
            return Ok(read(&**backend.storage()));
        }

        match self.ctx.config().read_fallback {
            ReadFallback::StartupOwner => {
                let backend = self.ctx.backend(home)?;
                Ok(read(&**backend.storage()))
            }
            ReadFallback::Descending => Ok(self
                .ctx
                .registry()
                .descending()
                .find_map(|backend| read(&**backend.storage()))),
        }
    }
}

fn coerce_logged(account: &str, key: &StorageKey, value: &Value, hint: ValueType) -> Option<Value> {
    let coerced = value.coerce(hint);
    if coerced.is_none() {
        log::warn!("{account}: stored {key} cannot be read as {hint}");
    }
    coerced
}
