use std::collections::HashMap;

use async_trait::async_trait;

use crate::cancel::Cancellable;
use crate::error::{StorageError, StorageResult};
use crate::events::Notifier;
use crate::keyfile;
use crate::types::{CommitTarget, KeyFlags, RestrictionFlags, SetResult, StorageFlags, ValueType};
use crate::value::Value;

/// Services the account manager offers to backends.
///
/// Backends receive this in the calls that may need to allocate names or
/// convert values. Only the account manager implements it.
pub trait AccountManager: Send + Sync {
    /// Allocate the canonical unique name for a new account.
    ///
    /// `identification` is a protocol-normalized form of the account's
    /// identity, or `"account"` if nothing is suitable.
    fn unique_name(&self, manager: &str, protocol: &str, identification: &str) -> String;

    /// Escape `value` for storage in a keyfile.
    fn escape_value(&self, value: &Value) -> String {
        keyfile::escape_value(value)
    }

    /// Parse keyfile text as a value of type `value_type`.
    fn unescape_value(&self, escaped: &str, value_type: ValueType) -> StorageResult<Value> {
        keyfile::unescape_value(escaped, value_type)
    }
}

/// Account storage backend trait.
///
/// Every backend implements the mandatory methods (`name`, `description`,
/// `priority`, `list_accounts`, `get_attribute`, `get_parameter`,
/// `list_typed_parameters`). The remaining methods have defaults suited to a
/// read-only backend.
///
/// All methods except [`delete`](Self::delete) run inline on the caller's
/// task and must not block; the one exception is
/// [`list_accounts`](Self::list_accounts), which is called once at startup.
#[async_trait]
pub trait AccountStorage: Send + Sync {
    /// Backend name, used in logs.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Namespaced provider identifier, or `""` if none.
    fn provider(&self) -> &str {
        ""
    }

    /// Priority of this backend. See [`priority`](crate::priority).
    ///
    /// Must not change for the lifetime of the process.
    fn priority(&self) -> i32;

    /// Receive the handle this backend emits change notifications through.
    ///
    /// Called once, when the backend is registered. Backends that never
    /// announce external changes can ignore it.
    fn attach(&self, _notifier: Notifier) {}

    /// Capabilities for `account`.
    fn flags(&self, _account: &str) -> StorageFlags {
        StorageFlags::NONE
    }

    /// Whether `account` has every flag in `required` (true for the empty set).
    fn has_all_flags(&self, account: &str, required: StorageFlags) -> bool {
        self.flags(account).contains(required)
    }

    /// Whether `account` has at least one flag in `required` (false for the
    /// empty set).
    fn has_any_flag(&self, account: &str, required: StorageFlags) -> bool {
        self.flags(account).intersects(required)
    }

    /// Load every account this backend holds into its cache and return their
    /// unique names.
    ///
    /// Called once at startup, and the only method allowed to block. Must
    /// include accounts that are also announced via
    /// [`Notifier::emit_created`]; such duplicates are ignored.
    fn list_accounts(&self, manager: &dyn AccountManager) -> Vec<String>;

    /// Read an attribute such as `DisplayName`.
    ///
    /// `hint` is the expected type, for backends that do not store types.
    /// The returned value may have a different type; the caller coerces.
    fn get_attribute(&self, account: &str, attribute: &str, hint: ValueType) -> Option<Value>;

    /// Read a parameter such as `require-encryption` (no `param-` prefix).
    ///
    /// With `hint == None` the backend must return the value with its stored
    /// type, or [`Value::Untyped`] if no type is stored.
    fn get_parameter(
        &self,
        account: &str,
        parameter: &str,
        hint: Option<ValueType>,
    ) -> Option<Value>;

    /// Names of the parameters whose types are stored with their values.
    fn list_typed_parameters(&self, account: &str) -> Vec<String>;

    /// Names of the parameters whose types are unknown.
    fn list_untyped_parameters(&self, _account: &str) -> Vec<String> {
        Vec::new()
    }

    /// Store (or with `None`, delete) an attribute in the in-memory cache.
    ///
    /// Must complete synchronously and must not write to long-term storage;
    /// that happens in [`commit`](Self::commit). Deleting from an account
    /// the backend does not hold must not create it: the coordinator sends
    /// such deletes to every lower-priority backend after each write.
    fn set_attribute(
        &self,
        _account: &str,
        _attribute: &str,
        _value: Option<&Value>,
        _flags: KeyFlags,
    ) -> SetResult {
        SetResult::Rejected
    }

    /// Store (or with `None`, delete) a parameter in the in-memory cache.
    fn set_parameter(
        &self,
        _account: &str,
        _parameter: &str,
        _value: Option<&Value>,
        _flags: KeyFlags,
    ) -> SetResult {
        SetResult::Rejected
    }

    /// Allocate a fresh unique name for a new account.
    ///
    /// Nothing is persisted yet; attributes and parameters follow through
    /// `set_*` and `commit`. Must not emit [`Notifier::emit_created`] for it.
    fn create(
        &self,
        _manager: &dyn AccountManager,
        _cm_name: &str,
        _protocol: &str,
        _identification: &str,
    ) -> StorageResult<String> {
        Err(StorageError::not_implemented(self.name(), "create"))
    }

    /// Start flushing the cache to long-term storage.
    ///
    /// Returns `true` if the flush started; completion is not implied.
    fn commit(&self, _target: &CommitTarget) -> bool {
        false
    }

    /// Delete `account` and commit the deletion, then emit
    /// [`Notifier::emit_deleted`].
    ///
    /// `cancellable` is advisory; the deletion may still complete after a
    /// cancellation request.
    async fn delete(&self, _account: &str, _cancellable: &Cancellable) -> StorageResult<()> {
        Err(StorageError::not_implemented(self.name(), "delete"))
    }

    /// Storage-specific identifier for `account`.
    fn identifier(&self, account: &str) -> Value {
        Value::String(account.to_string())
    }

    /// Storage-specific information, surfaced but not interpreted.
    fn additional_info(&self, _account: &str) -> HashMap<String, Value> {
        HashMap::new()
    }

    /// Restrictions on modifying `account`.
    fn restrictions(&self, _account: &str) -> RestrictionFlags {
        RestrictionFlags::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnly;

    #[async_trait]
    impl AccountStorage for ReadOnly {
        fn name(&self) -> &str {
            "read-only"
        }

        fn description(&self) -> &str {
            "A backend with nothing but the mandatory methods"
        }

        fn priority(&self) -> i32 {
            0
        }

        fn list_accounts(&self, _manager: &dyn AccountManager) -> Vec<String> {
            vec!["fake/fake/a0".to_string()]
        }

        fn get_attribute(&self, _: &str, _: &str, _: ValueType) -> Option<Value> {
            None
        }

        fn get_parameter(&self, _: &str, _: &str, _: Option<ValueType>) -> Option<Value> {
            None
        }

        fn list_typed_parameters(&self, _: &str) -> Vec<String> {
            Vec::new()
        }
    }

    struct Names;

    impl AccountManager for Names {
        fn unique_name(&self, manager: &str, protocol: &str, _: &str) -> String {
            format!("{manager}/{protocol}/x0")
        }
    }

    #[tokio::test]
    async fn defaults_describe_a_read_only_backend() {
        let b = ReadOnly;
        assert_eq!(b.provider(), "");
        assert_eq!(b.flags("a"), StorageFlags::NONE);
        assert!(b.has_all_flags("a", StorageFlags::NONE));
        assert!(!b.has_any_flag("a", StorageFlags::NONE));
        assert!(!b.has_all_flags("a", StorageFlags::STORES_TYPES));
        assert_eq!(
            b.set_attribute("a", "DisplayName", Some(&Value::from("x")), KeyFlags::NONE),
            SetResult::Rejected
        );
        assert_eq!(
            b.set_parameter("a", "account", None, KeyFlags::NONE),
            SetResult::Rejected
        );
        assert!(!b.commit(&CommitTarget::All));
        assert!(b.list_untyped_parameters("a").is_empty());
        assert_eq!(b.identifier("a"), Value::String("a".to_string()));
        assert!(b.additional_info("a").is_empty());
        assert!(b.restrictions("a").is_empty());
    }

    #[tokio::test]
    async fn default_create_and_delete_are_not_implemented() {
        let b = ReadOnly;
        let err = b.create(&Names, "gabble", "jabber", "me").unwrap_err();
        assert!(matches!(err, StorageError::NotImplemented { .. }));

        let err = b.delete("a", &Cancellable::new()).await.unwrap_err();
        assert_eq!(err, StorageError::not_implemented("read-only", "delete"));
    }

    #[test]
    fn manager_escaping_defaults_to_keyfile() {
        let v = Value::StringArray(vec!["a".into()]);
        let text = Names.escape_value(&v);
        assert_eq!(text, "a;");
        assert_eq!(Names.unescape_value(&text, ValueType::StringArray).unwrap(), v);
    }
}
