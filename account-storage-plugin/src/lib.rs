//! # account-storage-plugin
//!
//! The contract between an account manager and its pluggable account
//! storage backends (flat files, keyrings, online-account services, ...).
//!
//! ## Overview
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`AccountStorage`] | Trait every backend implements |
//! | [`AccountManager`] | Services the account manager offers backends |
//! | [`Value`] / [`ValueType`] | Typed attribute and parameter values |
//! | [`Notifier`] / [`StorageEvent`] | Change notifications from backends |
//! | [`escape_value`] / [`unescape_value`] | Keyfile encoding for text stores |
//!
//! Account names are the unique tail of an account's object path, for
//! instance `gabble/jabber/chris_40example_2ecom0`.
//!
//! ## Implementing a backend
//!
//! ```rust
//! use account_storage_plugin::{
//!     AccountManager, AccountStorage, Value, ValueType, priority,
//! };
//!
//! struct Static;
//!
//! #[async_trait::async_trait]
//! impl AccountStorage for Static {
//!     fn name(&self) -> &str { "static" }
//!     fn description(&self) -> &str { "A fixed, read-only account" }
//!     fn priority(&self) -> i32 { priority::DEFAULT }
//!
//!     fn list_accounts(&self, _am: &dyn AccountManager) -> Vec<String> {
//!         vec!["salut/local_xmpp/account0".to_string()]
//!     }
//!
//!     fn get_attribute(&self, _a: &str, attr: &str, _hint: ValueType) -> Option<Value> {
//!         (attr == "DisplayName").then(|| Value::from("Local"))
//!     }
//!
//!     fn get_parameter(&self, _a: &str, _p: &str, _hint: Option<ValueType>) -> Option<Value> {
//!         None
//!     }
//!
//!     fn list_typed_parameters(&self, _a: &str) -> Vec<String> {
//!         Vec::new()
//!     }
//! }
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`StorageResult<T>`](StorageResult). Read-only
//! backends answer `create` and `delete` with
//! [`StorageError::NotImplemented`], which is a normal negative result rather
//! than a fault; see [`StorageError::is_expected`].

mod cancel;
mod error;
mod events;
mod keyfile;
mod traits;
mod types;
mod value;
mod utils;

pub use cancel::Cancellable;
pub use error::{StorageError, StorageResult};
pub use events::{EventKind, Notifier, PARAMETER_PREFIX, StorageEvent};
pub use keyfile::{escape_value, unescape_value};
pub use traits::{AccountManager, AccountStorage};
pub use types::{
    CommitTarget, KeyFlags, RestrictionFlags, SetResult, StorageFlags, ValueType, priority,
};
pub use utils::log_sanitizer;
pub use value::{Value, is_valid_object_path};
