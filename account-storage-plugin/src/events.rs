//! Change notifications emitted by backends.
//!
//! A backend receives a [`Notifier`] when it is registered and keeps it for
//! as long as it wants to announce external changes (another process
//! editing the same store, an online account appearing, ...).
//!
//! Before emitting, a backend must update its own cache so that any read
//! issued by a listener observes the new value.

use serde::Serialize;
use tokio::sync::broadcast;

/// Prefix that distinguishes parameter keys from attribute keys in
/// [`EventKind::AlteredOne`].
pub const PARAMETER_PREFIX: &str = "param-";

/// What happened to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EventKind {
    /// An external entity created the account.
    Created,
    /// One attribute, or one parameter (key prefixed with `param-`), changed.
    AlteredOne { key: String },
    /// An external entity deleted the account.
    Deleted,
    /// The account was enabled or disabled.
    Toggled { enabled: bool },
    /// Important parameters changed and the connection must be re-established.
    ReconnectNeeded,
}

/// A change notification, tagged with the backend that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    /// Registration index of the emitting backend.
    pub backend_id: usize,
    /// Name of the emitting backend.
    pub backend: String,
    /// Unique name of the account concerned.
    pub account: String,
    /// What happened.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl StorageEvent {
    /// For [`EventKind::AlteredOne`] on a parameter, the unprefixed
    /// parameter name.
    pub fn altered_parameter(&self) -> Option<&str> {
        match &self.kind {
            EventKind::AlteredOne { key } => key.strip_prefix(PARAMETER_PREFIX),
            _ => None,
        }
    }

    /// For [`EventKind::AlteredOne`] on an attribute, the attribute name.
    pub fn altered_attribute(&self) -> Option<&str> {
        match &self.kind {
            EventKind::AlteredOne { key } if !key.starts_with(PARAMETER_PREFIX) => Some(key),
            _ => None,
        }
    }
}

/// The handle a backend emits change notifications through.
///
/// Emission is fire-and-forget: there is no acknowledgement, and an event
/// sent while nobody listens is dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    backend_id: usize,
    backend: String,
    sender: broadcast::Sender<StorageEvent>,
}

impl Notifier {
    /// Create a notifier for the backend registered at `backend_id`.
    pub fn new(
        backend_id: usize,
        backend: impl Into<String>,
        sender: broadcast::Sender<StorageEvent>,
    ) -> Self {
        Self {
            backend_id,
            backend: backend.into(),
            sender,
        }
    }

    /// Name of the backend this notifier speaks for.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Announce an account created outside the account manager.
    pub fn emit_created(&self, account: &str) {
        self.emit(account, EventKind::Created);
    }

    /// Announce a changed attribute, e.g. `DisplayName`.
    pub fn emit_altered_attribute(&self, account: &str, attribute: &str) {
        self.emit(
            account,
            EventKind::AlteredOne {
                key: attribute.to_string(),
            },
        );
    }

    /// Announce a changed parameter. `parameter` is given without prefix.
    pub fn emit_altered_parameter(&self, account: &str, parameter: &str) {
        self.emit(
            account,
            EventKind::AlteredOne {
                key: format!("{PARAMETER_PREFIX}{parameter}"),
            },
        );
    }

    /// Announce a deleted account.
    pub fn emit_deleted(&self, account: &str) {
        self.emit(account, EventKind::Deleted);
    }

    /// Announce that an account was enabled or disabled.
    pub fn emit_toggled(&self, account: &str, enabled: bool) {
        self.emit(account, EventKind::Toggled { enabled });
    }

    /// Ask for the account's connection to be re-established.
    pub fn emit_reconnect(&self, account: &str) {
        self.emit(account, EventKind::ReconnectNeeded);
    }

    fn emit(&self, account: &str, kind: EventKind) {
        log::debug!("{}: emitting {kind:?} for {account}", self.backend);
        let event = StorageEvent {
            backend_id: self.backend_id,
            backend: self.backend.clone(),
            account: account.to_string(),
            kind,
        };
        if self.sender.send(event).is_err() {
            log::trace!("{}: no listeners for event on {account}", self.backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_events_are_prefixed() {
        let (tx, mut rx) = broadcast::channel(8);
        let notifier = Notifier::new(2, "keyfile", tx);

        notifier.emit_altered_parameter("a/b/c0", "require-encryption");
        notifier.emit_altered_attribute("a/b/c0", "DisplayName");

        let param = rx.try_recv().unwrap();
        assert_eq!(param.backend_id, 2);
        assert_eq!(
            param.kind,
            EventKind::AlteredOne {
                key: "param-require-encryption".to_string()
            }
        );
        assert_eq!(param.altered_parameter(), Some("require-encryption"));
        assert_eq!(param.altered_attribute(), None);

        let attr = rx.try_recv().unwrap();
        assert_eq!(attr.altered_attribute(), Some("DisplayName"));
        assert_eq!(attr.altered_parameter(), None);
    }

    #[test]
    fn emitting_without_listeners_is_silent() {
        let (tx, rx) = broadcast::channel(8);
        drop(rx);
        let notifier = Notifier::new(0, "keyfile", tx);
        notifier.emit_deleted("a/b/c0");
    }

    #[test]
    fn event_serializes_flat() {
        let event = StorageEvent {
            backend_id: 1,
            backend: "goa".to_string(),
            account: "a/b/c0".to_string(),
            kind: EventKind::Toggled { enabled: false },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "toggled");
        assert_eq!(json["enabled"], false);
        assert_eq!(json["backendId"], 1);
    }
}
