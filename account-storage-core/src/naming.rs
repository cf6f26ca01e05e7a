//! Unique account name allocation
//!
//! Account names look like `gabble/jabber/chris_40example_2ecom0`: the
//! connection manager, the protocol and the identification, each made safe
//! for an object path, followed by a serial number.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

use account_storage_plugin::AccountManager;

/// Escape an arbitrary string into `[A-Za-z0-9_]+`.
///
/// ASCII letters and digits are kept, except a leading digit. Every other
/// byte becomes `_` followed by two lowercase hex digits. The empty string
/// becomes `_`.
pub fn escape_as_identifier(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }

    let mut escaped = String::with_capacity(name.len());
    for (i, byte) in name.bytes().enumerate() {
        let keep = byte.is_ascii_alphabetic() || (i > 0 && byte.is_ascii_digit());
        if keep {
            escaped.push(char::from(byte));
        } else {
            let _ = write!(escaped, "_{byte:02x}");
        }
    }
    escaped
}

/// Hands out account names that no known account uses.
///
/// Seed it with the accounts found at startup; every name it returns is
/// reserved immediately so two backends creating at once cannot collide.
#[derive(Debug, Default)]
pub struct NameAllocator {
    taken: Mutex<HashSet<String>>,
}

impl NameAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` as used.
    pub fn reserve(&self, name: &str) {
        self.lock().insert(name.to_string());
    }

    /// Make `name` available again.
    pub fn release(&self, name: &str) {
        self.lock().remove(name);
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.taken.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AccountManager for NameAllocator {
    fn unique_name(&self, manager: &str, protocol: &str, identification: &str) -> String {
        let base = format!(
            "{}/{}/{}",
            escape_as_identifier(manager),
            protocol.replace('-', "_"),
            escape_as_identifier(identification)
        );

        let mut taken = self.lock();
        let mut serial: u32 = 0;
        loop {
            let candidate = format!("{base}{serial}");
            if !taken.contains(&candidate) {
                taken.insert(candidate.clone());
                return candidate;
            }
            serial += 1;
        }
    }
}
