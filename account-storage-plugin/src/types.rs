use serde::{Deserialize, Serialize};

// ============ Priorities ============

/// Well-known backend priorities.
///
/// Higher numbers are preferred for writes and consulted first on reads.
/// When loading accounts at startup, backends are consulted from lowest to
/// highest so that higher priorities overrule lower ones.
pub mod priority {
    /// Priority of the default (flat file) backend.
    pub const DEFAULT: i32 = 0;
    /// Priority for ordinary third-party backends.
    pub const NORMAL: i32 = 100;
    /// Historical keyring priority. No longer has special meaning.
    pub const KEYRING: i32 = 10000;
}

// ============ Value types ============

/// The semantic type of a [`Value`](crate::Value).
///
/// This is the closed set of types that can be stored by text-based backends
/// and round-tripped through [`escape_value`](crate::escape_value) /
/// [`unescape_value`](crate::unescape_value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueType {
    String,
    Boolean,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Byte,
    StringArray,
    ObjectPath,
    ObjectPathArray,
}

impl ValueType {
    /// The D-Bus type signature for this type, used in debug output.
    pub fn signature(self) -> &'static str {
        match self {
            Self::String => "s",
            Self::Boolean => "b",
            Self::Int32 => "i",
            Self::UInt32 => "u",
            Self::Int64 => "x",
            Self::UInt64 => "t",
            Self::Byte => "y",
            Self::StringArray => "as",
            Self::ObjectPath => "o",
            Self::ObjectPathArray => "ao",
        }
    }

    /// Whether this is one of the integer types.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int32 | Self::UInt32 | Self::Int64 | Self::UInt64 | Self::Byte
        )
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Byte => "byte",
            Self::StringArray => "string-array",
            Self::ObjectPath => "object-path",
            Self::ObjectPathArray => "object-path-array",
        };
        f.write_str(name)
    }
}

// ============ Set / commit ============

/// Outcome of a backend's `set_attribute` / `set_parameter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetResult {
    /// The backend declined to store the value.
    Rejected,
    /// The backend claimed the value and its cache changed.
    Changed,
    /// The backend claimed the value, which it already held.
    Unchanged,
}

impl SetResult {
    /// Whether the backend took ownership of the key.
    pub fn is_claimed(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// What a `commit` call should flush.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommitTarget {
    /// A single account, by unique name.
    Account(String),
    /// Every account the backend holds.
    All,
}

impl CommitTarget {
    /// Build a target for one account.
    pub fn account(name: impl Into<String>) -> Self {
        Self::Account(name.into())
    }

    /// The account name, or `None` for [`CommitTarget::All`].
    pub fn as_account(&self) -> Option<&str> {
        match self {
            Self::Account(name) => Some(name),
            Self::All => None,
        }
    }
}

impl std::fmt::Display for CommitTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Account(name) => f.write_str(name),
            Self::All => f.write_str("<all accounts>"),
        }
    }
}

// ============ Flag sets ============

macro_rules! bitmask {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$flag_meta:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// The empty set.
            pub const NONE: Self = Self(0);
            $(
                $(#[$flag_meta])*
                pub const $flag: Self = Self($value);
            )*

            /// Build a set from raw bits.
            pub const fn from_bits(bits: u32) -> Self {
                Self(bits)
            }

            /// The raw bits of this set.
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// Whether no flag is set.
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// Whether every flag in `other` is also in `self`.
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Whether at least one flag in `other` is in `self`.
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

bitmask! {
    /// Capabilities a backend reports for an account.
    pub struct StorageFlags {
        /// The backend persists each parameter's type alongside its value.
        const STORES_TYPES = 1;
    }
}

bitmask! {
    /// Restrictions the owning backend places on an account.
    pub struct RestrictionFlags {
        /// Parameters cannot be changed.
        const CANNOT_SET_PARAMETERS = 1;
        /// The account cannot be enabled or disabled.
        const CANNOT_SET_ENABLED = 2;
        /// The requested presence cannot be changed.
        const CANNOT_SET_PRESENCE = 4;
        /// The service name cannot be changed.
        const CANNOT_SET_SERVICE = 8;
    }
}

bitmask! {
    /// Per-key flags passed through to the backend on writes.
    pub struct KeyFlags {
        /// The value is a secret (e.g. a password) and may go to a keyring.
        const SECRET = 1;
    }
}
