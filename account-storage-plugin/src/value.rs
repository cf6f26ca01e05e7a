//! Typed account values and caller-side coercion.

use serde::{Deserialize, Serialize};

use crate::keyfile::unescape_value;
use crate::types::ValueType;

/// A typed attribute or parameter value.
///
/// [`Value::Untyped`] carries the keyfile text of a value whose type the
/// backend did not store; its meaning must be supplied by the caller as a
/// type hint (see [`Value::coerce`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Value {
    String(String),
    Boolean(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Byte(u8),
    StringArray(Vec<String>),
    ObjectPath(String),
    ObjectPathArray(Vec<String>),
    Untyped(String),
}

impl Value {
    /// The type of this value, or `None` for [`Value::Untyped`].
    pub fn value_type(&self) -> Option<ValueType> {
        Some(match self {
            Self::String(_) => ValueType::String,
            Self::Boolean(_) => ValueType::Boolean,
            Self::Int32(_) => ValueType::Int32,
            Self::UInt32(_) => ValueType::UInt32,
            Self::Int64(_) => ValueType::Int64,
            Self::UInt64(_) => ValueType::UInt64,
            Self::Byte(_) => ValueType::Byte,
            Self::StringArray(_) => ValueType::StringArray,
            Self::ObjectPath(_) => ValueType::ObjectPath,
            Self::ObjectPathArray(_) => ValueType::ObjectPathArray,
            Self::Untyped(_) => return None,
        })
    }

    /// Whether the backend supplied a type with this value.
    pub fn is_typed(&self) -> bool {
        !matches!(self, Self::Untyped(_))
    }

    /// The string content of a [`Value::String`] or [`Value::ObjectPath`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::ObjectPath(s) => Some(s),
            _ => None,
        }
    }

    /// The content of a [`Value::Boolean`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert this value to `hint`, the type the caller expects.
    ///
    /// Backends may return a value whose declared type differs from the hint
    /// they were given. Rules:
    ///
    /// - a value already of type `hint` is returned unchanged;
    /// - untyped text is unescaped as `hint`;
    /// - integers convert between widths when the number fits;
    /// - strings and object paths (and their arrays) convert when every path
    ///   is valid.
    ///
    /// Returns `None` when no conversion applies.
    pub fn coerce(&self, hint: ValueType) -> Option<Self> {
        if self.value_type() == Some(hint) {
            return Some(self.clone());
        }

        match self {
            Self::Untyped(text) => match unescape_value(text, hint) {
                Ok(v) => Some(v),
                Err(e) => {
                    log::debug!("Cannot coerce untyped {text:?}: {e}");
                    None
                }
            },
            Self::String(s) if hint == ValueType::ObjectPath => {
                is_valid_object_path(s).then(|| Self::ObjectPath(s.clone()))
            }
            Self::ObjectPath(p) if hint == ValueType::String => Some(Self::String(p.clone())),
            Self::StringArray(items) if hint == ValueType::ObjectPathArray => items
                .iter()
                .all(|s| is_valid_object_path(s))
                .then(|| Self::ObjectPathArray(items.clone())),
            Self::ObjectPathArray(paths) if hint == ValueType::StringArray => {
                Some(Self::StringArray(paths.clone()))
            }
            _ if hint.is_integer() => self.as_i128().and_then(|n| from_i128(n, hint)),
            _ => None,
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            Self::Int32(n) => Some(i128::from(*n)),
            Self::UInt32(n) => Some(i128::from(*n)),
            Self::Int64(n) => Some(i128::from(*n)),
            Self::UInt64(n) => Some(i128::from(*n)),
            Self::Byte(n) => Some(i128::from(*n)),
            _ => None,
        }
    }
}

fn from_i128(n: i128, target: ValueType) -> Option<Value> {
    match target {
        ValueType::Int32 => i32::try_from(n).ok().map(Value::Int32),
        ValueType::UInt32 => u32::try_from(n).ok().map(Value::UInt32),
        ValueType::Int64 => i64::try_from(n).ok().map(Value::Int64),
        ValueType::UInt64 => u64::try_from(n).ok().map(Value::UInt64),
        ValueType::Byte => u8::try_from(n).ok().map(Value::Byte),
        _ => None,
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// Whether `path` is a syntactically valid D-Bus object path.
///
/// Either `/`, or `/`-separated non-empty elements of `[A-Za-z0-9_]` with a
/// leading `/` and no trailing `/`.
pub fn is_valid_object_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    rest.split('/').all(|element| {
        !element.is_empty()
            && element
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_validation() {
        assert!(is_valid_object_path("/"));
        assert!(is_valid_object_path("/org/freedesktop/Telepathy/Account/a/b/c0"));
        assert!(!is_valid_object_path(""));
        assert!(!is_valid_object_path("org/x"));
        assert!(!is_valid_object_path("/org/"));
        assert!(!is_valid_object_path("/org//x"));
        assert!(!is_valid_object_path("/org/x-y"));
    }

    #[test]
    fn coerce_identity() {
        let v = Value::Int64(-3);
        assert_eq!(v.coerce(ValueType::Int64), Some(Value::Int64(-3)));
    }

    #[test]
    fn coerce_untyped_uses_hint() {
        let v = Value::Untyped("true".to_string());
        assert_eq!(v.coerce(ValueType::Boolean), Some(Value::Boolean(true)));
        assert_eq!(
            v.coerce(ValueType::String),
            Some(Value::String("true".to_string()))
        );
        assert_eq!(v.coerce(ValueType::UInt32), None);
    }

    #[test]
    fn coerce_integers_respect_range() {
        assert_eq!(Value::Int32(5).coerce(ValueType::UInt64), Some(Value::UInt64(5)));
        assert_eq!(Value::Int32(-1).coerce(ValueType::UInt32), None);
        assert_eq!(Value::UInt32(300).coerce(ValueType::Byte), None);
        assert_eq!(Value::Byte(7).coerce(ValueType::Int32), Some(Value::Int32(7)));
    }

    #[test]
    fn coerce_string_and_object_path() {
        let s = Value::String("/a/b".to_string());
        assert_eq!(
            s.coerce(ValueType::ObjectPath),
            Some(Value::ObjectPath("/a/b".to_string()))
        );
        assert_eq!(Value::String("nope".into()).coerce(ValueType::ObjectPath), None);
        assert_eq!(
            Value::ObjectPathArray(vec!["/x".into()]).coerce(ValueType::StringArray),
            Some(Value::StringArray(vec!["/x".into()]))
        );
    }

    #[test]
    fn coerce_unrelated_types_is_none() {
        assert_eq!(Value::Boolean(true).coerce(ValueType::String), None);
        assert_eq!(Value::String("1".into()).coerce(ValueType::Int32), None);
    }
}
