//! Lossless text encoding of typed values for line-oriented key/value stores.
//!
//! The syntax follows the desktop-entry keyfile conventions:
//!
//! | Type | Example value | Escaped |
//! |------|---------------|---------|
//! | string | `" hi\n"` | `\shi\n` |
//! | boolean | `true` | `true` |
//! | integers, byte | `-42` | `-42` |
//! | object path | `/a/b` | `/a/b` |
//! | arrays | `["a;b", "c"]` | `a\;b;c;` |
//!
//! Leading spaces are written as `\s` because keyfile parsers strip them.
//! Array elements are each followed by `;`, and a literal `;` inside an
//! element is escaped.

use crate::error::{StorageError, StorageResult};
use crate::types::ValueType;
use crate::value::{Value, is_valid_object_path};

const LIST_SEPARATOR: char = ';';

/// Escape `value` so it can be stored as a single keyfile value.
///
/// [`Value::Untyped`] already holds keyfile text and is returned verbatim.
pub fn escape_value(value: &Value) -> String {
    match value {
        Value::String(s) | Value::ObjectPath(s) => escape_string(s, false),
        Value::Boolean(b) => (if *b { "true" } else { "false" }).to_string(),
        Value::Int32(n) => n.to_string(),
        Value::UInt32(n) => n.to_string(),
        Value::Int64(n) => n.to_string(),
        Value::UInt64(n) => n.to_string(),
        Value::Byte(n) => n.to_string(),
        Value::StringArray(items) | Value::ObjectPathArray(items) => {
            let mut out = String::new();
            for item in items {
                out.push_str(&escape_string(item, true));
                out.push(LIST_SEPARATOR);
            }
            out
        }
        Value::Untyped(text) => text.clone(),
    }
}

/// Parse keyfile text produced by [`escape_value`] back into a value of
/// type `value_type`.
pub fn unescape_value(escaped: &str, value_type: ValueType) -> StorageResult<Value> {
    match value_type {
        ValueType::String => Ok(Value::String(unescape_string(escaped, value_type)?)),
        ValueType::ObjectPath => {
            let path = unescape_string(escaped, value_type)?;
            check_object_path(&path, value_type)?;
            Ok(Value::ObjectPath(path))
        }
        ValueType::Boolean => match escaped.trim() {
            "true" | "1" => Ok(Value::Boolean(true)),
            "false" | "0" => Ok(Value::Boolean(false)),
            other => Err(StorageError::invalid_value(
                value_type,
                format!("{other:?} is not a boolean"),
            )),
        },
        ValueType::Int32 => parse_number(escaped, value_type).map(Value::Int32),
        ValueType::UInt32 => parse_number(escaped, value_type).map(Value::UInt32),
        ValueType::Int64 => parse_number(escaped, value_type).map(Value::Int64),
        ValueType::UInt64 => parse_number(escaped, value_type).map(Value::UInt64),
        ValueType::Byte => parse_number(escaped, value_type).map(Value::Byte),
        ValueType::StringArray => Ok(Value::StringArray(unescape_list(escaped, value_type)?)),
        ValueType::ObjectPathArray => {
            let paths = unescape_list(escaped, value_type)?;
            for path in &paths {
                check_object_path(path, value_type)?;
            }
            Ok(Value::ObjectPathArray(paths))
        }
    }
}

fn escape_string(s: &str, in_list: bool) -> String {
    let mut out = String::with_capacity(s.len());
    let mut leading = true;

    for c in s.chars() {
        if c != ' ' {
            leading = false;
        }
        match c {
            ' ' if leading => out.push_str("\\s"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            LIST_SEPARATOR if in_list => out.push_str("\\;"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_string(s: &str, value_type: ValueType) -> StorageResult<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(LIST_SEPARATOR) => out.push(LIST_SEPARATOR),
            Some(other) => {
                return Err(StorageError::invalid_value(
                    value_type,
                    format!("invalid escape sequence \\{other}"),
                ));
            }
            None => {
                return Err(StorageError::invalid_value(
                    value_type,
                    "escape character at end of value",
                ));
            }
        }
    }
    Ok(out)
}

fn unescape_list(s: &str, value_type: ValueType) -> StorageResult<Vec<String>> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            LIST_SEPARATOR => pieces.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    // Every element is terminated, so only a non-empty remainder is an element.
    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
        .iter()
        .map(|piece| unescape_string(piece, value_type))
        .collect()
}

fn parse_number<T: std::str::FromStr>(s: &str, value_type: ValueType) -> StorageResult<T>
where
    T::Err: std::fmt::Display,
{
    s.trim()
        .parse()
        .map_err(|e| StorageError::invalid_value(value_type, format!("{s:?}: {e}")))
}

fn check_object_path(path: &str, value_type: ValueType) -> StorageResult<()> {
    if is_valid_object_path(path) {
        Ok(())
    } else {
        Err(StorageError::invalid_value(
            value_type,
            format!("{path:?} is not a valid object path"),
        ))
    }
}
