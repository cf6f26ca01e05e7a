//! Log sanitization utilities
//!
//! Keeps secret parameters (passwords, tokens) out of debug logs and
//! bounds the size of long values.

use crate::keyfile::escape_value;
use crate::types::KeyFlags;
use crate::value::Value;

/// Maximum number of characters to include in truncated log output.
const TRUNCATE_LIMIT: usize = 256;

/// MSRV-compatible replacement for `str::floor_char_boundary` (stable since 1.91.0).
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        s.len()
    } else {
        let mut i = index;
        while i > 0 && !s.is_char_boundary(i) {
            i -= 1;
        }
        i
    }
}

/// Truncate a string for safe logging.
///
/// Returns the original string if it's within the limit,
/// otherwise returns the first `TRUNCATE_LIMIT` characters with a suffix
/// indicating the total length.
pub fn truncate_for_log(s: &str) -> String {
    if s.len() <= TRUNCATE_LIMIT {
        s.to_string()
    } else {
        format!(
            "{}... [truncated, total {} bytes]",
            &s[..floor_char_boundary(s, TRUNCATE_LIMIT)],
            s.len()
        )
    }
}

/// Render an optional value for a debug log line.
///
/// Values written with [`KeyFlags::SECRET`] are masked; others are shown in
/// their keyfile form, truncated.
pub fn value_for_log(value: Option<&Value>, flags: KeyFlags) -> String {
    match value {
        None => "<unset>".to_string(),
        Some(_) if flags.contains(KeyFlags::SECRET) => "<secret>".to_string(),
        Some(v) => {
            let ty = v.value_type().map_or("?", |t| t.signature());
            format!("'{ty}' {}", truncate_for_log(&escape_value(v)))
        }
    }
}
