//! Utility modules.

/// Log sanitization for attribute and parameter values.
pub mod log_sanitizer;
