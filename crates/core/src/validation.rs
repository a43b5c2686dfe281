//! Input validation utilities.
//!
//! This module contains functions for validating values before they are used to name things
//! on disk.

use crate::error::{MigrationError, MigrationResult};

/// Validates that a patient code is safe to use as a file name.
///
/// Codes come straight from the legacy database and end up as `<code>.yaml` in the output
/// directory. This function applies guardrails against path traversal and odd file names:
/// - Rejects empty or whitespace-only codes
/// - Bounds the length
/// - Restricts characters to a conservative ASCII set and forbids a leading `.`
///
/// # Errors
///
/// Returns a `MigrationError::InvalidInput` if the code is not usable as a file name.
pub fn validate_code_safe_for_file_name(code: &str) -> MigrationResult<()> {
    const MAX_CODE_LEN: usize = 64;

    if code.trim().is_empty() {
        return Err(MigrationError::InvalidInput(
            "patient code cannot be empty".into(),
        ));
    }

    if code.len() > MAX_CODE_LEN {
        return Err(MigrationError::InvalidInput(format!(
            "patient code exceeds maximum length of {} characters",
            MAX_CODE_LEN
        )));
    }

    if code.starts_with('.') {
        return Err(MigrationError::InvalidInput(
            "patient code cannot start with '.'".into(),
        ));
    }

    let ok = code
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));

    if !ok {
        return Err(MigrationError::InvalidInput(format!(
            "patient code {code:?} contains invalid characters (only alphanumeric, '.', '-', '_' allowed)"
        )));
    }

    Ok(())
}
