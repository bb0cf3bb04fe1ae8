//! Input validation helpers
//!
//! Centralized text length constants and validation functions for the
//! free-text fields that reach the engine (campaign names, shipping
//! snapshots, notes).

use shared::{SaleError, SaleResult};

// ── Text length limits ──────────────────────────────────────────────

/// Campaign and fabric names
pub const MAX_NAME_LEN: usize = 200;

/// Notes and descriptions
pub const MAX_NOTE_LEN: usize = 500;

/// Short identifiers: phone numbers and the like
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Shipping addresses
pub const MAX_ADDRESS_LEN: usize = 500;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> SaleResult<()> {
    if value.trim().is_empty() {
        return Err(SaleError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(SaleError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            value.len()
        )));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> SaleResult<()> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(SaleError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text() {
        assert!(validate_required_text("Linen flash", "name", MAX_NAME_LEN).is_ok());
        assert!(validate_required_text("  ", "name", MAX_NAME_LEN).is_err());
        assert!(validate_required_text(&"x".repeat(201), "name", MAX_NAME_LEN).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert!(validate_optional_text(&None, "note", MAX_NOTE_LEN).is_ok());
        assert!(validate_optional_text(&Some("ok".into()), "note", MAX_NOTE_LEN).is_ok());
        assert!(validate_optional_text(&Some("x".repeat(501)), "note", MAX_NOTE_LEN).is_err());
    }
}
