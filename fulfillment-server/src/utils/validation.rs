//! Input validation helpers

use crate::utils::AppError;

/// Entity names: customer name, product name snapshot
pub const MAX_NAME_LEN: usize = 200;

/// Short identifiers: phone, postal code, tracking number
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Addresses
pub const MAX_ADDRESS_LEN: usize = 500;

/// URLs / image paths
pub const MAX_URL_LEN: usize = 2048;

// ── Validation helpers ──────────────────────────────────────────────

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::validation(format!(
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
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::validation(format!(
            "{field} is too long ({} chars, max {max_len})",
            v.len()
        )));
    }
    Ok(())
}

// ── GCash payout numbers ────────────────────────────────────────────

/// Philippine mobile number accepted for GCash payouts
///
/// `09` followed by nine digits, or `+639` followed by nine digits.
pub fn is_valid_gcash_number(phone: &str) -> bool {
    let rest = phone
        .strip_prefix("+639")
        .or_else(|| phone.strip_prefix("09"));
    match rest {
        Some(digits) => digits.len() == 9 && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}
