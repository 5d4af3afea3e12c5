//! Transfer identifier validation
//!
//! Identifiers are opaque and caller-chosen; they only need to survive being
//! a single path segment and a log field.

/// Maximum length for transfer identifiers in bytes
pub const MAX_IDENTIFIER_LENGTH: usize = 256;

/// Validation error for transfer identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Identifier is empty
    Empty,
    /// Identifier exceeds maximum length
    TooLong,
    /// Identifier contains `/`, whitespace, or control characters
    InvalidCharacters,
}

/// Validate a transfer identifier
///
/// Checks:
/// - Not empty
/// - At most 256 bytes
/// - No `/`, whitespace, or control characters
///
/// # Errors
///
/// Returns an `IdentifierError` variant describing the validation failure.
pub fn validate_identifier(identifier: &str) -> Result<(), IdentifierError> {
    if identifier.is_empty() {
        return Err(IdentifierError::Empty);
    }
    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(IdentifierError::TooLong);
    }
    if identifier
        .chars()
        .any(|ch| ch == '/' || ch.is_whitespace() || ch.is_control())
    {
        return Err(IdentifierError::InvalidCharacters);
    }
    Ok(())
}
