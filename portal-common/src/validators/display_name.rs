//! Display name validation
//!
//! The display name travels from the uploader's `Name` header into the
//! downloader's `Content-Disposition` header, so it must not be able to
//! break a header line.

/// Maximum length for display names in bytes
pub const MAX_DISPLAY_NAME_LENGTH: usize = 255;

/// Validation error for display names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayNameError {
    /// Display name exceeds maximum length
    TooLong,
    /// Display name contains control characters (including CR and LF)
    ContainsControl,
}

/// Validate a display name
///
/// An empty name is allowed and treated as absent by the caller.
///
/// # Errors
///
/// Returns a `DisplayNameError` variant describing the validation failure.
pub fn validate_display_name(name: &str) -> Result<(), DisplayNameError> {
    if name.len() > MAX_DISPLAY_NAME_LENGTH {
        return Err(DisplayNameError::TooLong);
    }
    if name.chars().any(char::is_control) {
        return Err(DisplayNameError::ContainsControl);
    }
    Ok(())
}
