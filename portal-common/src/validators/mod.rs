//! Input validation functions
//!
//! Validators for the two caller-supplied strings the relay accepts. The
//! server enforces them; clients can use them for pre-validation.

mod display_name;
mod identifier;

pub use display_name::{DisplayNameError, MAX_DISPLAY_NAME_LENGTH, validate_display_name};
pub use identifier::{IdentifierError, MAX_IDENTIFIER_LENGTH, validate_identifier};
