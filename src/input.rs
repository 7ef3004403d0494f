//! Parsing of free-form numeric input typed at the interactive menu.

use std::str::FromStr;

use crate::{
    error::{LibraryError, Result},
    user::UserId,
};

/// Parse a trimmed number, naming `what` in the error
///
/// # Errors
///
/// Returns `LibraryError::InvalidNumericInput` if `raw` is not a valid number.
pub fn parse_number<T: FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| LibraryError::InvalidNumericInput(format!("invalid {what}: {:?}", raw.trim())))
}

/// Parse a user id
///
/// # Errors
///
/// Returns `LibraryError::InvalidNumericInput` for non-numeric input.
pub fn parse_user_id(raw: &str) -> Result<UserId> {
    parse_number(raw, "user ID")
}

/// Parse a positive number of copies
///
/// # Errors
///
/// Returns `LibraryError::InvalidNumericInput` for non-numeric or zero input.
pub fn parse_copies(raw: &str) -> Result<u32> {
    match parse_number(raw, "number of copies")? {
        0 => Err(LibraryError::InvalidNumericInput(
            "number of copies must be a positive integer".to_string(),
        )),
        n => Ok(n),
    }
}
