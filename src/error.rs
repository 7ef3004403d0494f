use thiserror::Error;

use crate::user::UserId;

/// Custom error type for library circulation operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    /// User ids must have 8 digits (student) or 3 digits (faculty)
    #[error(
        "Invalid ID format: {0}. Student IDs must be 8 digits, Faculty IDs must be 3 digits"
    )]
    InvalidIdFormat(UserId),
    /// A numeric argument was missing, malformed or not positive
    #[error("Invalid numeric input: {0}")]
    InvalidNumericInput(String),
    /// An ISBN was empty after trimming
    #[error("ISBN must not be empty")]
    EmptyIsbn,
    /// A user with this id is already registered
    #[error("User {0} already exists")]
    DuplicateUser(UserId),
    /// No user is registered under this id
    #[error("User not found: {0}")]
    UserNotFound(UserId),
    /// No book is catalogued under this ISBN
    #[error("Book not found: {0}")]
    BookNotFound(String),
    /// Every copy of the book is out
    #[error("Book not available: {0}")]
    BookUnavailable(String),
    /// The user already holds a copy of this title
    #[error("User {user_id} already has book {isbn}")]
    DuplicateHold { user_id: UserId, isbn: String },
    /// The user is at the role's concurrent loan limit
    #[error("Cannot issue book! {role} borrowing limit ({limit} books) reached")]
    BorrowLimitReached { role: &'static str, limit: usize },
    /// The user does not currently hold this title
    #[error("User {user_id} doesn't have book {isbn}")]
    NotCurrentlyBorrowed { user_id: UserId, isbn: String },
    /// Error occurred while saving state
    #[error("Persistence error: {0}")]
    Persistence(String),
    /// Error occurred while loading state
    #[error("Load error: {0}")]
    Load(String),
    /// Users and books disagree about an outstanding loan
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
