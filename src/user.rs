use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    error::{LibraryError, Result},
    identity::StudentProfile,
};

/// Numeric identifier of a library user
pub type UserId = u32;

/// Range of valid 8-digit student ids
const STUDENT_IDS: std::ops::RangeInclusive<UserId> = 10_000_000..=99_999_999;

/// Range of valid 3-digit faculty ids
const FACULTY_IDS: std::ops::RangeInclusive<UserId> = 100..=999;

/// The role a user borrows under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Student with attributes decoded from the id
    Student(StudentProfile),
    /// Faculty member
    Faculty,
}

impl Role {
    /// Concurrent loan limit for students
    pub const STUDENT_MAX_LOANS: usize = 3;
    /// Concurrent loan limit for faculty
    pub const FACULTY_MAX_LOANS: usize = 5;

    /// Determine the role from the number of digits in the id
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::InvalidIdFormat` unless the id has exactly
    /// 8 digits (student) or 3 digits (faculty).
    pub fn classify(id: UserId, current_year: i32) -> Result<Self> {
        if STUDENT_IDS.contains(&id) {
            Ok(Self::Student(StudentProfile::decode(id, current_year)))
        } else if FACULTY_IDS.contains(&id) {
            Ok(Self::Faculty)
        } else {
            Err(LibraryError::InvalidIdFormat(id))
        }
    }

    /// Maximum number of books held at once
    #[must_use]
    pub fn max_loans(&self) -> usize {
        match self {
            Self::Student(_) => Self::STUDENT_MAX_LOANS,
            Self::Faculty => Self::FACULTY_MAX_LOANS,
        }
    }

    /// Human-readable role name
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Student(_) => "Student",
            Self::Faculty => "Faculty",
        }
    }

    /// Decoded student attributes, if this is a student
    #[must_use]
    pub fn student_profile(&self) -> Option<&StudentProfile> {
        match self {
            Self::Student(profile) => Some(profile),
            Self::Faculty => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A copy currently held by a user
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Loan {
    /// ISBN of the borrowed title
    pub isbn: String,
    /// Day the copy was issued
    pub borrowed_on: NaiveDate,
}

/// A completed loan
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReturnRecord {
    /// ISBN of the returned title
    pub isbn: String,
    /// Day the copy came back
    pub returned_on: NaiveDate,
}

/// A registered borrower
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique user id
    id: UserId,
    /// Display name
    name: String,
    /// Role, fixed at registration
    role: Role,
    /// Outstanding loans in issue order
    loans: Vec<Loan>,
    /// Returned loans in return order
    history: Vec<ReturnRecord>,
}

impl User {
    /// Register a new user with no loans, deriving the role from the id.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::InvalidIdFormat` for ids that are neither
    /// 8 nor 3 digits long.
    pub fn new(id: UserId, name: &str, today: NaiveDate) -> Result<Self> {
        let role = Role::classify(id, today.year())?;
        Ok(Self::with_role(id, name, role))
    }

    /// Build a user with an explicit role and empty records
    pub(crate) fn with_role(id: UserId, name: &str, role: Role) -> Self {
        Self { id, name: name.to_string(), role, loans: Vec::new(), history: Vec::new() }
    }

    /// User id
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrowing role
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Outstanding loans
    #[must_use]
    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    /// Completed loans
    #[must_use]
    pub fn history(&self) -> &[ReturnRecord] {
        &self.history
    }

    /// Whether the user currently holds a copy of `isbn`
    #[must_use]
    pub fn holds(&self, isbn: &str) -> bool {
        self.loans.iter().any(|loan| loan.isbn == isbn)
    }

    /// Whether another loan would exceed the role's limit
    #[must_use]
    pub fn at_loan_limit(&self) -> bool {
        self.loans.len() >= self.role.max_loans()
    }

    /// Record a new loan
    pub(crate) fn push_loan(&mut self, loan: Loan) {
        self.loans.push(loan);
    }

    /// Remove and return the loan for `isbn`
    pub(crate) fn take_loan(&mut self, isbn: &str) -> Option<Loan> {
        let idx = self.loans.iter().position(|loan| loan.isbn == isbn)?;
        Some(self.loans.remove(idx))
    }

    /// Append a completed loan to the history
    pub(crate) fn push_history(&mut self, record: ReturnRecord) {
        self.history.push(record);
    }
}
