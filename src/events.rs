use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::user::UserId;

/// Events emitted after a successful catalog or circulation change
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum CirculationEvent {
    /// A user was registered
    UserRegistered {
        /// New user's id
        user_id: UserId,
        /// "Student" or "Faculty"
        role: String,
    },
    /// A new title entered the catalog
    BookCatalogued {
        /// ISBN of the title
        isbn: String,
        /// Copies registered
        copies: u32,
    },
    /// Copies were added to an existing title
    BookRestocked {
        /// ISBN of the title
        isbn: String,
        /// Copies added
        copies: u32,
        /// Copies owned afterwards
        total: u32,
    },
    /// A copy was issued to a user
    Issued {
        /// Borrower
        user_id: UserId,
        /// ISBN of the title
        isbn: String,
        /// Day of issue
        on: NaiveDate,
    },
    /// A copy came back
    Returned {
        /// Borrower
        user_id: UserId,
        /// ISBN of the title
        isbn: String,
        /// Day of return
        on: NaiveDate,
        /// Days the copy was out
        days_held: i64,
        /// Days past the loan period, zero when returned on time
        days_overdue: i64,
    },
}
