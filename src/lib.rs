//! Library catalog and circulation tracker.
//!
//! This crate registers students, faculty and books, issues and returns
//! copies under per-role borrowing limits, and reports on search results,
//! availability and overdue loans. State is kept in memory and written to
//! two JSON files after every change.

pub mod book;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod input;
pub mod observers;
pub mod persistence;
pub mod report;
pub mod system;
pub mod user;

pub use book::Book;
pub use config::{CirculationPolicy, LibraryConfig};
pub use error::{LibraryError, Result};
pub use events::CirculationEvent;
pub use report::CatalogReport;
pub use system::Library;
pub use user::{Role, User, UserId};
