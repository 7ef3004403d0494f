//! JSON snapshots of the catalog and the storage backends that hold them.
//!
//! The on-disk layout keeps loans and returns as parallel arrays
//! (`borrowed_books`/`borrow_dates`, `history`/`return_dates`); in memory they
//! are single sequences of records.

use std::{
    cell::RefCell,
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    book::Book,
    config::LibraryConfig,
    error::{LibraryError, Result},
    user::{Loan, ReturnRecord, Role, User, UserId},
};

/// Serialized form of a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserRecord {
    /// User id
    pub id: UserId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// ISBNs currently held
    #[serde(default)]
    pub borrowed_books: Vec<String>,
    /// Issue dates, parallel to `borrowed_books`
    #[serde(default)]
    pub borrow_dates: Vec<NaiveDate>,
    /// ISBNs returned
    #[serde(default)]
    pub history: Vec<String>,
    /// Return dates, parallel to `history`
    #[serde(default)]
    pub return_dates: Vec<NaiveDate>,
}

/// Serialized form of a book
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BookRecord {
    /// Catalog key
    pub isbn: String,
    /// Title
    #[serde(default)]
    pub title: String,
    /// Author
    #[serde(default)]
    pub author: String,
    /// Copies owned
    pub total_count: u32,
    /// Copies on the shelf; all copies when absent
    #[serde(default)]
    pub available_count: Option<u32>,
    /// Holders of the copies that are out
    #[serde(default)]
    pub borrowed_by: Vec<UserId>,
}

/// Full state handed to and from a storage backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// All users
    pub users: Vec<UserRecord>,
    /// All books
    pub books: Vec<BookRecord>,
}

/// Backend that persists whole snapshots
pub trait Storage {
    /// Read the last saved snapshot, or an empty one if nothing was saved
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Load` if stored data exists but cannot be read.
    fn load(&self) -> Result<Snapshot>;

    /// Replace the stored snapshot
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Persistence` if the snapshot cannot be written.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

impl From<&User> for UserRecord {
    fn from(user: &User) -> Self {
        Self {
            id: user.id(),
            name: user.name().to_string(),
            borrowed_books: user.loans().iter().map(|loan| loan.isbn.clone()).collect(),
            borrow_dates: user.loans().iter().map(|loan| loan.borrowed_on).collect(),
            history: user.history().iter().map(|record| record.isbn.clone()).collect(),
            return_dates: user.history().iter().map(|record| record.returned_on).collect(),
        }
    }
}

impl From<&Book> for BookRecord {
    fn from(book: &Book) -> Self {
        Self {
            isbn: book.isbn().to_string(),
            title: book.title().to_string(),
            author: book.author().to_string(),
            total_count: book.total_count(),
            available_count: Some(book.available_count()),
            borrowed_by: book.borrowed_by().to_vec(),
        }
    }
}

/// Pair each ISBN with its date, filling gaps with `fallback`
fn zip_dated(
    user_id: UserId,
    field: &str,
    isbns: Vec<String>,
    dates: &[NaiveDate],
    fallback: NaiveDate,
) -> Vec<(String, NaiveDate)> {
    if isbns.len() != dates.len() {
        warn!(
            user_id,
            field,
            isbns = isbns.len(),
            dates = dates.len(),
            %fallback,
            "date list does not match ISBN list; missing dates defaulted, extras dropped"
        );
    }
    isbns
        .into_iter()
        .enumerate()
        .map(|(idx, isbn)| (isbn, dates.get(idx).copied().unwrap_or(fallback)))
        .collect()
}

impl UserRecord {
    /// Rebuild the in-memory user, decoding the role against `today`
    pub(crate) fn into_user(self, today: NaiveDate) -> User {
        let role = Role::classify(self.id, today.year()).unwrap_or_else(|e| {
            warn!(user_id = self.id, error = %e, "stored id has unexpected length; loading as faculty");
            Role::Faculty
        });

        let mut user = User::with_role(self.id, &self.name, role);
        for (isbn, borrowed_on) in
            zip_dated(self.id, "borrow_dates", self.borrowed_books, &self.borrow_dates, today)
        {
            user.push_loan(Loan { isbn, borrowed_on });
        }
        for (isbn, returned_on) in
            zip_dated(self.id, "return_dates", self.history, &self.return_dates, today)
        {
            user.push_history(ReturnRecord { isbn, returned_on });
        }
        user
    }
}

impl BookRecord {
    /// Rebuild the in-memory book
    pub(crate) fn into_book(self) -> Book {
        let available = self.available_count.unwrap_or(self.total_count);
        Book::from_parts(
            &self.isbn,
            &self.title,
            &self.author,
            self.total_count,
            available,
            self.borrowed_by,
        )
    }
}

/// Stores users and books as two pretty-printed JSON arrays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonFileStorage {
    /// Path of the user array
    users_path: PathBuf,
    /// Path of the book array
    books_path: PathBuf,
}

impl JsonFileStorage {
    /// Storage over two explicit file paths
    #[must_use]
    pub fn new(users_path: impl Into<PathBuf>, books_path: impl Into<PathBuf>) -> Self {
        Self { users_path: users_path.into(), books_path: books_path.into() }
    }

    /// Storage at the paths named by `config`
    #[must_use]
    pub fn from_config(config: &LibraryConfig) -> Self {
        Self::new(config.users_path(), config.books_path())
    }

    /// Path of the user array
    #[must_use]
    pub fn users_path(&self) -> &Path {
        &self.users_path
    }

    /// Path of the book array
    #[must_use]
    pub fn books_path(&self) -> &Path {
        &self.books_path
    }

    /// Read a JSON array, treating a missing file as empty
    fn read_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            debug!(path = %path.display(), "snapshot file missing; starting empty");
            return Ok(Vec::new());
        }

        debug!(path = %path.display(), "loading snapshot file");
        let mut file = File::open(path).map_err(|e| {
            LibraryError::Load(format!("Failed to open {}: {e}", path.display()))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            LibraryError::Load(format!("Failed to read {}: {e}", path.display()))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            LibraryError::Load(format!("Failed to parse JSON in {}: {e}", path.display()))
        })
    }

    /// Overwrite `path` with `items` as a JSON array
    fn write_array<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
        let serialized = serde_json::to_string_pretty(items)
            .map_err(|e| LibraryError::Persistence(e.to_string()))?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                LibraryError::Persistence(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        debug!(path = %path.display(), "saving snapshot file");
        let mut file = File::create(path).map_err(|e| {
            LibraryError::Persistence(format!("Failed to create {}: {e}", path.display()))
        })?;

        file.write_all(serialized.as_bytes()).map_err(|e| {
            LibraryError::Persistence(format!("Failed to write to {}: {e}", path.display()))
        })?;

        Ok(())
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            users: Self::read_array(&self.users_path)?,
            books: Self::read_array(&self.books_path)?,
        })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        Self::write_array(&self.users_path, &snapshot.users)?;
        Self::write_array(&self.books_path, &snapshot.books)
    }
}

/// Keeps the last snapshot in memory; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    /// Last saved snapshot
    slot: Rc<RefCell<Snapshot>>,
    /// Number of saves performed
    saves: Rc<RefCell<usize>>,
}

impl MemoryStorage {
    /// Empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the last saved snapshot
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.slot.borrow().clone()
    }

    /// How many times `save` has been called
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.borrow()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Snapshot> {
        Ok(self.snapshot())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.slot.borrow_mut() = snapshot.clone();
        let mut saves = self.saves.borrow_mut();
        *saves = saves.saturating_add(1);
        Ok(())
    }
}
