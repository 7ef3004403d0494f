use std::{collections::BTreeMap, fmt};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::{
    book::Book,
    clock::{Clock, SystemClock},
    config::{CirculationPolicy, LibraryConfig},
    error::{LibraryError, Result},
    events::CirculationEvent,
    identity::AcademicYear,
    observers::{CirculationObserver, EventLogger},
    persistence::{BookRecord, JsonFileStorage, Snapshot, Storage, UserRecord},
    user::{Loan, ReturnRecord, User, UserId},
};

/// Outcome of registering copies of a title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookAddition {
    /// The ISBN was new to the catalog
    Created {
        /// Copies registered
        copies: u32,
    },
    /// Copies were added to an existing title
    Restocked {
        /// Copies added
        copies: u32,
        /// Copies owned afterwards
        total: u32,
    },
}

/// Details of a completed return
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnReceipt {
    /// ISBN of the returned title
    pub isbn: String,
    /// Title of the returned book
    pub title: String,
    /// Day the copy was issued
    pub borrowed_on: NaiveDate,
    /// Day the copy came back
    pub returned_on: NaiveDate,
    /// Days the copy was out
    pub days_held: i64,
    /// Days past the loan period, zero when on time
    pub days_overdue: i64,
}

/// An outstanding loan joined with its borrower and book
#[derive(Debug, Clone, Copy)]
pub struct IssuedLoan<'a> {
    /// Borrower
    pub user: &'a User,
    /// The loan itself
    pub loan: &'a Loan,
    /// Catalog entry, if the ISBN is still catalogued
    pub book: Option<&'a Book>,
}

/// A loan held past the loan period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueLoan {
    /// Borrower id
    pub user_id: UserId,
    /// Borrower name
    pub user_name: String,
    /// ISBN of the held title
    pub isbn: String,
    /// Title, if the ISBN is still catalogued
    pub title: Option<String>,
    /// Day the copy was issued
    pub borrowed_on: NaiveDate,
    /// Days past the loan period
    pub days_overdue: i64,
}

/// Library catalog and circulation engine.
///
/// Owns every user and book. Each successful mutation writes a full snapshot
/// to storage before returning. A failed precondition or a failed save leaves
/// state untouched.
pub struct Library {
    /// Registered users by id
    users: BTreeMap<UserId, User>,
    /// Catalogued books by ISBN
    books: BTreeMap<String, Book>,
    /// Loan rules
    policy: CirculationPolicy,
    /// Snapshot backend
    storage: Box<dyn Storage>,
    /// Source of "today"
    clock: Box<dyn Clock>,
    /// Registered event observers
    observers: Vec<Box<dyn CirculationObserver>>,
}

// Manual implementation of Debug for Library
impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("users", &self.users)
            .field("books", &self.books)
            .field("policy", &self.policy)
            .field("today", &self.clock.today())
            .field("observers_count", &self.observers.len())
            .finish_non_exhaustive()
    }
}

/// Entries as they stood before a mutation, put back if the save fails.
///
/// `None` marks an entry that did not exist.
#[derive(Debug, Default)]
struct Rollback {
    /// Previous users by id
    users: Vec<(UserId, Option<User>)>,
    /// Previous books by ISBN
    books: Vec<(String, Option<Book>)>,
}

impl Rollback {
    /// Remember the current state of `id`
    #[must_use]
    fn user(mut self, id: UserId, previous: Option<&User>) -> Self {
        self.users.push((id, previous.cloned()));
        self
    }

    /// Remember the current state of `isbn`
    #[must_use]
    fn book(mut self, isbn: &str, previous: Option<&Book>) -> Self {
        self.books.push((isbn.to_string(), previous.cloned()));
        self
    }
}

/// Whole days from `from` to `to`
fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

impl Library {
    /// Create an empty library over the given storage and clock.
    ///
    /// The standard `EventLogger` is attached as the first observer.
    #[must_use]
    pub fn new(storage: Box<dyn Storage>, clock: Box<dyn Clock>, policy: CirculationPolicy) -> Self {
        Self {
            users: BTreeMap::new(),
            books: BTreeMap::new(),
            policy,
            storage,
            clock,
            observers: vec![Box::new(EventLogger)],
        }
    }

    /// Load the library from storage.
    ///
    /// A later record with the same user id or ISBN replaces the earlier one
    /// and is reported through a warning.
    ///
    /// Stored data that breaks the catalog invariants is kept as-is and
    /// reported through a warning.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Load` if the storage cannot be read.
    pub fn load(
        storage: Box<dyn Storage>,
        clock: Box<dyn Clock>,
        policy: CirculationPolicy,
    ) -> Result<Self> {
        let snapshot = storage.load()?;
        let today = clock.today();

        let mut library = Self::new(storage, clock, policy);
        for record in snapshot.users {
            let user = record.into_user(today);
            if let Some(replaced) = library.users.insert(user.id(), user) {
                warn!(
                    user_id = replaced.id(),
                    dropped_loans = replaced.loans().len(),
                    "duplicate user record; keeping the later one"
                );
            }
        }
        for record in snapshot.books {
            let book = record.into_book();
            if let Some(replaced) = library.books.insert(book.isbn().to_string(), book) {
                warn!(
                    isbn = replaced.isbn(),
                    dropped_borrowers = replaced.borrowed_by().len(),
                    "duplicate book record; keeping the later one"
                );
            }
        }

        if let Err(e) = library.check_invariants() {
            warn!(error = %e, "loaded catalog is inconsistent");
        }
        info!(users = library.users.len(), books = library.books.len(), "library loaded");

        Ok(library)
    }

    /// Load the JSON files named by `config`, using the system clock
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Load` if either file exists but cannot be parsed.
    pub fn open(config: &LibraryConfig) -> Result<Self> {
        Self::load(
            Box::new(JsonFileStorage::from_config(config)),
            Box::new(SystemClock),
            config.policy,
        )
    }

    /// Register an observer to be notified of circulation events
    pub fn register_observer(&mut self, observer: Box<dyn CirculationObserver>) {
        self.observers.push(observer);
    }

    /// Today's date according to the configured clock
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Loan rules in force
    #[must_use]
    pub fn policy(&self) -> CirculationPolicy {
        self.policy
    }

    /// Register a user; 8-digit ids are students, 3-digit ids faculty
    ///
    /// # Errors
    ///
    /// - `LibraryError::InvalidIdFormat` for any other id length
    /// - `LibraryError::DuplicateUser` if the id is taken
    /// - `LibraryError::Persistence` if the snapshot cannot be saved
    pub fn add_user(&mut self, id: UserId, name: &str) -> Result<&User> {
        let user = User::new(id, name.trim(), self.clock.today())?;
        if self.users.contains_key(&id) {
            return Err(LibraryError::DuplicateUser(id));
        }

        if let Some(profile) = user.role().student_profile()
            && profile.year == AcademicYear::NotYetAdmitted
        {
            warn!(
                user_id = id,
                admission_year = profile.admission_year,
                "admission year is in the future"
            );
        }

        let event = CirculationEvent::UserRegistered { user_id: id, role: user.role().to_string() };
        self.users.insert(id, user);
        self.commit(Rollback::default().user(id, None))?;
        self.notify(&event);

        self.users.get(&id).ok_or(LibraryError::UserNotFound(id))
    }

    /// Register `copies` copies of a title.
    ///
    /// An existing ISBN gains the copies; its title and author are kept.
    ///
    /// # Errors
    ///
    /// - `LibraryError::EmptyIsbn` for a blank ISBN
    /// - `LibraryError::InvalidNumericInput` if `copies` is zero or the total
    ///   would overflow
    /// - `LibraryError::Persistence` if the snapshot cannot be saved
    pub fn add_book(
        &mut self,
        isbn: &str,
        title: &str,
        author: &str,
        copies: u32,
    ) -> Result<BookAddition> {
        let isbn = isbn.trim();
        if isbn.is_empty() {
            return Err(LibraryError::EmptyIsbn);
        }
        if copies == 0 {
            return Err(LibraryError::InvalidNumericInput(
                "number of copies must be a positive integer".to_string(),
            ));
        }

        let rollback = Rollback::default().book(isbn, self.books.get(isbn));
        let (addition, event) = if let Some(book) = self.books.get_mut(isbn) {
            let total = book.total_count().checked_add(copies).ok_or_else(|| {
                LibraryError::InvalidNumericInput(format!("too many copies of {isbn}"))
            })?;
            book.restock(copies);
            (
                BookAddition::Restocked { copies, total },
                CirculationEvent::BookRestocked { isbn: isbn.to_string(), copies, total },
            )
        } else {
            self.books.insert(isbn.to_string(), Book::new(isbn, title.trim(), author.trim(), copies));
            (
                BookAddition::Created { copies },
                CirculationEvent::BookCatalogued { isbn: isbn.to_string(), copies },
            )
        };

        self.commit(rollback)?;
        self.notify(&event);
        Ok(addition)
    }

    /// Issue a copy of `isbn` to `user_id`.
    ///
    /// Preconditions are checked in order and the first failure is returned.
    ///
    /// # Errors
    ///
    /// - `LibraryError::UserNotFound`
    /// - `LibraryError::BookNotFound`
    /// - `LibraryError::BookUnavailable` when no copy is on the shelf
    /// - `LibraryError::DuplicateHold` when the user already holds the title
    /// - `LibraryError::BorrowLimitReached` at the role's loan limit
    /// - `LibraryError::Persistence` if the snapshot cannot be saved
    pub fn issue_book(&mut self, user_id: UserId, isbn: &str) -> Result<Loan> {
        let isbn = isbn.trim();
        let today = self.clock.today();

        let user = self.users.get_mut(&user_id).ok_or(LibraryError::UserNotFound(user_id))?;
        let book =
            self.books.get_mut(isbn).ok_or_else(|| LibraryError::BookNotFound(isbn.to_string()))?;

        if !book.is_available() {
            return Err(LibraryError::BookUnavailable(isbn.to_string()));
        }
        if user.holds(isbn) {
            return Err(LibraryError::DuplicateHold { user_id, isbn: isbn.to_string() });
        }
        if user.at_loan_limit() {
            return Err(LibraryError::BorrowLimitReached {
                role: user.role().label(),
                limit: user.role().max_loans(),
            });
        }

        let rollback = Rollback::default().user(user_id, Some(&*user)).book(isbn, Some(&*book));
        let loan = Loan { isbn: isbn.to_string(), borrowed_on: today };
        book.check_out(user_id);
        user.push_loan(loan.clone());

        self.commit(rollback)?;
        self.notify(&CirculationEvent::Issued { user_id, isbn: isbn.to_string(), on: today });
        Ok(loan)
    }

    /// Take back `user_id`'s copy of `isbn`
    ///
    /// # Errors
    ///
    /// - `LibraryError::UserNotFound`
    /// - `LibraryError::BookNotFound`
    /// - `LibraryError::NotCurrentlyBorrowed` when the user holds no copy
    /// - `LibraryError::Persistence` if the snapshot cannot be saved
    pub fn return_book(&mut self, user_id: UserId, isbn: &str) -> Result<ReturnReceipt> {
        let isbn = isbn.trim();
        let today = self.clock.today();

        let user = self.users.get_mut(&user_id).ok_or(LibraryError::UserNotFound(user_id))?;
        let book =
            self.books.get_mut(isbn).ok_or_else(|| LibraryError::BookNotFound(isbn.to_string()))?;

        let rollback = Rollback::default().user(user_id, Some(&*user)).book(isbn, Some(&*book));
        let loan = user.take_loan(isbn).ok_or_else(|| LibraryError::NotCurrentlyBorrowed {
            user_id,
            isbn: isbn.to_string(),
        })?;

        book.check_in(user_id);
        user.push_history(ReturnRecord { isbn: isbn.to_string(), returned_on: today });
        let title = book.title().to_string();

        let days_held = days_between(loan.borrowed_on, today);
        let receipt = ReturnReceipt {
            isbn: isbn.to_string(),
            title,
            borrowed_on: loan.borrowed_on,
            returned_on: today,
            days_held,
            days_overdue: self.overdue_by(days_held).unwrap_or(0),
        };

        self.commit(rollback)?;
        self.notify(&CirculationEvent::Returned {
            user_id,
            isbn: receipt.isbn.clone(),
            on: today,
            days_held,
            days_overdue: receipt.days_overdue,
        });
        Ok(receipt)
    }

    /// Look up a user
    #[must_use]
    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// Look up a book
    #[must_use]
    pub fn book(&self, isbn: &str) -> Option<&Book> {
        self.books.get(isbn.trim())
    }

    /// All users in id order
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// All books in ISBN order
    pub fn books(&self) -> impl Iterator<Item = &Book> {
        self.books.values()
    }

    /// Holders of `isbn`'s outstanding copies, in issue order.
    ///
    /// Ids no longer registered are returned with `None`.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::BookNotFound` if the ISBN is not catalogued.
    pub fn book_borrowers(&self, isbn: &str) -> Result<Vec<(UserId, Option<&User>)>> {
        let book = self.book(isbn).ok_or_else(|| LibraryError::BookNotFound(isbn.to_string()))?;
        Ok(book.borrowed_by().iter().map(|id| (*id, self.users.get(id))).collect())
    }

    /// Books whose title or author contains `text`, ignoring case
    #[must_use]
    pub fn search(&self, text: &str) -> Vec<&Book> {
        let needle = text.trim().to_lowercase();
        self.books.values().filter(|book| book.matches(&needle)).collect()
    }

    /// Books with at least one copy on the shelf
    #[must_use]
    pub fn available_books(&self) -> Vec<&Book> {
        self.books.values().filter(|book| book.is_available()).collect()
    }

    /// Every outstanding loan, grouped by user
    #[must_use]
    pub fn issued_books(&self) -> Vec<IssuedLoan<'_>> {
        self.users
            .values()
            .flat_map(|user| {
                user.loans().iter().map(move |loan| IssuedLoan {
                    user,
                    loan,
                    book: self.books.get(&loan.isbn),
                })
            })
            .collect()
    }

    /// Outstanding loans held longer than the loan period
    #[must_use]
    pub fn overdue_loans(&self) -> Vec<OverdueLoan> {
        let today = self.clock.today();
        self.issued_books()
            .into_iter()
            .filter_map(|issued| {
                let days_overdue = self.overdue_by(days_between(issued.loan.borrowed_on, today))?;
                Some(OverdueLoan {
                    user_id: issued.user.id(),
                    user_name: issued.user.name().to_string(),
                    isbn: issued.loan.isbn.clone(),
                    title: issued.book.map(|book| book.title().to_string()),
                    borrowed_on: issued.loan.borrowed_on,
                    days_overdue,
                })
            })
            .collect()
    }

    /// Days past the loan period, if any
    fn overdue_by(&self, days_held: i64) -> Option<i64> {
        let overdue = days_held.saturating_sub(i64::from(self.policy.loan_period_days));
        (overdue > 0).then_some(overdue)
    }

    /// Verify counts and the user/book cross references.
    ///
    /// # Errors
    ///
    /// Returns `LibraryError::Invariant` describing the first violation found.
    pub fn check_invariants(&self) -> Result<()> {
        let violation = |msg: String| Err(LibraryError::Invariant(msg));

        for book in self.books.values() {
            let isbn = book.isbn();
            if book.total_count() == 0 {
                return violation(format!("book {isbn} owns no copies"));
            }
            let Some(out) = book.total_count().checked_sub(book.available_count()) else {
                return violation(format!(
                    "book {isbn} has {} available of {} total",
                    book.available_count(),
                    book.total_count()
                ));
            };
            if usize::try_from(out).ok() != Some(book.borrowed_by().len()) {
                return violation(format!(
                    "book {isbn} has {out} copies out but {} borrowers",
                    book.borrowed_by().len()
                ));
            }
            for id in book.borrowed_by() {
                if !self.users.get(id).is_some_and(|user| user.holds(isbn)) {
                    return violation(format!("book {isbn} lists {id} who holds no copy"));
                }
            }
        }

        for user in self.users.values() {
            let id = user.id();
            for loan in user.loans() {
                let isbn = &loan.isbn;
                let held = user.loans().iter().filter(|other| other.isbn == *isbn).count();
                if held != 1 {
                    return violation(format!("user {id} holds {held} copies of {isbn}"));
                }
                let Some(book) = self.books.get(isbn) else {
                    return violation(format!("user {id} holds uncatalogued {isbn}"));
                };
                let listed = book.borrowed_by().iter().filter(|other| **other == id).count();
                if listed != 1 {
                    return violation(format!("book {isbn} lists user {id} {listed} times"));
                }
            }
        }

        Ok(())
    }

    /// Full copy of the current state in storage form
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            users: self.users.values().map(UserRecord::from).collect(),
            books: self.books.values().map(BookRecord::from).collect(),
        }
    }

    /// Write the full snapshot to storage
    fn persist(&self) -> Result<()> {
        self.storage.save(&self.snapshot())
    }

    /// Save the mutated state, restoring the `rollback` entries if the save fails
    fn commit(&mut self, rollback: Rollback) -> Result<()> {
        let Err(e) = self.persist() else {
            return Ok(());
        };

        warn!(error = %e, "save failed; reverting in-memory change");
        for (id, previous) in rollback.users {
            match previous {
                Some(user) => self.users.insert(id, user),
                None => self.users.remove(&id),
            };
        }
        for (isbn, previous) in rollback.books {
            match previous {
                Some(book) => self.books.insert(isbn, book),
                None => self.books.remove(&isbn),
            };
        }
        Err(e)
    }

    /// Notify every observer of `event`
    fn notify(&self, event: &CirculationEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

// Implementing display for nicer output
impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let copies: u64 = self.books.values().map(|b| u64::from(b.total_count())).sum();
        let out: usize = self.users.values().map(|u| u.loans().len()).sum();
        write!(
            f,
            "{} users, {} titles, {copies} copies ({out} on loan)",
            self.users.len(),
            self.books.len()
        )
    }
}

// Include tests module
#[cfg(test)]
mod tests;
