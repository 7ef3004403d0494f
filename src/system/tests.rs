use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use chrono::{Days, NaiveDate};
use pretty_assertions::assert_eq;

use crate::{
    clock::FixedClock,
    config::CirculationPolicy,
    error::LibraryError,
    events::CirculationEvent,
    identity::{AcademicYear, Branch, Division},
    observers::CirculationObserver,
    persistence::{BookRecord, MemoryStorage, Snapshot, Storage, UserRecord},
    system::{BookAddition, Library},
};

/// Student admitted 2022, Comps, division A
const STUDENT: u32 = 22_101_012;
/// Second student
const STUDENT_B: u32 = 23_211_044;
/// Faculty member
const FACULTY: u32 = 101;

/// Records every event it sees
#[derive(Debug, Clone, Default)]
struct RecordingObserver {
    /// Events in arrival order
    events: Rc<RefCell<Vec<CirculationEvent>>>,
}

impl CirculationObserver for RecordingObserver {
    fn on_event(&self, event: &CirculationEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Memory storage whose saves can be switched to fail
#[derive(Debug, Clone, Default)]
struct SwitchableStorage {
    /// Where successful saves land
    inner: MemoryStorage,
    /// When set, every save fails
    failing: Rc<Cell<bool>>,
}

impl Storage for SwitchableStorage {
    fn load(&self) -> crate::error::Result<Snapshot> {
        self.inner.load()
    }

    fn save(&self, snapshot: &Snapshot) -> crate::error::Result<()> {
        if self.failing.get() {
            return Err(LibraryError::Persistence("disk full".to_string()));
        }
        self.inner.save(snapshot)
    }
}

#[allow(clippy::unwrap_used)]
fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// First day used by most tests
fn start() -> NaiveDate {
    day(2025, 6, 1)
}

/// Reopen the library stored in `storage` as of `today`
#[allow(clippy::expect_used)]
fn reopen(storage: &MemoryStorage, today: NaiveDate) -> Library {
    Library::load(
        Box::new(storage.clone()),
        Box::new(FixedClock(today)),
        CirculationPolicy::default(),
    )
    .expect("memory storage always loads")
}

/// Library with two students, one faculty member and three titles
#[allow(clippy::expect_used)]
fn setup_test_library() -> (Library, MemoryStorage) {
    let storage = MemoryStorage::new();
    let mut library = reopen(&storage, start());

    library.add_user(STUDENT, "Asha").expect("student id is valid");
    library.add_user(STUDENT_B, "Ravi").expect("student id is valid");
    library.add_user(FACULTY, "Dr. Rao").expect("faculty id is valid");

    library.add_book("111", "Dune", "Frank Herbert", 2).expect("book is valid");
    library.add_book("222", "Foundation", "Isaac Asimov", 1).expect("book is valid");
    library.add_book("333", "Hyperion", "Dan Simmons", 5).expect("book is valid");

    (library, storage)
}

/// Every book's counts add up and every loan is cross-referenced
#[allow(clippy::arithmetic_side_effects)]
fn assert_consistent(library: &Library) {
    assert_eq!(library.check_invariants(), Ok(()));
    for book in library.books() {
        assert_eq!(
            book.available_count() as usize + book.borrowed_by().len(),
            book.total_count() as usize
        );
    }
}

#[test]
fn test_student_registration_decodes_identity() {
    let (library, _) = setup_test_library();
    let profile = library.user(STUDENT).and_then(|u| u.role().student_profile().copied());

    assert_eq!(profile.map(|p| p.year), Some(AcademicYear::BE));
    assert_eq!(profile.map(|p| p.branch), Some(Branch::Comps));
    assert_eq!(profile.map(|p| p.division), Some(Division::A));
    assert_eq!(library.user(FACULTY).map(|u| u.role().max_loans()), Some(5));
}

#[test]
fn test_invalid_and_duplicate_users() {
    let (mut library, _) = setup_test_library();

    assert_eq!(library.add_user(1234, "Nobody").err(), Some(LibraryError::InvalidIdFormat(1234)));
    assert_eq!(library.add_user(FACULTY, "Again").err(), Some(LibraryError::DuplicateUser(FACULTY)));
    assert_eq!(library.user(FACULTY).map(|u| u.name().to_string()), Some("Dr. Rao".to_string()));
}

#[test]
fn test_add_book_restocks_existing_isbn() {
    let (mut library, _) = setup_test_library();

    let added = library.add_book("111", "Other Title", "Other Author", 3);
    assert_eq!(added, Ok(BookAddition::Restocked { copies: 3, total: 5 }));

    let book = library.book("111");
    assert_eq!(book.map(|b| b.title()), Some("Dune"));
    assert_eq!(book.map(|b| b.author()), Some("Frank Herbert"));
    assert_eq!(book.map(|b| b.available_count()), Some(5));
    assert_consistent(&library);
}

#[test]
fn test_add_book_rejects_bad_input() {
    let (mut library, storage) = setup_test_library();
    let saves = storage.save_count();

    assert!(matches!(
        library.add_book("444", "Zero", "Nobody", 0),
        Err(LibraryError::InvalidNumericInput(_))
    ));
    assert_eq!(library.add_book("  ", "Blank", "Nobody", 1), Err(LibraryError::EmptyIsbn));
    assert!(library.book("444").is_none());
    assert_eq!(storage.save_count(), saves);
}

#[test]
fn test_issue_then_return_restores_counts() {
    let (mut library, _) = setup_test_library();

    let loan = library.issue_book(STUDENT, "111");
    assert_eq!(loan.as_ref().map(|l| l.borrowed_on), Ok(start()));
    assert_eq!(library.book("111").map(|b| b.available_count()), Some(1));
    assert_eq!(library.book("111").map(|b| b.borrowed_by().to_vec()), Some(vec![STUDENT]));
    assert_consistent(&library);

    let receipt = library.return_book(STUDENT, "111");
    assert_eq!(receipt.as_ref().map(|r| r.days_overdue), Ok(0));
    assert_eq!(library.book("111").map(|b| b.available_count()), Some(2));
    assert_eq!(library.book("111").map(|b| b.borrowed_by().is_empty()), Some(true));

    let user = library.user(STUDENT);
    assert_eq!(user.map(|u| u.loans().len()), Some(0));
    assert_eq!(user.map(|u| u.history().len()), Some(1));
    assert_eq!(user.and_then(|u| u.history().first()).map(|r| r.returned_on), Some(start()));
    assert_consistent(&library);
}

#[test]
fn test_reborrow_appends_history() {
    let (mut library, _) = setup_test_library();

    for _ in 0..2 {
        assert!(library.issue_book(FACULTY, "222").is_ok());
        assert!(library.return_book(FACULTY, "222").is_ok());
    }

    let history: Vec<String> = library
        .user(FACULTY)
        .map(|u| u.history().iter().map(|r| r.isbn.clone()).collect())
        .unwrap_or_default();
    assert_eq!(history, vec!["222".to_string(), "222".to_string()]);
    assert_consistent(&library);
}

#[test]
fn test_issue_precondition_order() {
    let (mut library, _) = setup_test_library();

    assert_eq!(library.issue_book(999, "nope"), Err(LibraryError::UserNotFound(999)));
    assert_eq!(
        library.issue_book(STUDENT, "nope"),
        Err(LibraryError::BookNotFound("nope".to_string()))
    );

    // Single copy already out to the same user: availability is checked first.
    assert!(library.issue_book(STUDENT, "222").is_ok());
    assert_eq!(
        library.issue_book(STUDENT, "222"),
        Err(LibraryError::BookUnavailable("222".to_string()))
    );
    assert_consistent(&library);
}

#[test]
fn test_duplicate_hold_rejected() {
    let (mut library, _) = setup_test_library();

    assert!(library.issue_book(STUDENT, "111").is_ok());
    assert_eq!(
        library.issue_book(STUDENT, "111"),
        Err(LibraryError::DuplicateHold { user_id: STUDENT, isbn: "111".to_string() })
    );
    assert_eq!(library.book("111").map(|b| b.available_count()), Some(1));
    assert_consistent(&library);
}

#[test]
fn test_last_copy_goes_to_second_user_then_unavailable() {
    let (mut library, _) = setup_test_library();

    assert!(library.issue_book(STUDENT, "111").is_ok());
    assert!(library.issue_book(STUDENT_B, "111").is_ok());
    assert_eq!(library.book("111").map(|b| b.available_count()), Some(0));
    assert_eq!(
        library.issue_book(FACULTY, "111"),
        Err(LibraryError::BookUnavailable("111".to_string()))
    );
    assert_consistent(&library);
}

#[test]
#[allow(clippy::expect_used)]
fn test_student_and_faculty_limits() {
    let (mut library, _) = setup_test_library();
    for isbn in ["a", "b", "c", "d", "e", "f"] {
        library.add_book(isbn, isbn, "Anon", 1).expect("book is valid");
    }

    for isbn in ["a", "b", "c"] {
        assert!(library.issue_book(STUDENT, isbn).is_ok());
    }
    assert_eq!(
        library.issue_book(STUDENT, "d"),
        Err(LibraryError::BorrowLimitReached { role: "Student", limit: 3 })
    );

    for isbn in ["d", "e", "f", "111", "222"] {
        assert!(library.issue_book(FACULTY, isbn).is_ok());
    }
    assert_eq!(
        library.issue_book(FACULTY, "333"),
        Err(LibraryError::BorrowLimitReached { role: "Faculty", limit: 5 })
    );

    assert_eq!(library.user(STUDENT).map(|u| u.loans().len()), Some(3));
    assert_eq!(library.user(FACULTY).map(|u| u.loans().len()), Some(5));
    assert_consistent(&library);
}

#[test]
fn test_return_requires_outstanding_loan() {
    let (mut library, _) = setup_test_library();

    assert_eq!(library.return_book(999, "111").err(), Some(LibraryError::UserNotFound(999)));
    assert_eq!(
        library.return_book(STUDENT, "nope").err(),
        Some(LibraryError::BookNotFound("nope".to_string()))
    );
    assert_eq!(
        library.return_book(STUDENT, "111").err(),
        Some(LibraryError::NotCurrentlyBorrowed { user_id: STUDENT, isbn: "111".to_string() })
    );
    assert_eq!(library.book("111").map(|b| b.available_count()), Some(2));
}

#[test]
fn test_failed_operations_do_not_persist() {
    let (mut library, storage) = setup_test_library();
    let before = storage.snapshot();
    let saves = storage.save_count();

    assert!(library.issue_book(999, "111").is_err());
    assert!(library.return_book(STUDENT, "111").is_err());

    assert_eq!(storage.save_count(), saves);
    assert_eq!(storage.snapshot(), before);
}

#[test]
fn test_failed_save_reverts_every_mutation() {
    let storage = SwitchableStorage::default();
    let mut library = Library::new(
        Box::new(storage.clone()),
        Box::new(FixedClock(start())),
        CirculationPolicy::default(),
    );
    assert!(library.add_user(STUDENT, "Asha").is_ok());
    assert!(library.add_user(FACULTY, "Dr. Rao").is_ok());
    assert!(library.add_book("111", "Dune", "Frank Herbert", 2).is_ok());
    assert!(library.issue_book(FACULTY, "111").is_ok());

    let observer = RecordingObserver::default();
    library.register_observer(Box::new(observer.clone()));
    let before = library.snapshot();
    storage.failing.set(true);

    let disk_full = Some(LibraryError::Persistence("disk full".to_string()));
    assert_eq!(library.add_user(STUDENT_B, "Ravi").err(), disk_full);
    assert_eq!(library.add_book("111", "Dune", "Frank Herbert", 3).err(), disk_full);
    assert_eq!(library.add_book("222", "Foundation", "Isaac Asimov", 1).err(), disk_full);
    assert_eq!(library.issue_book(STUDENT, "111").err(), disk_full);
    assert_eq!(library.return_book(FACULTY, "111").err(), disk_full);

    assert_eq!(library.snapshot(), before);
    assert!(library.user(STUDENT_B).is_none());
    assert!(library.book("222").is_none());
    assert_eq!(library.book("111").map(|b| b.total_count()), Some(2));
    assert_eq!(storage.inner.snapshot(), before);
    assert!(observer.events.borrow().is_empty());
    assert_consistent(&library);

    // The same calls succeed once saving works again.
    storage.failing.set(false);
    assert!(library.add_user(STUDENT_B, "Ravi").is_ok());
    assert!(library.issue_book(STUDENT, "111").is_ok());
    assert!(library.return_book(FACULTY, "111").is_ok());
    assert_eq!(storage.inner.snapshot(), library.snapshot());
    assert_eq!(observer.events.borrow().len(), 3);
    assert_consistent(&library);
}

#[test]
fn test_every_mutation_is_persisted() {
    let (mut library, storage) = setup_test_library();
    assert!(library.issue_book(STUDENT, "333").is_ok());

    assert_eq!(storage.snapshot(), library.snapshot());
    let reloaded = reopen(&storage, start());
    assert_eq!(reloaded.snapshot(), library.snapshot());
    assert_consistent(&reloaded);
}

#[test]
#[allow(clippy::expect_used)]
fn test_overdue_after_twenty_days() {
    let (mut library, storage) = setup_test_library();
    assert!(library.issue_book(STUDENT, "111").is_ok());
    assert!(library.issue_book(FACULTY, "333").is_ok());

    let later = start().checked_add_days(Days::new(20)).expect("date in range");
    let mut library = reopen(&storage, later);
    assert!(library.issue_book(STUDENT_B, "222").is_ok());

    let overdue = library.overdue_loans();
    let summary: Vec<(u32, &str, i64)> =
        overdue.iter().map(|o| (o.user_id, o.isbn.as_str(), o.days_overdue)).collect();
    assert_eq!(summary, vec![(FACULTY, "333", 6), (STUDENT, "111", 6)]);
    assert_eq!(overdue.first().and_then(|o| o.title.clone()), Some("Hyperion".to_string()));

    let receipt = library.return_book(STUDENT, "111").expect("loan is outstanding");
    assert_eq!(receipt.days_held, 20);
    assert_eq!(receipt.days_overdue, 6);
    assert_eq!(library.overdue_loans().len(), 1);
}

#[test]
#[allow(clippy::expect_used)]
fn test_loan_period_boundary() {
    let (mut library, storage) = setup_test_library();
    assert!(library.issue_book(STUDENT, "111").is_ok());

    let day_14 = start().checked_add_days(Days::new(14)).expect("date in range");
    assert!(reopen(&storage, day_14).overdue_loans().is_empty());

    let day_15 = start().checked_add_days(Days::new(15)).expect("date in range");
    let overdue = reopen(&storage, day_15).overdue_loans();
    assert_eq!(overdue.iter().map(|o| o.days_overdue).collect::<Vec<_>>(), vec![1]);
}

#[test]
fn test_queries() {
    let (mut library, _) = setup_test_library();
    assert!(library.issue_book(STUDENT, "222").is_ok());
    assert!(library.issue_book(FACULTY, "111").is_ok());

    let found: Vec<&str> = library.search("  ASIMOV ").iter().map(|b| b.isbn()).collect();
    assert_eq!(found, vec!["222"]);
    let found: Vec<&str> = library.search("on").iter().map(|b| b.isbn()).collect();
    assert_eq!(found, vec!["222", "333"]);
    assert!(library.search("tolkien").is_empty());

    let available: Vec<&str> = library.available_books().iter().map(|b| b.isbn()).collect();
    assert_eq!(available, vec!["111", "333"]);

    let issued: Vec<(u32, &str)> = library
        .issued_books()
        .iter()
        .map(|i| (i.user.id(), i.book.map_or("", |b| b.title())))
        .collect();
    assert_eq!(issued, vec![(FACULTY, "Dune"), (STUDENT, "Foundation")]);

    let borrowers = library.book_borrowers("111");
    assert_eq!(
        borrowers.map(|b| b.iter().map(|(id, user)| (*id, user.is_some())).collect::<Vec<_>>()),
        Ok(vec![(FACULTY, true)])
    );
}

#[test]
fn test_observers_see_successful_changes_only() {
    let (mut library, _) = setup_test_library();
    let observer = RecordingObserver::default();
    library.register_observer(Box::new(observer.clone()));

    assert!(library.issue_book(STUDENT, "111").is_ok());
    assert!(library.issue_book(STUDENT, "111").is_err());
    assert!(library.return_book(STUDENT, "111").is_ok());

    let events = observer.events.borrow();
    assert_eq!(
        *events,
        vec![
            CirculationEvent::Issued { user_id: STUDENT, isbn: "111".to_string(), on: start() },
            CirculationEvent::Returned {
                user_id: STUDENT,
                isbn: "111".to_string(),
                on: start(),
                days_held: 0,
                days_overdue: 0,
            },
        ]
    );
}

#[test]
fn test_inconsistent_storage_is_loaded_but_detected() {
    let storage = MemoryStorage::new();
    let snapshot = Snapshot {
        users: vec![UserRecord {
            id: FACULTY,
            name: "Dr. Rao".to_string(),
            borrowed_books: vec!["111".to_string()],
            borrow_dates: vec![start()],
            ..UserRecord::default()
        }],
        books: vec![BookRecord {
            isbn: "111".to_string(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            total_count: 1,
            available_count: None,
            borrowed_by: Vec::new(),
        }],
    };
    assert_eq!(storage.save(&snapshot), Ok(()));

    let library = reopen(&storage, start());
    assert_eq!(library.user(FACULTY).map(|u| u.loans().len()), Some(1));
    assert!(matches!(library.check_invariants(), Err(LibraryError::Invariant(_))));
}

#[test]
fn test_duplicate_stored_records_keep_the_later_one() {
    let storage = MemoryStorage::new();
    let user = |name: &str| UserRecord { id: FACULTY, name: name.to_string(), ..UserRecord::default() };
    let book = |title: &str| BookRecord {
        isbn: "111".to_string(),
        title: title.to_string(),
        total_count: 1,
        ..BookRecord::default()
    };
    let snapshot =
        Snapshot { users: vec![user("First"), user("Second")], books: vec![book("Old"), book("New")] };
    assert_eq!(storage.save(&snapshot), Ok(()));

    let library = reopen(&storage, start());
    assert_eq!(library.users().count(), 1);
    assert_eq!(library.user(FACULTY).map(|u| u.name().to_string()), Some("Second".to_string()));
    assert_eq!(library.books().count(), 1);
    assert_eq!(library.book("111").map(|b| b.title().to_string()), Some("New".to_string()));
}

#[test]
fn test_event_logger_attached_by_every_constructor() {
    let storage = MemoryStorage::new();
    let fresh = Library::new(
        Box::new(storage.clone()),
        Box::new(FixedClock(start())),
        CirculationPolicy::default(),
    );
    assert!(format!("{fresh:?}").contains("observers_count: 1"));
    assert!(format!("{:?}", reopen(&storage, start())).contains("observers_count: 1"));
}

#[test]
fn test_display_summary() {
    let (mut library, _) = setup_test_library();
    assert!(library.issue_book(STUDENT, "111").is_ok());
    assert_eq!(library.to_string(), "3 users, 3 titles, 8 copies (1 on loan)");
}
