use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use library_circulation::{
    CatalogReport, Library, LibraryConfig, LibraryError, Result, UserId,
    clock::FixedClock,
    config::DEFAULT_LOAN_PERIOD_DAYS,
    input::{parse_copies, parse_user_id},
    persistence::JsonFileStorage,
    system::BookAddition,
};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the library circulation tracker
#[derive(Parser, Debug)]
#[command(name = "library", author, version, about, long_about = None)]
struct Cli {
    /// Directory holding users.json and books.json
    #[arg(long, global = true, default_value = ".")]
    data_dir: PathBuf,

    /// Days a book may be kept before it counts as overdue
    #[arg(long, global = true, default_value_t = DEFAULT_LOAN_PERIOD_DAYS)]
    loan_period_days: u32,

    /// Treat this date (YYYY-MM-DD) as today instead of reading the clock
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    /// Enable verbose output with per-operation logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Operation to perform
    #[command(subcommand)]
    command: Command,
}

/// Library operations
#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Register a student (8-digit id) or faculty member (3-digit id)
    AddUser {
        /// User id
        id: UserId,
        /// Full name
        name: String,
    },
    /// Register copies of a book, adding to an existing ISBN
    AddBook {
        /// ISBN
        isbn: String,
        /// Title
        title: String,
        /// Author
        author: String,
        /// Number of copies
        #[arg(long, default_value_t = 1)]
        copies: u32,
    },
    /// Issue a book to a user
    Issue {
        /// Borrower id
        user_id: UserId,
        /// ISBN
        isbn: String,
    },
    /// Return a book
    Return {
        /// Borrower id
        user_id: UserId,
        /// ISBN
        isbn: String,
    },
    /// Show a user's details and loans
    User {
        /// User id
        user_id: UserId,
    },
    /// Show a book's details and borrowers
    Book {
        /// ISBN
        isbn: String,
    },
    /// Search titles and authors
    Search {
        /// Text to look for, case-insensitive
        text: String,
    },
    /// List books with copies on the shelf
    Available,
    /// List every outstanding loan
    Issued,
    /// List loans held past the loan period
    Overdue,
    /// Run the interactive numbered menu
    Menu,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = LibraryConfig::in_dir(&cli.data_dir).with_loan_period(cli.loan_period_days);
    let mut library = match open_library(&config, cli.today) {
        Ok(library) => library,
        Err(e) => {
            eprintln!("{}", format!("Error: {e}").red());
            return ExitCode::FAILURE;
        }
    };

    if matches!(cli.command, Command::Menu) {
        return run_menu(&mut library);
    }

    match execute(&mut library, cli.command) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", format!("Error: {e}").red());
            ExitCode::FAILURE
        }
    }
}

/// Install the stderr log subscriber; `RUST_LOG` overrides the default level
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Load the library, pinning the clock when `today` is given
fn open_library(config: &LibraryConfig, today: Option<NaiveDate>) -> Result<Library> {
    match today {
        Some(day) => Library::load(
            Box::new(JsonFileStorage::from_config(config)),
            Box::new(FixedClock(day)),
            config.policy,
        ),
        None => Library::open(config),
    }
}

/// Run one operation and render its result
fn execute(library: &mut Library, command: Command) -> Result<String> {
    match command {
        Command::AddUser { id, name } => {
            let user = library.add_user(id, &name)?;
            let message = match user.role().student_profile() {
                Some(profile) => format!("Student added: {} ({profile})", user.name()),
                None => format!("Faculty added: {}", user.name()),
            };
            Ok(message.green().to_string())
        }
        Command::AddBook { isbn, title, author, copies } => {
            let message = match library.add_book(&isbn, &title, &author, copies)? {
                BookAddition::Created { copies } => {
                    format!("Book '{title}' added successfully with {copies} copies!")
                }
                BookAddition::Restocked { copies, total } => {
                    let title = library.book(&isbn).map_or(title.as_str(), |book| book.title());
                    format!("Updated book count for '{title}' - Added {copies} copies ({total} total)")
                }
            };
            Ok(message.green().to_string())
        }
        Command::Issue { user_id, isbn } => {
            let loan = library.issue_book(user_id, &isbn)?;
            let title = library.book(&loan.isbn).map_or("", |book| book.title());
            let name = library.user(user_id).map_or("", |user| user.name());
            Ok(format!("Book '{title}' issued to {name} on {}", loan.borrowed_on)
                .green()
                .to_string())
        }
        Command::Return { user_id, isbn } => {
            let receipt = library.return_book(user_id, &isbn)?;
            let name = library.user(user_id).map_or("", |user| user.name());
            let message = format!("Book '{}' returned by {name}", receipt.title);
            if receipt.days_overdue > 0 {
                Ok(format!("{message} ({} days overdue)", receipt.days_overdue)
                    .yellow()
                    .to_string())
            } else {
                Ok(message.green().to_string())
            }
        }
        Command::User { user_id } => {
            let user = library.user(user_id).ok_or(LibraryError::UserNotFound(user_id))?;
            Ok(CatalogReport::user_info(library, user))
        }
        Command::Book { isbn } => {
            let book = library.book(&isbn).ok_or_else(|| LibraryError::BookNotFound(isbn.clone()))?;
            Ok(CatalogReport::book_info(library, book))
        }
        Command::Search { text } => {
            let found = library.search(&text);
            Ok(format!(
                "--- Search Results ({} books found) ---\n{}",
                found.len(),
                CatalogReport::book_table(&found)
            ))
        }
        Command::Available => {
            let available = library.available_books();
            Ok(format!(
                "--- Available Books ({}) ---\n{}",
                available.len(),
                CatalogReport::book_table(&available)
            ))
        }
        Command::Issued => Ok(format!(
            "--- Currently Issued Books ---\n{}",
            CatalogReport::issued_table(&library.issued_books())
        )),
        Command::Overdue => Ok(format!(
            "--- Overdue Books (as of {}) ---\n{}",
            library.today(),
            CatalogReport::overdue_table(&library.overdue_loans())
        )),
        Command::Menu => Ok(String::new()),
    }
}

/// Print `label` and read one line; `None` at end of input
fn prompt(label: &str) -> Option<String> {
    print!("{label}");
    io::stdout().flush().ok()?;
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

/// Prompt for a new user's id and name
fn prompt_add_user() -> Option<Result<Command>> {
    let id = parse_user_id(&prompt("Enter user ID: ")?);
    let name = prompt("Enter name: ")?;
    Some(id.map(|id| Command::AddUser { id, name }))
}

/// Prompt for a book and its number of copies
fn prompt_add_book() -> Option<Result<Command>> {
    let isbn = prompt("Enter ISBN: ")?;
    let title = prompt("Enter title: ")?;
    let author = prompt("Enter author: ")?;
    let copies = parse_copies(&prompt("Enter number of copies: ")?);
    Some(copies.map(|copies| Command::AddBook { isbn, title, author, copies }))
}

/// Prompt for the user and ISBN of an issue or return
fn prompt_loan(issue: bool) -> Option<Result<Command>> {
    let user_id = parse_user_id(&prompt("Enter user ID: ")?);
    let isbn = prompt("Enter book ISBN: ")?;
    Some(user_id.map(|user_id| {
        if issue { Command::Issue { user_id, isbn } } else { Command::Return { user_id, isbn } }
    }))
}

/// Collect the arguments for a menu choice; `None` at end of input
fn menu_command(choice: &str) -> Option<Result<Command>> {
    match choice {
        "1" => prompt_add_user(),
        "2" => prompt_add_book(),
        "3" => prompt_loan(true),
        "4" => prompt_loan(false),
        "5" => prompt("Enter user ID: ")
            .map(|raw| parse_user_id(&raw).map(|user_id| Command::User { user_id })),
        "6" => prompt("Enter book ISBN: ").map(|isbn| Ok(Command::Book { isbn })),
        "7" => prompt("Enter title or author to search: ").map(|text| Ok(Command::Search { text })),
        "8" => Some(Ok(Command::Available)),
        "9" => Some(Ok(Command::Issued)),
        "10" => Some(Ok(Command::Overdue)),
        _ => Some(Err(LibraryError::InvalidNumericInput(format!("invalid choice: {choice:?}")))),
    }
}

/// Interactive loop over stdin until `0` or end of input
fn run_menu(library: &mut Library) -> ExitCode {
    loop {
        println!("\n{}", "=== Digital Library Management System ===".green().bold());
        println!("1. Add User");
        println!("2. Add Book");
        println!("3. Issue Book");
        println!("4. Return Book");
        println!("5. Display User Info");
        println!("6. Display Book Info");
        println!("7. Search Books");
        println!("8. List Available Books");
        println!("9. List Issued Books");
        println!("10. List Overdue Books");
        println!("0. Exit");

        let Some(choice) = prompt("\nEnter your choice: ") else {
            return ExitCode::SUCCESS;
        };
        if choice == "0" {
            println!("Thank you for using the Library Management System!");
            return ExitCode::SUCCESS;
        }

        let Some(command) = menu_command(&choice) else {
            return ExitCode::SUCCESS;
        };
        match command.and_then(|command| execute(library, command)) {
            Ok(output) => println!("{output}"),
            Err(e) => println!("{}", e.to_string().red()),
        }
    }
}
