use std::path::{Path, PathBuf};

/// Loan period used when none is configured
pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 14;

/// Default file name for the user snapshot
pub const DEFAULT_USERS_FILE: &str = "users.json";

/// Default file name for the book snapshot
pub const DEFAULT_BOOKS_FILE: &str = "books.json";

/// Rules applied to every loan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CirculationPolicy {
    /// Days a copy may be held before it counts as overdue
    pub loan_period_days: u32,
}

impl Default for CirculationPolicy {
    fn default() -> Self {
        Self { loan_period_days: DEFAULT_LOAN_PERIOD_DAYS }
    }
}

/// Where the catalog lives and how it circulates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Directory holding both snapshot files
    pub data_dir: PathBuf,
    /// User snapshot file name, relative to `data_dir`
    pub users_file: String,
    /// Book snapshot file name, relative to `data_dir`
    pub books_file: String,
    /// Loan rules
    pub policy: CirculationPolicy,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            users_file: DEFAULT_USERS_FILE.to_string(),
            books_file: DEFAULT_BOOKS_FILE.to_string(),
            policy: CirculationPolicy::default(),
        }
    }
}

impl LibraryConfig {
    /// Configuration rooted at `data_dir` with default file names
    #[must_use]
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self { data_dir: data_dir.as_ref().to_path_buf(), ..Self::default() }
    }

    /// Override the loan period
    #[must_use]
    pub fn with_loan_period(mut self, days: u32) -> Self {
        self.policy.loan_period_days = days;
        self
    }

    /// Full path of the user snapshot
    #[must_use]
    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join(&self.users_file)
    }

    /// Full path of the book snapshot
    #[must_use]
    pub fn books_path(&self) -> PathBuf {
        self.data_dir.join(&self.books_file)
    }
}
