use tracing::warn;

use crate::user::UserId;

/// A catalogued title and the state of its copies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    /// Unique catalog key
    isbn: String,
    /// Title as first registered
    title: String,
    /// Author as first registered
    author: String,
    /// Copies owned by the library
    total_count: u32,
    /// Copies on the shelf
    available_count: u32,
    /// Holders of the copies that are out, in issue order
    borrowed_by: Vec<UserId>,
}

impl Book {
    /// Create a title with every copy on the shelf
    #[must_use]
    pub fn new(isbn: &str, title: &str, author: &str, copies: u32) -> Self {
        Self::from_parts(isbn, title, author, copies, copies, Vec::new())
    }

    /// Rebuild a record from stored counts
    pub(crate) fn from_parts(
        isbn: &str,
        title: &str,
        author: &str,
        total_count: u32,
        available_count: u32,
        borrowed_by: Vec<UserId>,
    ) -> Self {
        Self {
            isbn: isbn.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            total_count,
            available_count,
            borrowed_by,
        }
    }

    /// Catalog key
    #[must_use]
    pub fn isbn(&self) -> &str {
        &self.isbn
    }

    /// Title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Author
    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Copies owned
    #[must_use]
    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    /// Copies on the shelf
    #[must_use]
    pub fn available_count(&self) -> u32 {
        self.available_count
    }

    /// Users holding a copy
    #[must_use]
    pub fn borrowed_by(&self) -> &[UserId] {
        &self.borrowed_by
    }

    /// Whether at least one copy can be issued
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available_count > 0
    }

    /// Case-insensitive substring match on title or author.
    ///
    /// `needle` must already be lowercase.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle) || self.author.to_lowercase().contains(needle)
    }

    /// Add copies to both the owned and shelved counts
    pub(crate) fn restock(&mut self, copies: u32) {
        self.total_count = self.total_count.saturating_add(copies);
        self.available_count = self.available_count.saturating_add(copies);
    }

    /// Take a copy off the shelf for `user_id`.
    ///
    /// Callers check availability first; the count never drops below zero.
    pub(crate) fn check_out(&mut self, user_id: UserId) {
        self.available_count = self.available_count.saturating_sub(1);
        self.borrowed_by.push(user_id);
    }

    /// Put `user_id`'s copy back on the shelf.
    ///
    /// A shelf that already holds every copy stays full and the mismatch is
    /// logged.
    pub(crate) fn check_in(&mut self, user_id: UserId) {
        if let Some(pos) = self.borrowed_by.iter().position(|id| *id == user_id) {
            self.borrowed_by.remove(pos);
        }
        if self.available_count < self.total_count {
            self.available_count = self.available_count.saturating_add(1);
        } else {
            warn!(
                isbn = %self.isbn,
                user_id,
                total = self.total_count,
                "copy returned to a full shelf; available count left at total"
            );
        }
    }
}
