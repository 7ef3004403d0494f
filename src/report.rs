use crate::{
    book::Book,
    system::{IssuedLoan, Library, OverdueLoan},
    user::User,
};

/// Plain-text rendering of catalog queries
#[derive(Debug)]
pub struct CatalogReport;

impl CatalogReport {
    /// Describe a user, their role and what they hold
    #[must_use]
    pub fn user_info(library: &Library, user: &User) -> String {
        let role = user.role();
        let mut out = String::from("--- User Information ---\n");
        out.push_str(&format!("ID: {}\n", user.id()));
        out.push_str(&format!("Name: {}\n", user.name()));
        out.push_str(&format!("Type: {role}\n"));

        if let Some(profile) = role.student_profile() {
            out.push_str(&format!("Year: {}\n", profile.year));
            out.push_str(&format!("Branch: {}\n", profile.branch));
            out.push_str(&format!("Division: {}\n", profile.division));
        }

        out.push_str(&format!("Borrowing limit: {} books\n", role.max_loans()));
        out.push_str(&format!(
            "Currently borrowed books: {}/{}\n",
            user.loans().len(),
            role.max_loans()
        ));
        for loan in user.loans() {
            match library.book(&loan.isbn) {
                Some(book) => {
                    out.push_str(&format!("  - {} (since {})\n", book.title(), loan.borrowed_on));
                }
                None => {
                    out.push_str(&format!(
                        "  - Book with ISBN {} (Book details not found)\n",
                        loan.isbn
                    ));
                }
            }
        }

        if !user.history().is_empty() {
            out.push_str(&format!("Returned books: {}\n", user.history().len()));
            for record in user.history() {
                out.push_str(&format!("  - {} on {}\n", record.isbn, record.returned_on));
            }
        }
        out
    }

    /// Describe a book and who holds its copies
    #[must_use]
    pub fn book_info(library: &Library, book: &Book) -> String {
        let mut out = String::from("--- Book Information ---\n");
        out.push_str(&format!("ISBN: {}\n", book.isbn()));
        out.push_str(&format!("Title: {}\n", book.title()));
        out.push_str(&format!("Author: {}\n", book.author()));
        out.push_str(&format!("Total copies: {}\n", book.total_count()));
        out.push_str(&format!("Available copies: {}\n", book.available_count()));
        out.push_str(&format!("Currently borrowed by {} users\n", book.borrowed_by().len()));

        if let Ok(borrowers) = library.book_borrowers(book.isbn())
            && !borrowers.is_empty()
        {
            out.push_str("Borrowed by:\n");
            for (id, user) in borrowers {
                let name = user.map_or("(unknown user)", User::name);
                out.push_str(&format!("  - {name} (ID: {id})\n"));
            }
        }
        out
    }

    /// Markdown table of books with their shelf counts
    #[must_use]
    pub fn book_table(books: &[&Book]) -> String {
        if books.is_empty() {
            return "No books found!".to_string();
        }

        let mut table = String::from("| ISBN | Title | Author | Available |\n");
        table.push_str("|------|-------|--------|-----------|\n");
        for book in books {
            table.push_str(&format!(
                "| {} | {} | {} | {}/{} |\n",
                book.isbn(),
                book.title(),
                book.author(),
                book.available_count(),
                book.total_count()
            ));
        }
        table
    }

    /// Markdown table of outstanding loans
    #[must_use]
    pub fn issued_table(issued: &[IssuedLoan<'_>]) -> String {
        if issued.is_empty() {
            return "No books are currently issued!".to_string();
        }

        let mut table = String::from("| Book | Author | Borrowed by | Since |\n");
        table.push_str("|------|--------|-------------|-------|\n");
        for entry in issued {
            let (title, author) = entry
                .book
                .map_or((entry.loan.isbn.as_str(), "(book details not found)"), |book| {
                    (book.title(), book.author())
                });
            table.push_str(&format!(
                "| {title} | {author} | {} (ID: {}) | {} |\n",
                entry.user.name(),
                entry.user.id(),
                entry.loan.borrowed_on
            ));
        }
        table
    }

    /// Markdown table of overdue loans
    #[must_use]
    pub fn overdue_table(overdue: &[OverdueLoan]) -> String {
        if overdue.is_empty() {
            return "No overdue books!".to_string();
        }

        let mut table = String::from("| User | Book | Borrowed | Days overdue |\n");
        table.push_str("|------|------|----------|--------------|\n");
        for loan in overdue {
            table.push_str(&format!(
                "| {} (ID: {}) | {} | {} | {} |\n",
                loan.user_name,
                loan.user_id,
                loan.title.as_deref().unwrap_or(&loan.isbn),
                loan.borrowed_on,
                loan.days_overdue
            ));
        }
        table
    }
}
