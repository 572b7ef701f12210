//! Book request matching and fulfillment.
//!
//! Requests are reconciled against the catalog in two places: once at
//! submission (a request for a book already on the shelf is stored
//! fulfilled, never visibly open) and opportunistically whenever a book's
//! availability changes. Matching runs on the normalized forms from
//! [`crate::normalize`]; an ISBN match takes absolute priority over
//! title/author.

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        book::Book,
        request::{BookRequest, RequestStatus},
    },
    normalize::{self, RequestKey},
    repository::{requests::NewBookRequest, Repository},
    services::email::Notifier,
};

/// Is this normalized ISBN one of the book's ISBNs?
fn isbn_matches(book: &Book, normalized_isbn: &str) -> bool {
    book.normalized_isbns().iter().any(|i| i == normalized_isbn)
}

/// Does the book carry exactly this normalized (title, author) pair?
fn title_author_matches(book: &Book, title: &str, author: &str) -> bool {
    normalize::normalize_text(&book.title) == title
        && book
            .author
            .as_deref()
            .map(normalize::normalize_text)
            .is_some_and(|a| a == author)
}

/// Auto-fulfill predicate: the request matches when its normalized ISBN is
/// in the book's ISBN set, or its normalized (title, author) pair equals
/// the book's.
fn request_matches_book(request: &BookRequest, book: &Book) -> bool {
    if let Some(isbn) = &request.normalized_isbn {
        if isbn_matches(book, isbn) {
            return true;
        }
    }
    if let (Some(title), Some(author)) = (&request.normalized_title, &request.normalized_author) {
        return title_author_matches(book, title, author);
    }
    false
}

/// First available book (by id) satisfying the derived key. ISBN presence
/// disables title/author matching entirely.
fn find_match_for_key<'a>(key: &RequestKey, books: &'a [Book]) -> Option<&'a Book> {
    if let Some(isbn) = &key.normalized_isbn {
        return books.iter().find(|b| isbn_matches(b, isbn));
    }
    if let (Some(title), Some(author)) = (&key.normalized_title, &key.normalized_author) {
        return books.iter().find(|b| title_author_matches(b, title, author));
    }
    None
}

#[derive(Clone)]
pub struct RequestsService {
    repository: Repository,
    notifier: Arc<dyn Notifier>,
}

impl RequestsService {
    pub fn new(repository: Repository, notifier: Arc<dyn Notifier>) -> Self {
        Self { repository, notifier }
    }

    /// Get a request by id
    pub async fn get(&self, request_id: i32) -> AppResult<BookRequest> {
        self.repository.requests.get_by_id(request_id).await
    }

    /// All OPEN requests, oldest first
    pub async fn list_open(&self) -> AppResult<Vec<BookRequest>> {
        self.repository.requests.list_open().await
    }

    /// Requests submitted by a user
    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<BookRequest>> {
        self.repository.requests.list_for_user(user_id).await
    }

    /// Submit a book request.
    ///
    /// If an available book already satisfies it, the request is inserted
    /// directly in FULFILLED_AUTO so it never shows up open for a book
    /// that was on the shelf all along.
    pub async fn create_request(
        &self,
        user_id: i32,
        isbn: Option<&str>,
        title: Option<&str>,
        author: Option<&str>,
    ) -> AppResult<BookRequest> {
        let key = normalize::create_request_key(isbn, title, author)?;

        let settings = self.repository.settings.get().await?;
        let user = self.repository.users.get_by_id(user_id).await?;
        if user.credit_balance < settings.min_credit_to_request {
            return Err(AppError::Conflict(
                ErrorCode::InsufficientCredit,
                format!(
                    "A credit balance of at least {} is required to request a book",
                    settings.min_credit_to_request
                ),
            ));
        }

        if self
            .repository
            .requests
            .has_open_duplicate(user_id, &key.request_key)
            .await?
        {
            return Err(AppError::Conflict(
                ErrorCode::Duplicate,
                "You already have an open request for this book".to_string(),
            ));
        }

        let books = self.repository.books.list_available().await?;
        let matched = find_match_for_key(&key, &books);

        let (status, matched_book_id, note) = match matched {
            Some(book) => (
                RequestStatus::FulfilledAuto,
                Some(book.id),
                Some(format!(
                    "Matched at submission: \"{}\" (book #{}) is already available",
                    book.title, book.id
                )),
            ),
            None => (RequestStatus::Open, None, None),
        };

        let request = self
            .repository
            .requests
            .create(&NewBookRequest {
                requested_by_user_id: user_id,
                requested_title: title,
                requested_author: author,
                requested_isbn: isbn,
                key: &key,
                status,
                matched_book_id,
                fulfillment_note: note.as_deref(),
            })
            .await?;

        if !request.status.is_open() {
            self.notify_fulfilled(&request);
        }

        Ok(request)
    }

    /// Reconcile every OPEN request against one book, oldest request
    /// first. Safe to call repeatedly: fulfilled requests drop out of the
    /// open scan. Returns the number fulfilled.
    pub async fn auto_fulfill_for_book(&self, book_id: i32) -> AppResult<u64> {
        let book = match self.repository.books.get_by_id(book_id).await {
            Ok(book) => book,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::BadRequest(format!("Invalid book id {}", book_id)))
            }
            Err(e) => return Err(e),
        };

        if book.available_copies <= 0 {
            return Ok(0);
        }

        let mut fulfilled = 0u64;
        for request in self.repository.requests.list_open().await? {
            if !request_matches_book(&request, &book) {
                continue;
            }
            let note = format!(
                "Automatically matched against \"{}\" (book #{})",
                book.title, book.id
            );
            let flipped = self
                .repository
                .requests
                .fulfill(request.id, RequestStatus::FulfilledAuto, Some(book.id), None, Some(&note))
                .await?;
            if flipped {
                fulfilled += 1;
                self.notify_fulfilled(&request);
            }
        }

        if fulfilled > 0 {
            tracing::info!("Auto-fulfilled {} request(s) against book {}", fulfilled, book_id);
        }

        Ok(fulfilled)
    }

    /// Admin escape hatch for matches the normalizer cannot express
    /// (alternate editions and the like)
    pub async fn fulfill_manually(
        &self,
        request_id: i32,
        admin_id: i32,
        book_id: Option<i32>,
        note: Option<&str>,
    ) -> AppResult<BookRequest> {
        let request = self.repository.requests.get_by_id(request_id).await?;
        if !request.status.is_open() {
            return Err(AppError::Conflict(
                ErrorCode::RequestNotOpen,
                "Only OPEN requests can be fulfilled".to_string(),
            ));
        }

        if let Some(book_id) = book_id {
            self.repository.books.get_by_id(book_id).await?;
        }

        let flipped = self
            .repository
            .requests
            .fulfill(request_id, RequestStatus::FulfilledManual, book_id, Some(admin_id), note)
            .await?;
        if !flipped {
            // Raced with another fulfillment between the read and the update
            return Err(AppError::Conflict(
                ErrorCode::RequestNotOpen,
                "Only OPEN requests can be fulfilled".to_string(),
            ));
        }

        let updated = self.repository.requests.get_by_id(request_id).await?;
        self.notify_fulfilled(&updated);
        Ok(updated)
    }

    /// Fire-and-forget "your request is available" notification
    fn notify_fulfilled(&self, request: &BookRequest) {
        let repository = self.repository.clone();
        let notifier = self.notifier.clone();
        let user_id = request.requested_by_user_id;
        let description = describe_request(request);

        tokio::spawn(async move {
            let user = match repository.users.get_by_id(user_id).await {
                Ok(user) => user,
                Err(e) => {
                    tracing::warn!("Fulfillment notice skipped, user lookup failed: {}", e);
                    return;
                }
            };
            if let Err(e) = notifier
                .send_request_fulfilled(&user.email, &user.name, &description)
                .await
            {
                tracing::warn!("Failed to send fulfillment notice to user {}: {}", user_id, e);
            }
        });
    }
}

/// Human-readable description of what was requested
fn describe_request(request: &BookRequest) -> String {
    match (&request.requested_title, &request.requested_isbn) {
        (Some(title), _) => format!("\"{}\"", title),
        (None, Some(isbn)) => format!("the book with ISBN {}", isbn),
        (None, None) => "the book you requested".to_string(),
    }
}
