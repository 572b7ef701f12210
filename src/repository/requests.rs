//! Book requests repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::request::{BookRequest, RequestStatus},
    normalize::RequestKey,
};

/// Fields for inserting a new book request
#[derive(Debug)]
pub struct NewBookRequest<'a> {
    pub requested_by_user_id: i32,
    pub requested_title: Option<&'a str>,
    pub requested_author: Option<&'a str>,
    pub requested_isbn: Option<&'a str>,
    pub key: &'a RequestKey,
    pub status: RequestStatus,
    pub matched_book_id: Option<i32>,
    pub fulfillment_note: Option<&'a str>,
}

#[derive(Clone)]
pub struct RequestsRepository {
    pool: Pool<Postgres>,
}

impl RequestsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get request by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<BookRequest> {
        sqlx::query_as::<_, BookRequest>("SELECT * FROM book_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book request with id {} not found", id)))
    }

    /// Does this user already have an OPEN request with the same dedup key?
    pub async fn has_open_duplicate(&self, user_id: i32, request_key: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM book_requests WHERE requested_by_user_id = $1 AND request_key = $2 AND status = 'open')",
        )
        .bind(user_id)
        .bind(request_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Insert a new request. A request matched at creation time is stored
    /// already fulfilled and never appears OPEN.
    ///
    /// The partial unique index on `(requested_by_user_id, request_key)
    /// WHERE status = 'open'` backs the duplicate check: when two identical
    /// submissions race past it, the second insert loses here.
    pub async fn create(&self, new: &NewBookRequest<'_>) -> AppResult<BookRequest> {
        let fulfilled = !new.status.is_open();
        let request = sqlx::query_as::<_, BookRequest>(
            r#"
            INSERT INTO book_requests (
                requested_by_user_id, requested_title, requested_author, requested_isbn,
                normalized_title, normalized_author, normalized_isbn, request_key,
                status, matched_book_id, fulfilled_at, fulfillment_note, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(new.requested_by_user_id)
        .bind(new.requested_title)
        .bind(new.requested_author)
        .bind(new.requested_isbn)
        .bind(new.key.normalized_title.as_deref())
        .bind(new.key.normalized_author.as_deref())
        .bind(new.key.normalized_isbn.as_deref())
        .bind(&new.key.request_key)
        .bind(new.status)
        .bind(new.matched_book_id)
        .bind(if fulfilled { Some(Utc::now()) } else { None })
        .bind(new.fulfillment_note)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict(
                ErrorCode::Duplicate,
                "You already have an open request for this book".to_string(),
            ),
            e => AppError::Database(e),
        })?;
        Ok(request)
    }

    /// All OPEN requests, oldest first (first-come-first-served fairness)
    pub async fn list_open(&self) -> AppResult<Vec<BookRequest>> {
        let requests = sqlx::query_as::<_, BookRequest>(
            "SELECT * FROM book_requests WHERE status = 'open' ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    /// Requests submitted by a user, newest first
    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<BookRequest>> {
        let requests = sqlx::query_as::<_, BookRequest>(
            "SELECT * FROM book_requests WHERE requested_by_user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    /// Flip an OPEN request to a fulfilled state. The status guard in the
    /// WHERE clause makes this safe to call on an already-fulfilled
    /// request: zero rows affected, reported as `false`.
    pub async fn fulfill(
        &self,
        request_id: i32,
        status: RequestStatus,
        matched_book_id: Option<i32>,
        fulfilled_by_user_id: Option<i32>,
        note: Option<&str>,
    ) -> AppResult<bool> {
        let rows = sqlx::query(
            r#"
            UPDATE book_requests
            SET status = $2, matched_book_id = $3, fulfilled_at = $4,
                fulfilled_by_user_id = $5, fulfillment_note = $6
            WHERE id = $1 AND status = 'open'
            "#,
        )
        .bind(request_id)
        .bind(status)
        .bind(matched_book_id)
        .bind(Utc::now())
        .bind(fulfilled_by_user_id)
        .bind(note)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows > 0)
    }
}
