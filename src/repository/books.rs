//! Books repository for database operations.
//!
//! Read-only: the catalog is owned elsewhere. The `available_copies`
//! counter is written exclusively by the loan transactions in
//! [`super::loans`], in the same transaction as the status change that
//! crosses the checked-out boundary.

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::Book,
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// All books with at least one available copy, in id order.
    ///
    /// Request matching normalizes titles and ISBNs in process, so the
    /// scan happens over full rows rather than in SQL.
    pub async fn list_available(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE available_copies > 0 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }
}
