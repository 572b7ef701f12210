//! Book (catalog entry) model.
//!
//! The catalog itself is managed elsewhere; the lending engine only reads
//! books and maintains the `available_copies` counter. That counter is a
//! derived cache of the loan table: every ACTIVE/OVERDUE loan corresponds
//! to exactly one unit withheld from the pool.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub isbn10: Option<String>,
    pub isbn13: Option<String>,
    pub available_copies: i32,
}

impl Book {
    /// All ISBN fields of this book in normalized form
    pub fn normalized_isbns(&self) -> Vec<String> {
        [&self.isbn, &self.isbn10, &self.isbn13]
            .into_iter()
            .flatten()
            .map(|s| crate::normalize::normalize_isbn(s))
            .filter(|s| !s.is_empty())
            .collect()
    }
}
