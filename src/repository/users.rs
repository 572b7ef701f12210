//! Users repository for database operations.
//!
//! User accounts are managed by the identity layer; the lending engine
//! only needs lookups for existence checks, notification addresses and
//! the credit-balance precondition on book requests.

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::User,
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, credit_balance, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }
}
