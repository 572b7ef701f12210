//! Reminder dedup markers.
//!
//! The sweep inserts a `(loan_id, notification_key)` row before sending a
//! reminder. A rejected duplicate insert means the milestone was already
//! emailed; deleting the row after a failed send is what lets the next
//! sweep retry.

use sqlx::{Pool, Postgres};

use crate::error::AppResult;

#[derive(Clone)]
pub struct NotificationsRepository {
    pool: Pool<Postgres>,
}

impl NotificationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Claim a (loan, milestone) pair. Returns `true` when this call
    /// inserted the marker, `false` when it already existed.
    pub async fn try_claim(&self, loan_id: i32, notification_key: &str) -> AppResult<bool> {
        let rows = sqlx::query(
            r#"
            INSERT INTO loan_notifications (loan_id, notification_key, notified_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (loan_id, notification_key) DO NOTHING
            "#,
        )
        .bind(loan_id)
        .bind(notification_key)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows > 0)
    }

    /// Compensating action after a failed send: drop the marker so a later
    /// sweep retries this milestone.
    pub async fn release(&self, loan_id: i32, notification_key: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM loan_notifications WHERE loan_id = $1 AND notification_key = $2")
            .bind(loan_id)
            .bind(notification_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
