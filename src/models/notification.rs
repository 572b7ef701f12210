//! Reminder dedup marker.
//!
//! A row's presence means "this milestone for this loan has already been
//! emailed". The `(loan_id, notification_key)` pair is unique in storage,
//! which is what makes the reminder sweep idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoanNotification {
    pub loan_id: i32,
    pub notification_key: String,
    pub notified_at: DateTime<Utc>,
}
