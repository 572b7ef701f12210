//! Book request (acquisition suggestion) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Status of a book request. The FULFILLED states are terminal; a request
/// is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Open,
    FulfilledAuto,
    FulfilledManual,
}

impl RequestStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, RequestStatus::Open)
    }
}

/// Book request from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookRequest {
    pub id: i32,
    pub requested_by_user_id: i32,
    pub requested_title: Option<String>,
    pub requested_author: Option<String>,
    pub requested_isbn: Option<String>,
    pub normalized_title: Option<String>,
    pub normalized_author: Option<String>,
    pub normalized_isbn: Option<String>,
    pub request_key: String,
    pub status: RequestStatus,
    pub matched_book_id: Option<i32>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub fulfilled_by_user_id: Option<i32>,
    pub fulfillment_note: Option<String>,
    pub created_at: DateTime<Utc>,
}
