//! Loan model and lifecycle states

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Lifecycle state of a loan.
///
/// PENDING, REJECTED, RETURNED and LOST are reachable only through the
/// transitions checked below; RETURNED, LOST and REJECTED are terminal.
/// OVERDUE is not an explicit call: the reminder sweep (or any reader)
/// infers it whenever an ACTIVE loan's due date has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "loan_status", rename_all = "snake_case")]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanStatus {
    Pending,
    Active,
    Overdue,
    Returned,
    Lost,
    Rejected,
}

impl LoanStatus {
    /// A copy of the book is currently withheld from the pool
    pub fn holds_copy(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }

    /// Counts toward the per-user concurrent loan cap
    pub fn counts_toward_cap(&self) -> bool {
        matches!(self, LoanStatus::Pending | LoanStatus::Active | LoanStatus::Overdue)
    }

    /// No further transition is defined from this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Returned | LoanStatus::Lost | LoanStatus::Rejected)
    }

    /// approve and reject only apply to a pending loan
    pub fn can_review(&self) -> bool {
        matches!(self, LoanStatus::Pending)
    }

    /// return and mark-lost only apply to an outstanding loan
    pub fn can_close(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LoanStatus::Pending => "PENDING",
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Overdue => "OVERDUE",
            LoanStatus::Returned => "RETURNED",
            LoanStatus::Lost => "LOST",
            LoanStatus::Rejected => "REJECTED",
        };
        write!(f, "{}", label)
    }
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub status: LoanStatus,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub returned_at: Option<DateTime<Utc>>,
    pub lost_at: Option<DateTime<Utc>>,
    pub penalty_amount: Option<Decimal>,
    pub admin_note: Option<String>,
    pub reviewed_by_user_id: Option<i32>,
}

/// Loan joined with its book, for display
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub book_author: Option<String>,
    pub status: LoanStatus,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_is_withheld_only_while_outstanding() {
        assert!(LoanStatus::Active.holds_copy());
        assert!(LoanStatus::Overdue.holds_copy());
        for s in [LoanStatus::Pending, LoanStatus::Returned, LoanStatus::Lost, LoanStatus::Rejected]
        {
            assert!(!s.holds_copy(), "{s} must not hold a copy");
        }
    }

    #[test]
    fn cap_counts_pending_and_outstanding() {
        assert!(LoanStatus::Pending.counts_toward_cap());
        assert!(LoanStatus::Active.counts_toward_cap());
        assert!(LoanStatus::Overdue.counts_toward_cap());
        assert!(!LoanStatus::Returned.counts_toward_cap());
        assert!(!LoanStatus::Lost.counts_toward_cap());
        assert!(!LoanStatus::Rejected.counts_toward_cap());
    }

    #[test]
    fn terminal_states_allow_nothing() {
        for s in [LoanStatus::Returned, LoanStatus::Lost, LoanStatus::Rejected] {
            assert!(s.is_terminal());
            assert!(!s.can_review());
            assert!(!s.can_close());
        }
    }

    #[test]
    fn review_only_from_pending_close_only_from_outstanding() {
        assert!(LoanStatus::Pending.can_review());
        assert!(!LoanStatus::Active.can_review());
        assert!(!LoanStatus::Pending.can_close());
        assert!(LoanStatus::Active.can_close());
        assert!(LoanStatus::Overdue.can_close());
    }
}
