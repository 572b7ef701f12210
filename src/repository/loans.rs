//! Loans repository: the transactional side of the loan state machine.
//!
//! Every mutating method runs inside one database transaction. The loan
//! row is locked with `SELECT ... FOR UPDATE` before its status is tested,
//! and the availability counter is only ever moved by the atomic
//! conditional update in [`withhold_copy`], so two admins approving
//! against the last copy cannot drive `available_copies` negative.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::loan::{Loan, LoanDetails, LoanStatus},
    repository::settings::LendingSettings,
};

/// Loan row joined with user/book columns needed for a reminder email
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReminderLoan {
    pub loan_id: i32,
    pub status: LoanStatus,
    pub due_date: DateTime<Utc>,
    pub user_email: String,
    pub user_name: String,
    pub book_title: String,
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

const DETAILS_SELECT: &str = r#"
    SELECT l.id, l.user_id, l.book_id, b.title AS book_title, b.author AS book_author,
           l.status, l.borrowed_at, l.due_date, l.approved_at, l.returned_at
    FROM loans l
    JOIN books b ON b.id = l.book_id
"#;

/// Lock the loan row for the duration of the enclosing transaction
async fn get_for_update(tx: &mut Transaction<'_, Postgres>, id: i32) -> AppResult<Loan> {
    sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
}

/// Atomically take one copy out of the pool. Zero rows affected means the
/// last copy went to someone else, reported as a conflict.
async fn withhold_copy(tx: &mut Transaction<'_, Postgres>, book_id: i32) -> AppResult<()> {
    let rows = sqlx::query(
        "UPDATE books SET available_copies = available_copies - 1 WHERE id = $1 AND available_copies > 0",
    )
    .bind(book_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if rows == 0 {
        return Err(AppError::Conflict(
            ErrorCode::BookNotAvailable,
            "No available copies for this book".to_string(),
        ));
    }
    Ok(())
}

/// Put one copy back into the pool
async fn release_copy(tx: &mut Transaction<'_, Postgres>, book_id: i32) -> AppResult<()> {
    sqlx::query("UPDATE books SET available_copies = available_copies + 1 WHERE id = $1")
        .bind(book_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Loans counting toward the per-user concurrency cap (PENDING/ACTIVE/OVERDUE)
async fn count_open_loans(tx: &mut Transaction<'_, Postgres>, user_id: i32) -> AppResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND status IN ('pending', 'active', 'overdue')",
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count)
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Get loan with its book joined in
    pub async fn get_details(&self, id: i32) -> AppResult<LoanDetails> {
        sqlx::query_as::<_, LoanDetails>(&format!("{} WHERE l.id = $1", DETAILS_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Get loans for a user, newest first
    pub async fn get_user_loans(&self, user_id: i32) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{} WHERE l.user_id = $1 ORDER BY l.borrowed_at DESC",
            DETAILS_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Create a PENDING loan for a user borrow request.
    ///
    /// No copy is withheld yet: a pending loan does not reserve inventory,
    /// admission happens at approval time.
    pub async fn create_pending(
        &self,
        user_id: i32,
        book_id: i32,
        settings: &LendingSettings,
    ) -> AppResult<LoanDetails> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let available: Option<i32> =
            sqlx::query_scalar("SELECT available_copies FROM books WHERE id = $1")
                .bind(book_id)
                .fetch_optional(&mut *tx)
                .await?;

        let available = available
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        if available <= 0 {
            return Err(AppError::Conflict(
                ErrorCode::BookNotAvailable,
                "No available copies for this book".to_string(),
            ));
        }

        let already_open: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE user_id = $1 AND book_id = $2 AND status IN ('pending', 'active', 'overdue'))",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

        if already_open {
            return Err(AppError::Conflict(
                ErrorCode::Duplicate,
                "You already have an open loan for this book".to_string(),
            ));
        }

        let open_loans = count_open_loans(&mut tx, user_id).await?;
        if open_loans >= settings.max_concurrent_loans as i64 {
            return Err(AppError::Conflict(
                ErrorCode::MaxLoansReached,
                format!(
                    "Maximum concurrent loans reached ({}/{})",
                    open_loans, settings.max_concurrent_loans
                ),
            ));
        }

        let loan_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO loans (user_id, book_id, status, borrowed_at, due_date)
            VALUES ($1, $2, 'pending', $3, $4)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(now)
        .bind(now + Duration::days(settings.loan_duration_days as i64))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_details(loan_id).await
    }

    /// Approve a PENDING loan: the only point where inventory is withheld.
    ///
    /// The due date restarts at approval, not at request time, and the
    /// per-user cap is re-checked because the pending-time check is stale
    /// by design.
    pub async fn approve(
        &self,
        loan_id: i32,
        admin_id: i32,
        settings: &LendingSettings,
    ) -> AppResult<LoanDetails> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let loan = get_for_update(&mut tx, loan_id).await?;
        if !loan.status.can_review() {
            return Err(AppError::Conflict(
                ErrorCode::InvalidLoanState,
                format!("Loan is {}, only PENDING loans can be approved", loan.status),
            ));
        }

        let outstanding: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND status IN ('active', 'overdue')",
        )
        .bind(loan.user_id)
        .fetch_one(&mut *tx)
        .await?;

        if outstanding >= settings.max_concurrent_loans as i64 {
            return Err(AppError::Conflict(
                ErrorCode::MaxLoansReached,
                format!(
                    "User already has {} of {} allowed loans",
                    outstanding, settings.max_concurrent_loans
                ),
            ));
        }

        withhold_copy(&mut tx, loan.book_id).await?;

        sqlx::query(
            r#"
            UPDATE loans
            SET status = 'active', approved_at = $2, due_date = $3, reviewed_by_user_id = $4
            WHERE id = $1
            "#,
        )
        .bind(loan_id)
        .bind(now)
        .bind(now + Duration::days(settings.loan_duration_days as i64))
        .bind(admin_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_details(loan_id).await
    }

    /// Reject a PENDING loan. No inventory effect since none was withheld.
    pub async fn reject(
        &self,
        loan_id: i32,
        admin_id: i32,
        reason: Option<&str>,
    ) -> AppResult<LoanDetails> {
        let mut tx = self.pool.begin().await?;

        let loan = get_for_update(&mut tx, loan_id).await?;
        if !loan.status.can_review() {
            return Err(AppError::Conflict(
                ErrorCode::InvalidLoanState,
                format!("Loan is {}, only PENDING loans can be rejected", loan.status),
            ));
        }

        sqlx::query(
            r#"
            UPDATE loans
            SET status = 'rejected', rejected_at = $2, rejection_reason = $3, reviewed_by_user_id = $4
            WHERE id = $1
            "#,
        )
        .bind(loan_id)
        .bind(Utc::now())
        .bind(reason)
        .bind(admin_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_details(loan_id).await
    }

    /// Return an outstanding loan and restore one copy to the pool.
    ///
    /// When `by_user` is set the loan must belong to that user; loans of
    /// other users are reported as not found.
    pub async fn return_loan(
        &self,
        loan_id: i32,
        by_user: Option<i32>,
        returned_at: DateTime<Utc>,
        reviewed_by: Option<i32>,
    ) -> AppResult<LoanDetails> {
        let mut tx = self.pool.begin().await?;

        let loan = get_for_update(&mut tx, loan_id).await?;
        if let Some(user_id) = by_user {
            if loan.user_id != user_id {
                return Err(AppError::NotFound(format!("Loan with id {} not found", loan_id)));
            }
        }
        if !loan.status.can_close() {
            return Err(AppError::Conflict(
                ErrorCode::InvalidLoanState,
                format!("Loan is {}, only ACTIVE or OVERDUE loans can be returned", loan.status),
            ));
        }

        sqlx::query(
            r#"
            UPDATE loans
            SET status = 'returned', returned_at = $2,
                reviewed_by_user_id = COALESCE($3, reviewed_by_user_id)
            WHERE id = $1
            "#,
        )
        .bind(loan_id)
        .bind(returned_at)
        .bind(reviewed_by)
        .execute(&mut *tx)
        .await?;

        release_copy(&mut tx, loan.book_id).await?;

        tx.commit().await?;

        self.get_details(loan_id).await
    }

    /// Write off an outstanding loan as lost.
    ///
    /// Deliberately does not restore the counter: a lost book is gone from
    /// the lending pool, which is what distinguishes LOST from RETURNED.
    pub async fn mark_lost(
        &self,
        loan_id: i32,
        admin_id: i32,
        penalty_amount: Option<Decimal>,
        note: Option<&str>,
    ) -> AppResult<LoanDetails> {
        let mut tx = self.pool.begin().await?;

        let loan = get_for_update(&mut tx, loan_id).await?;
        if !loan.status.can_close() {
            return Err(AppError::Conflict(
                ErrorCode::InvalidLoanState,
                format!("Loan is {}, only ACTIVE or OVERDUE loans can be marked lost", loan.status),
            ));
        }

        sqlx::query(
            r#"
            UPDATE loans
            SET status = 'lost', lost_at = $2, penalty_amount = $3, admin_note = $4,
                reviewed_by_user_id = $5
            WHERE id = $1
            "#,
        )
        .bind(loan_id)
        .bind(Utc::now())
        .bind(penalty_amount)
        .bind(note)
        .bind(admin_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_details(loan_id).await
    }

    /// Create an ACTIVE loan directly, bypassing PENDING (walk-in checkout)
    pub async fn create_active(
        &self,
        admin_id: i32,
        user_id: i32,
        book_id: i32,
        due_date: DateTime<Utc>,
        settings: &LendingSettings,
    ) -> AppResult<i32> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(book_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(AppError::NotFound(format!("Book with id {} not found", book_id)));
        }

        let already_open: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE user_id = $1 AND book_id = $2 AND status IN ('pending', 'active', 'overdue'))",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;
        if already_open {
            return Err(AppError::Conflict(
                ErrorCode::Duplicate,
                "User already has an open loan for this book".to_string(),
            ));
        }

        let open_loans = count_open_loans(&mut tx, user_id).await?;
        if open_loans >= settings.max_concurrent_loans as i64 {
            return Err(AppError::Conflict(
                ErrorCode::MaxLoansReached,
                format!(
                    "Maximum concurrent loans reached ({}/{})",
                    open_loans, settings.max_concurrent_loans
                ),
            ));
        }

        withhold_copy(&mut tx, book_id).await?;

        let loan_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO loans (user_id, book_id, status, borrowed_at, approved_at, due_date, reviewed_by_user_id)
            VALUES ($1, $2, 'active', $3, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(now)
        .bind(due_date)
        .bind(admin_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(loan_id)
    }

    /// Hard-delete a loan, undoing its reservation if it held a copy.
    /// Returns the deleted row.
    pub async fn delete(&self, loan_id: i32) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let loan = get_for_update(&mut tx, loan_id).await?;
        if loan.status.holds_copy() {
            release_copy(&mut tx, loan.book_id).await?;
        }

        sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(loan_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(loan)
    }

    /// Promote an ACTIVE loan to OVERDUE. The status guard makes repeated
    /// calls harmless.
    pub async fn mark_overdue(&self, loan_id: i32) -> AppResult<bool> {
        let rows = sqlx::query("UPDATE loans SET status = 'overdue' WHERE id = $1 AND status = 'active'")
            .bind(loan_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(rows > 0)
    }

    /// All ACTIVE/OVERDUE loans with the user and book columns the
    /// reminder sweep needs
    pub async fn list_for_reminders(&self) -> AppResult<Vec<ReminderLoan>> {
        let loans = sqlx::query_as::<_, ReminderLoan>(
            r#"
            SELECT l.id AS loan_id, l.status, l.due_date,
                   u.email AS user_email, u.name AS user_name, b.title AS book_title
            FROM loans l
            JOIN users u ON u.id = l.user_id
            JOIN books b ON b.id = l.book_id
            WHERE l.status IN ('active', 'overdue')
            ORDER BY l.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Count loans currently ACTIVE or OVERDUE
    pub async fn count_outstanding(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE status IN ('active', 'overdue')",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
