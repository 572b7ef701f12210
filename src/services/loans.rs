//! Loan lifecycle service.
//!
//! Owns the loan state machine end to end: user borrow requests, admin
//! review, returns, lost write-offs and manual checkouts. Every transition
//! delegates to one transactional repository call; notifications are
//! dispatched after commit and their failure never reaches the caller.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::loan::{Loan, LoanDetails},
    repository::Repository,
    services::email::Notifier,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    notifier: Arc<dyn Notifier>,
}

impl LoansService {
    pub fn new(repository: Repository, notifier: Arc<dyn Notifier>) -> Self {
        Self { repository, notifier }
    }

    /// Get loans for a user
    pub async fn get_user_loans(&self, user_id: i32) -> AppResult<Vec<LoanDetails>> {
        // Verify user exists
        self.repository.users.get_by_id(user_id).await?;
        self.repository.loans.get_user_loans(user_id).await
    }

    /// User borrow request: creates a PENDING loan. No copy is reserved
    /// until an admin approves.
    pub async fn borrow(&self, user_id: i32, book_id: i32) -> AppResult<LoanDetails> {
        let settings = self.repository.settings.get().await?;
        if !settings.lending_enabled {
            return Err(AppError::Forbidden(
                ErrorCode::LendingDisabled,
                "Lending is currently disabled".to_string(),
            ));
        }

        self.repository
            .loans
            .create_pending(user_id, book_id, &settings)
            .await
    }

    /// Approve a pending loan request
    pub async fn approve(&self, loan_id: i32, admin_id: i32) -> AppResult<LoanDetails> {
        let settings = self.repository.settings.get().await?;
        self.repository.loans.approve(loan_id, admin_id, &settings).await
    }

    /// Reject a pending loan request
    pub async fn reject(
        &self,
        loan_id: i32,
        admin_id: i32,
        reason: Option<&str>,
    ) -> AppResult<LoanDetails> {
        self.repository.loans.reject(loan_id, admin_id, reason).await
    }

    /// User-facing return: the loan must belong to the caller
    pub async fn return_own_loan(&self, loan_id: i32, user_id: i32) -> AppResult<LoanDetails> {
        self.repository
            .loans
            .return_loan(loan_id, Some(user_id), Utc::now(), None)
            .await
    }

    /// Admin-recorded return, with an optional backdated return date.
    /// Sends a return confirmation to the borrower; delivery failure is
    /// logged and swallowed.
    pub async fn admin_return(
        &self,
        loan_id: i32,
        admin_id: i32,
        return_date: Option<DateTime<Utc>>,
    ) -> AppResult<LoanDetails> {
        let returned_at = match return_date {
            Some(date) => {
                let loan = self.repository.loans.get_by_id(loan_id).await?;
                if date > Utc::now() || date < loan.borrowed_at {
                    return Err(AppError::BadRequest(
                        "Return date must be between the borrow date and now".to_string(),
                    ));
                }
                date
            }
            None => Utc::now(),
        };

        let details = self
            .repository
            .loans
            .return_loan(loan_id, None, returned_at, Some(admin_id))
            .await?;

        self.notify_return(&details);

        Ok(details)
    }

    /// Write off an outstanding loan as lost. The copy is not restored to
    /// the pool.
    pub async fn mark_lost(
        &self,
        loan_id: i32,
        admin_id: i32,
        penalty_amount: Option<Decimal>,
        note: Option<&str>,
    ) -> AppResult<LoanDetails> {
        self.repository
            .loans
            .mark_lost(loan_id, admin_id, penalty_amount, note)
            .await
    }

    /// Admin walk-in checkout: creates an ACTIVE loan directly
    pub async fn admin_create(
        &self,
        admin_id: i32,
        user_id: i32,
        book_id: i32,
        due_date: DateTime<Utc>,
    ) -> AppResult<i32> {
        if due_date <= Utc::now() {
            return Err(AppError::BadRequest(
                "Due date must be in the future".to_string(),
            ));
        }

        // Verify user exists (book existence is checked in the transaction)
        self.repository.users.get_by_id(user_id).await?;

        let settings = self.repository.settings.get().await?;
        self.repository
            .loans
            .create_active(admin_id, user_id, book_id, due_date, &settings)
            .await
    }

    /// Hard-delete a loan, restoring the copy if one was withheld
    pub async fn admin_delete(&self, loan_id: i32) -> AppResult<Loan> {
        self.repository.loans.delete(loan_id).await
    }

    /// Fire-and-forget return confirmation
    fn notify_return(&self, details: &LoanDetails) {
        let repository = self.repository.clone();
        let notifier = self.notifier.clone();
        let user_id = details.user_id;
        let book_title = details.book_title.clone();

        tokio::spawn(async move {
            let user = match repository.users.get_by_id(user_id).await {
                Ok(user) => user,
                Err(e) => {
                    tracing::warn!("Return confirmation skipped, user lookup failed: {}", e);
                    return;
                }
            };
            if let Err(e) = notifier
                .send_return_confirmation(&user.email, &user.name, &book_title)
                .await
            {
                tracing::warn!(
                    "Failed to send return confirmation to user {}: {}",
                    user_id,
                    e
                );
            }
        });
    }
}
