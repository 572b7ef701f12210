//! Overdue promotion and reminder sweep.
//!
//! Runs on a fixed interval over every ACTIVE/OVERDUE loan. Idempotency
//! comes from the dedup marker table, not from mutual exclusion: a second
//! overlapping pass loses the duplicate-key insert and skips the send.
//! When a send fails after the marker was claimed, the marker is released
//! so the next pass retries — a compensating action, not a rollback.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::LoanStatus,
    repository::{loans::ReminderLoan, Repository},
    services::email::Notifier,
};

/// Whole-day distance from today (UTC) to the due date, ignoring
/// time-of-day. Negative once the due date has passed.
pub fn days_until_due(due_date: DateTime<Utc>, today: NaiveDate) -> i64 {
    (due_date.date_naive() - today).num_days()
}

/// Milestone key for a loan at the given whole-day distance, if any.
/// At most one key applies per loan per pass.
pub fn reminder_milestone(days_diff: i64) -> Option<String> {
    match days_diff {
        2 => Some("pre_due_2".to_string()),
        0 => Some("due_day".to_string()),
        -2 => Some("overdue_2".to_string()),
        d if d < -2 && (d.abs() - 2) % 7 == 0 => {
            Some(format!("overdue_weekly_{}", (d.abs() - 2) / 7))
        }
        _ => None,
    }
}

/// Store operations the sweep needs: the outstanding-loans scan, the
/// overdue promotion, and the dedup marker claim/release pair.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn list_for_reminders(&self) -> AppResult<Vec<ReminderLoan>>;
    async fn mark_overdue(&self, loan_id: i32) -> AppResult<bool>;
    async fn claim_notification(&self, loan_id: i32, key: &str) -> AppResult<bool>;
    async fn release_notification(&self, loan_id: i32, key: &str) -> AppResult<()>;
}

#[async_trait]
impl ReminderStore for Repository {
    async fn list_for_reminders(&self) -> AppResult<Vec<ReminderLoan>> {
        self.loans.list_for_reminders().await
    }

    async fn mark_overdue(&self, loan_id: i32) -> AppResult<bool> {
        self.loans.mark_overdue(loan_id).await
    }

    async fn claim_notification(&self, loan_id: i32, key: &str) -> AppResult<bool> {
        self.notifications.try_claim(loan_id, key).await
    }

    async fn release_notification(&self, loan_id: i32, key: &str) -> AppResult<()> {
        self.notifications.release(loan_id, key).await
    }
}

/// Counters for one sweep pass, for the log line
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub examined: usize,
    pub promoted: usize,
    pub sent: usize,
    pub skipped_duplicates: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct ReminderService {
    store: Arc<dyn ReminderStore>,
    notifier: Arc<dyn Notifier>,
}

impl ReminderService {
    pub fn new(store: Arc<dyn ReminderStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// One sweep pass over all outstanding loans
    pub async fn sweep(&self) -> AppResult<SweepOutcome> {
        let today = Utc::now().date_naive();
        let loans = self.store.list_for_reminders().await?;

        let mut outcome = SweepOutcome::default();
        outcome.examined = loans.len();

        for loan in loans {
            let days_diff = days_until_due(loan.due_date, today);

            // Promotion is unconditional on whether a reminder fires
            if days_diff < 0 && loan.status == LoanStatus::Active {
                if self.store.mark_overdue(loan.loan_id).await? {
                    outcome.promoted += 1;
                }
            }

            let Some(key) = reminder_milestone(days_diff) else {
                continue;
            };

            if !self.store.claim_notification(loan.loan_id, &key).await? {
                // Marker already present: this milestone was emailed before
                outcome.skipped_duplicates += 1;
                continue;
            }

            match self
                .notifier
                .send_loan_reminder(
                    &loan.user_email,
                    &loan.user_name,
                    &loan.book_title,
                    loan.due_date,
                    days_diff,
                )
                .await
            {
                Ok(()) => outcome.sent += 1,
                Err(e) => {
                    tracing::warn!(
                        "Reminder {} for loan {} failed, releasing marker: {}",
                        key,
                        loan.loan_id,
                        e
                    );
                    self.store.release_notification(loan.loan_id, &key).await?;
                    outcome.failed += 1;
                }
            }
        }

        tracing::info!(
            "Reminder sweep: {} examined, {} promoted to overdue, {} sent, {} already notified, {} failed",
            outcome.examined,
            outcome.promoted,
            outcome.sent,
            outcome.skipped_duplicates,
            outcome.failed
        );

        Ok(outcome)
    }

    /// Timer loop, spawned once at startup
    pub async fn run(self, interval_secs: u64) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            if let Err(e) = self.sweep().await {
                tracing::error!("Reminder sweep aborted: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, services::email::MockNotifier};
    use chrono::{Duration, TimeZone};

    #[test]
    fn milestone_table() {
        assert_eq!(reminder_milestone(2).as_deref(), Some("pre_due_2"));
        assert_eq!(reminder_milestone(0).as_deref(), Some("due_day"));
        assert_eq!(reminder_milestone(-2).as_deref(), Some("overdue_2"));
        assert_eq!(reminder_milestone(-9).as_deref(), Some("overdue_weekly_1"));
        assert_eq!(reminder_milestone(-16).as_deref(), Some("overdue_weekly_2"));
        assert_eq!(reminder_milestone(-23).as_deref(), Some("overdue_weekly_3"));
    }

    #[test]
    fn no_milestone_between_marks() {
        for d in [3, 1, -1, -3, -4, -5, -6, -7, -8, -10, -15] {
            assert_eq!(reminder_milestone(d), None, "day {} must not fire", d);
        }
    }

    #[test]
    fn day_diff_ignores_time_of_day() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        // Due late in the evening two days out still counts as 2 whole days
        let due = Utc.with_ymd_and_hms(2026, 3, 12, 23, 59, 0).unwrap();
        assert_eq!(days_until_due(due, today), 2);
        // Due earlier this morning is day zero, not overdue
        let due = Utc.with_ymd_and_hms(2026, 3, 10, 0, 5, 0).unwrap();
        assert_eq!(days_until_due(due, today), 0);
        // Three days past due: promoted but no milestone
        let due = Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap();
        assert_eq!(days_until_due(due, today), -3);
        assert_eq!(reminder_milestone(-3), None);
    }

    fn loan_past_due(loan_id: i32, days_past: i64) -> ReminderLoan {
        ReminderLoan {
            loan_id,
            status: LoanStatus::Overdue,
            due_date: Utc::now() - Duration::days(days_past),
            user_email: "reader@example.com".to_string(),
            user_name: "Reader".to_string(),
            book_title: "The Hobbit".to_string(),
        }
    }

    #[tokio::test]
    async fn failed_send_releases_marker_and_next_sweep_retries() {
        let mut store = MockReminderStore::new();
        let mut notifier = MockNotifier::new();

        store
            .expect_list_for_reminders()
            .times(2)
            .returning(|| Ok(vec![loan_past_due(3, 2)]));
        // The marker is free on both passes because the release after the
        // failed send put it back
        store
            .expect_claim_notification()
            .withf(|&id, key| id == 3 && key == "overdue_2")
            .times(2)
            .returning(|_, _| Ok(true));
        store
            .expect_release_notification()
            .withf(|&id, key| id == 3 && key == "overdue_2")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut seq = mockall::Sequence::new();
        notifier
            .expect_send_loan_reminder()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _, _| Err(AppError::Internal("SMTP refused".to_string())));
        notifier
            .expect_send_loan_reminder()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _, _| Ok(()));

        let service = ReminderService::new(Arc::new(store), Arc::new(notifier));

        let first = service.sweep().await.unwrap();
        assert_eq!(first.failed, 1);
        assert_eq!(first.sent, 0);

        let second = service.sweep().await.unwrap();
        assert_eq!(second.sent, 1);
        assert_eq!(second.failed, 0);
    }

    #[tokio::test]
    async fn claimed_milestone_is_not_resent() {
        let mut store = MockReminderStore::new();
        // No send and no release expectations: the mocks panic if either
        // is reached
        let notifier = MockNotifier::new();

        store
            .expect_list_for_reminders()
            .returning(|| Ok(vec![loan_past_due(5, 2)]));
        store
            .expect_claim_notification()
            .withf(|&id, key| id == 5 && key == "overdue_2")
            .times(1)
            .returning(|_, _| Ok(false));

        let service = ReminderService::new(Arc::new(store), Arc::new(notifier));
        let outcome = service.sweep().await.unwrap();
        assert_eq!(outcome.skipped_duplicates, 1);
        assert_eq!(outcome.sent, 0);
    }

    #[tokio::test]
    async fn active_loan_past_due_is_promoted_between_milestones() {
        let mut store = MockReminderStore::new();
        let notifier = MockNotifier::new();

        // One day past due: no milestone fires, the promotion still must
        let mut loan = loan_past_due(8, 1);
        loan.status = LoanStatus::Active;
        store
            .expect_list_for_reminders()
            .return_once(move || Ok(vec![loan]));
        store
            .expect_mark_overdue()
            .withf(|&id| id == 8)
            .times(1)
            .returning(|_| Ok(true));

        let service = ReminderService::new(Arc::new(store), Arc::new(notifier));
        let outcome = service.sweep().await.unwrap();
        assert_eq!(outcome.promoted, 1);
        assert_eq!(outcome.sent, 0);
        assert_eq!(outcome.examined, 1);
    }
}
