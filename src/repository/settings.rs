//! Lending policy settings repository.
//!
//! Policy scalars live in a single-row table; missing values fall back to
//! the defaults below so a fresh database behaves sensibly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres, Row};
use utoipa::ToSchema;

use crate::error::AppResult;

/// Policy scalars read by the lending engine
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LendingSettings {
    pub lending_enabled: bool,
    pub max_concurrent_loans: i32,
    pub loan_duration_days: i32,
    pub min_credit_to_request: Decimal,
}

impl Default for LendingSettings {
    fn default() -> Self {
        Self {
            lending_enabled: true,
            max_concurrent_loans: 5,
            loan_duration_days: 21,
            min_credit_to_request: Decimal::ZERO,
        }
    }
}

#[derive(Clone)]
pub struct SettingsRepository {
    pool: Pool<Postgres>,
}

impl SettingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get current lending settings
    pub async fn get(&self) -> AppResult<LendingSettings> {
        let row = sqlx::query(
            "SELECT lending_enabled, max_concurrent_loans, loan_duration_days, min_credit_to_request
             FROM lending_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let defaults = LendingSettings::default();
        Ok(match row {
            Some(row) => LendingSettings {
                lending_enabled: row
                    .get::<Option<bool>, _>("lending_enabled")
                    .unwrap_or(defaults.lending_enabled),
                max_concurrent_loans: row
                    .get::<Option<i32>, _>("max_concurrent_loans")
                    .unwrap_or(defaults.max_concurrent_loans),
                loan_duration_days: row
                    .get::<Option<i32>, _>("loan_duration_days")
                    .unwrap_or(defaults.loan_duration_days),
                min_credit_to_request: row
                    .get::<Option<Decimal>, _>("min_credit_to_request")
                    .unwrap_or(defaults.min_credit_to_request),
            },
            None => defaults,
        })
    }

    /// Update lending settings (insert-or-update on the single row)
    pub async fn update(&self, settings: &LendingSettings) -> AppResult<LendingSettings> {
        sqlx::query(
            r#"
            INSERT INTO lending_settings (id, lending_enabled, max_concurrent_loans, loan_duration_days, min_credit_to_request)
            VALUES (1, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                lending_enabled = EXCLUDED.lending_enabled,
                max_concurrent_loans = EXCLUDED.max_concurrent_loans,
                loan_duration_days = EXCLUDED.loan_duration_days,
                min_credit_to_request = EXCLUDED.min_credit_to_request
            "#,
        )
        .bind(settings.lending_enabled)
        .bind(settings.max_concurrent_loans)
        .bind(settings.loan_duration_days)
        .bind(settings.min_credit_to_request)
        .execute(&self.pool)
        .await?;

        self.get().await
    }
}
