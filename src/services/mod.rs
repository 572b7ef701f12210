//! Business logic services

pub mod email;
pub mod loans;
pub mod reminders;
pub mod requests;
pub mod settings;

use std::sync::Arc;

use crate::{config::EmailConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub loans: loans::LoansService,
    pub requests: requests::RequestsService,
    pub reminders: reminders::ReminderService,
    pub settings: settings::SettingsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, email_config: EmailConfig) -> AppResult<Self> {
        let notifier: Arc<dyn email::Notifier> = Arc::new(email::EmailService::new(email_config));

        Ok(Self {
            loans: loans::LoansService::new(repository.clone(), notifier.clone()),
            requests: requests::RequestsService::new(repository.clone(), notifier.clone()),
            reminders: reminders::ReminderService::new(Arc::new(repository.clone()), notifier),
            settings: settings::SettingsService::new(repository),
        })
    }
}
