//! Settings service

use crate::{
    error::AppResult,
    repository::{settings::LendingSettings, Repository},
};

#[derive(Clone)]
pub struct SettingsService {
    repository: Repository,
}

impl SettingsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get current lending settings
    pub async fn get_settings(&self) -> AppResult<LendingSettings> {
        self.repository.settings.get().await
    }

    /// Update lending settings
    pub async fn update_settings(&self, settings: LendingSettings) -> AppResult<LendingSettings> {
        self.repository.settings.update(&settings).await
    }
}
