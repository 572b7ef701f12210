//! Folio Book Lending Platform
//!
//! A Rust server for a library's book-lending platform: users borrow
//! physical copies, admins review loans, and users can request books not
//! yet in the catalog.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
