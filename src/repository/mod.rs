//! Repository layer for database operations

pub mod books;
pub mod loans;
pub mod notifications;
pub mod requests;
pub mod settings;
pub mod users;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub loans: loans::LoansRepository,
    pub requests: requests::RequestsRepository,
    pub notifications: notifications::NotificationsRepository,
    pub users: users::UsersRepository,
    pub settings: settings::SettingsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            requests: requests::RequestsRepository::new(pool.clone()),
            notifications: notifications::NotificationsRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            settings: settings::SettingsRepository::new(pool.clone()),
            pool,
        }
    }
}
