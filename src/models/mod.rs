//! Data models for Folio

pub mod book;
pub mod loan;
pub mod notification;
pub mod request;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use loan::{Loan, LoanDetails, LoanStatus};
pub use notification::LoanNotification;
pub use request::{BookRequest, RequestStatus};
pub use user::{User, UserClaims};
