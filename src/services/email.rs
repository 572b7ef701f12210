//! Email notifications.
//!
//! Engine code never talks to SMTP directly; it holds a [`Notifier`] and
//! the state-transition paths treat delivery as fire-and-forget. A failed
//! send must never roll back or surface into a loan transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
};

/// Outbound notification capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Due-date reminder. `days_diff` is the whole-day distance to the due
    /// date, negative once overdue.
    async fn send_loan_reminder(
        &self,
        to: &str,
        user_name: &str,
        book_title: &str,
        due_date: DateTime<Utc>,
        days_diff: i64,
    ) -> AppResult<()>;

    /// Confirmation that a returned loan was recorded
    async fn send_return_confirmation(
        &self,
        to: &str,
        user_name: &str,
        book_title: &str,
    ) -> AppResult<()>;

    /// A book request of this user can now be borrowed
    async fn send_request_fulfilled(
        &self,
        to: &str,
        user_name: &str,
        description: &str,
    ) -> AppResult<()>;
}

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Generic email sending function
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let from_name = self.config.smtp_from_name.as_deref().unwrap_or("Folio");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(format!(
                                r#"<html><body><pre>{}</pre></body></html>"#,
                                body.replace('\n', "<br>")
                            )),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        let mailer_builder = if self.config.smtp_use_tls {
            // Use STARTTLS for secure connection
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer_builder = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer_builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer_builder
        };

        let mailer = mailer_builder.build();

        mailer
            .send(&email)
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send_loan_reminder(
        &self,
        to: &str,
        user_name: &str,
        book_title: &str,
        due_date: DateTime<Utc>,
        days_diff: i64,
    ) -> AppResult<()> {
        let due = due_date.format("%Y-%m-%d");
        let (subject, opening) = if days_diff > 0 {
            (
                format!("Reminder: \"{}\" is due on {}", book_title, due),
                format!("your loan of \"{}\" is due in {} day(s), on {}.", book_title, days_diff, due),
            )
        } else if days_diff == 0 {
            (
                format!("\"{}\" is due today", book_title),
                format!("your loan of \"{}\" is due today, {}.", book_title, due),
            )
        } else {
            (
                format!("Overdue: \"{}\" was due on {}", book_title, due),
                format!(
                    "your loan of \"{}\" is {} day(s) overdue (due date was {}).",
                    book_title,
                    -days_diff,
                    due
                ),
            )
        };

        let body = format!(
            r#"
Hello {user_name},

This is a reminder that {opening}

Please return the book to the library, or contact us if you need more time.
"#
        );

        self.send_email(to, &subject, &body).await
    }

    async fn send_return_confirmation(
        &self,
        to: &str,
        user_name: &str,
        book_title: &str,
    ) -> AppResult<()> {
        let subject = format!("Return recorded: \"{}\"", book_title);
        let body = format!(
            r#"
Hello {user_name},

We have recorded the return of "{book_title}". Thank you!
"#
        );
        self.send_email(to, &subject, &body).await
    }

    async fn send_request_fulfilled(
        &self,
        to: &str,
        user_name: &str,
        description: &str,
    ) -> AppResult<()> {
        let subject = "A book you requested is now available".to_string();
        let body = format!(
            r#"
Hello {user_name},

Good news: {description} is now available in our catalog and can be borrowed.
"#
        );
        self.send_email(to, &subject, &body).await
    }
}
