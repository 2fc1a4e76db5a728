use async_trait::async_trait;
use tracing::info;

pub mod handlers;
pub mod smtp;
pub mod templates;

pub use smtp::SmtpMailer;

/// Plain-text message ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Outbound notification port. Implementations must be safe to share
/// across request tasks.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> anyhow::Result<()>;
}

/// Used when no SMTP host is configured: the message is written to the
/// log instead of being delivered.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        info!(
            to = %email.to,
            reply_to = ?email.reply_to,
            subject = %email.subject,
            body = %email.body,
            "email not delivered (no SMTP host configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
pub use recording::RecordingMailer;

#[cfg(test)]
mod recording {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{Email, Mailer};

    /// Keeps every message in memory so tests can follow emailed links.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<Email> {
            self.sent.lock().unwrap().clone()
        }

        pub fn last(&self) -> Option<Email> {
            self.sent.lock().unwrap().last().cloned()
        }

        /// Trailing path segment of the link in the latest message.
        pub fn last_token(&self) -> Option<String> {
            let email = self.last()?;
            let link = email.body.lines().find(|l| l.starts_with("http"))?;
            link.trim().rsplit('/').next().map(str::to_string)
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: Email) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(email);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_mailer_extracts_link_token() {
        let mailer = RecordingMailer::default();
        mailer
            .send(templates::password_reset(
                "a@b.com",
                "http://localhost:3000/auth/reset-password/tok.en.sig",
            ))
            .await
            .unwrap();
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(mailer.last_token().as_deref(), Some("tok.en.sig"));
    }

    #[tokio::test]
    async fn log_mailer_never_fails() {
        let email = templates::account_deletion("a@b.com", "http://x/settings/delete-profile/t");
        assert!(LogMailer.send(email).await.is_ok());
    }
}
