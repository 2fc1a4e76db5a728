use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info};

use super::{Email, Mailer};
use crate::config::MailerConfig;

/// SMTP delivery over STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &MailerConfig) -> anyhow::Result<Self> {
        let host = cfg.smtp_host.as_deref().context("SMTP_HOST is not set")?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("smtp relay {host}"))?
            .port(cfg.smtp_port)
            .pool_config(PoolConfig::new().max_size(4))
            .timeout(Some(Duration::from_secs(10)));
        if let (Some(username), Some(password)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        let sender = cfg
            .sender
            .parse()
            .with_context(|| format!("invalid MAILER_SENDER: {}", cfg.sender))?;
        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }

    fn build_message(&self, email: &Email) -> anyhow::Result<Message> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .to(email
                .to
                .parse()
                .with_context(|| format!("invalid to address: {}", email.to))?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(
                reply_to
                    .parse()
                    .with_context(|| format!("invalid reply-to address: {reply_to}"))?,
            );
        }
        Ok(builder.body(email.body.clone())?)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        let message = self.build_message(&email)?;
        match self.transport.send(message).await {
            Ok(_) => {
                info!(to = %email.to, subject = %email.subject, "email sent");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, to = %email.to, "smtp send failed");
                Err(anyhow::Error::new(e).context("smtp send"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MailerConfig {
        MailerConfig {
            smtp_host: Some("smtp.example.com".into()),
            smtp_port: 587,
            username: Some("user".into()),
            password: Some("pass".into()),
            sender: "userhub <no-reply@example.com>".into(),
            admin_mail: None,
        }
    }

    #[tokio::test]
    async fn builds_message_with_reply_to() {
        let mailer = SmtpMailer::new(&config()).expect("transport builds without connecting");
        let email = Email {
            to: "a@b.com".into(),
            reply_to: Some("guest@b.com".into()),
            subject: "Hi".into(),
            body: "Body".into(),
        };
        let formatted = String::from_utf8(mailer.build_message(&email).unwrap().formatted()).unwrap();
        assert!(formatted.contains("Reply-To: guest@b.com"));
        assert!(formatted.contains("To: a@b.com"));
        assert!(formatted.contains("Subject: Hi"));
    }

    #[tokio::test]
    async fn rejects_bad_addresses() {
        assert!(SmtpMailer::new(&MailerConfig {
            sender: "not an address".into(),
            ..config()
        })
        .is_err());
        assert!(SmtpMailer::new(&MailerConfig {
            smtp_host: None,
            ..config()
        })
        .is_err());

        let mailer = SmtpMailer::new(&config()).unwrap();
        let email = Email {
            to: "nope".into(),
            reply_to: None,
            subject: "Hi".into(),
            body: "Body".into(),
        };
        assert!(mailer.build_message(&email).is_err());
    }
}
