use std::{sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::{
    config::{AppConfig, StoreBackend},
    mailer::{LogMailer, Mailer, SmtpMailer},
    throttle::{RateLimiter, Throttle},
    users::{memory::MemoryUserStore, pg::PgUserStore, store::UserStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub mailer: Arc<dyn Mailer>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let users = match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is not set")?;
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to postgres")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                info!("postgres user store ready");
                Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>
            }
            StoreBackend::Memory => {
                info!("in-memory user store ready; data is lost on restart");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };

        let mailer = match &config.mailer.smtp_host {
            Some(host) => {
                info!(%host, port = config.mailer.smtp_port, "smtp mailer configured");
                Arc::new(SmtpMailer::new(&config.mailer)?) as Arc<dyn Mailer>
            }
            None => {
                info!("SMTP_HOST not set; emails are logged instead of sent");
                Arc::new(LogMailer) as Arc<dyn Mailer>
            }
        };

        Ok(Self::from_parts(config, users, mailer))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config,
            users,
            mailer,
            limiter: Arc::new(RateLimiter::new()),
        }
    }

    pub fn throttle(&self, scope: &'static str, limit: u32, window: Duration) -> Throttle {
        Throttle {
            scope,
            limit,
            window,
            limiter: self.limiter.clone(),
        }
    }

    /// Global limit from `API_REQUEST_LIMIT` / `API_REQUEST_WINDOW_SECS`.
    pub fn global_throttle(&self) -> Throttle {
        let cfg = self.config.throttle;
        self.throttle("global", cfg.limit, Duration::from_secs(cfg.window_secs))
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with_outbox().0
    }

    /// In-memory state plus the mailer that collects what it would send.
    #[cfg(test)]
    pub fn fake_with_outbox() -> (Self, Arc<crate::mailer::RecordingMailer>) {
        use crate::config::{JwtConfig, MailerConfig, ThrottleConfig};

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            production: false,
            store: StoreBackend::Memory,
            database_url: None,
            frontend_link: "http://localhost:3000".into(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                confirmation_ttl_minutes: 15,
                registration_ttl_minutes: 60 * 24,
            },
            mailer: MailerConfig {
                smtp_host: None,
                smtp_port: 587,
                username: None,
                password: None,
                sender: "userhub <no-reply@localhost>".into(),
                admin_mail: Some("admin@localhost.dev".into()),
            },
            throttle: ThrottleConfig {
                limit: 10_000,
                window_secs: 60,
            },
            superadmin: None,
        });
        let outbox = Arc::new(crate::mailer::RecordingMailer::default());
        let state = Self::from_parts(
            config,
            Arc::new(MemoryUserStore::new()),
            outbox.clone(),
        );
        (state, outbox)
    }
}
