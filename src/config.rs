use std::str::FromStr;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub confirmation_ttl_minutes: i64,
    pub registration_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// `None` switches to the log-only mailer.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: String,
    pub admin_mail: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    pub limit: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SuperadminSeed {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unknown USER_STORE backend: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub production: bool,
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub frontend_link: String,
    pub jwt: JwtConfig,
    pub mailer: MailerConfig,
    pub throttle: ThrottleConfig,
    pub superadmin: Option<SuperadminSeed>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("USER_STORE") {
            Ok(v) => v.parse()?,
            Err(_) => StoreBackend::Postgres,
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if store == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required when USER_STORE=postgres");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "userhub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "userhub-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
            confirmation_ttl_minutes: env_or("JWT_CONFIRMATION_TTL_MINUTES", 15),
            registration_ttl_minutes: env_or("JWT_REGISTRATION_TTL_MINUTES", 60 * 24),
        };

        let mailer = MailerConfig {
            smtp_host: std::env::var("SMTP_HOST").ok().filter(|h| !h.is_empty()),
            smtp_port: env_or("SMTP_PORT", 587),
            username: non_empty("SMTP_USERNAME"),
            password: non_empty("SMTP_PASSWORD"),
            sender: std::env::var("MAILER_SENDER")
                .unwrap_or_else(|_| "userhub <no-reply@localhost>".into()),
            admin_mail: non_empty("ADMIN_MAIL"),
        };

        let superadmin = match (
            std::env::var("SUPERADMIN_EMAIL"),
            std::env::var("SUPERADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) => Some(SuperadminSeed { email, password }),
            _ => None,
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            production: std::env::var("APP_ENV")
                .map(|v| v == "production")
                .unwrap_or(false),
            store,
            database_url,
            frontend_link: std::env::var("FRONTEND_LINK")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            jwt,
            mailer,
            throttle: ThrottleConfig {
                limit: env_or("API_REQUEST_LIMIT", 20),
                window_secs: env_or("API_REQUEST_WINDOW_SECS", 10),
            },
            superadmin,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
