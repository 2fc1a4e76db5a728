use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{AccessClaims, Claims, PendingAction, TokenKind};
use crate::{config::JwtConfig, error::AppError, state::AppState, users::model::User};

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub confirmation_ttl: Duration,
    pub registration_ttl: Duration,
}

fn minutes(m: i64) -> Duration {
    Duration::from_secs(m.max(0) as u64 * 60)
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: minutes(cfg.ttl_minutes),
            confirmation_ttl: minutes(cfg.confirmation_ttl_minutes),
            registration_ttl: minutes(cfg.registration_ttl_minutes),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn issue<T: Serialize>(
        &self,
        kind: TokenKind,
        payload: T,
        ttl: Duration,
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
            data: payload,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(kind = ?kind, ttl_secs = ttl.as_secs(), "jwt signed");
        Ok(token)
    }

    /// Any failure (signature, shape, issuer, audience, kind, expiry)
    /// collapses into `InvalidOrExpiredToken`.
    pub fn verify<T: DeserializeOwned>(&self, kind: TokenKind, token: &str) -> Result<T, AppError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims<T>>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, kind = ?kind, "jwt rejected");
            AppError::InvalidOrExpiredToken
        })?;
        if data.claims.kind != kind {
            debug!(expected = ?kind, got = ?data.claims.kind, "jwt kind mismatch");
            return Err(AppError::InvalidOrExpiredToken);
        }
        debug!(kind = ?kind, "jwt verified");
        Ok(data.claims.data)
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        self.issue(TokenKind::Access, AccessClaims::from(user), self.access_ttl)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, AppError> {
        self.verify(TokenKind::Access, token)
    }

    pub fn sign_action(&self, action: &PendingAction) -> anyhow::Result<String> {
        let ttl = match action {
            PendingAction::Registration { .. } => self.registration_ttl,
            _ => self.confirmation_ttl,
        };
        self.issue(TokenKind::Confirmation, action, ttl)
    }

    pub fn verify_action(&self, token: &str) -> Result<PendingAction, AppError> {
        self.verify(TokenKind::Confirmation, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::model::Role;
    use uuid::Uuid;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
            confirmation_ttl_minutes: 15,
            registration_ttl_minutes: 60 * 24,
        })
    }

    fn user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: "a@b.com".into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$abcdefghij0123456789".into(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user = user();
        let token = keys.sign_access(&user).expect("sign access");
        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.id, user.id);
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.hash, "0123456789");
    }

    #[test]
    fn sign_and_verify_pending_action() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let action = PendingAction::PasswordReset { user_id: Uuid::new_v4() };
        let token = keys.sign_action(&action).expect("sign action");
        assert_eq!(keys.verify_action(&token).expect("verify action"), action);
    }

    #[test]
    fn access_and_confirmation_tokens_are_not_interchangeable() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let access = keys.sign_access(&user()).unwrap();
        assert!(matches!(
            keys.verify_action(&access),
            Err(AppError::InvalidOrExpiredToken)
        ));

        let action = keys
            .sign_action(&PendingAction::AccountDeletion { user_id: Uuid::new_v4() })
            .unwrap();
        assert!(matches!(
            keys.verify_access(&action),
            Err(AppError::InvalidOrExpiredToken)
        ));
    }

    #[test]
    fn tampered_and_malformed_tokens_are_rejected() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.sign_access(&user()).unwrap();

        let sig_start = token.rfind('.').unwrap() + 1;
        let first = &token[sig_start..sig_start + 1];
        let tampered = format!(
            "{}{}{}",
            &token[..sig_start],
            if first == "A" { "B" } else { "A" },
            &token[sig_start + 1..]
        );
        assert!(matches!(
            keys.verify_access(&tampered),
            Err(AppError::InvalidOrExpiredToken)
        ));

        assert!(matches!(
            keys.verify_access("not.a.jwt"),
            Err(AppError::InvalidOrExpiredToken)
        ));
        assert!(matches!(
            keys.verify_access(""),
            Err(AppError::InvalidOrExpiredToken)
        ));
    }

    #[test]
    fn verify_rejects_foreign_secret_issuer_or_audience() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let token = good.sign_access(&user()).unwrap();
        assert!(make_keys("same-secret", "bad-iss", "good-aud").verify_access(&token).is_err());
        assert!(make_keys("same-secret", "good-iss", "bad-aud").verify_access(&token).is_err());
        assert!(make_keys("other-secret", "good-iss", "good-aud").verify_access(&token).is_err());
    }

    #[tokio::test]
    async fn zero_ttl_token_expires() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let action = PendingAction::PasswordReset { user_id: Uuid::new_v4() };
        let token = keys
            .issue(TokenKind::Confirmation, &action, Duration::ZERO)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(matches!(
            keys.verify_action(&token),
            Err(AppError::InvalidOrExpiredToken)
        ));
    }
}
