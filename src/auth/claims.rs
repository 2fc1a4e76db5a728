use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::model::{Role, User};

/// Length of the password-hash suffix carried in access tokens.
pub const FINGERPRINT_LEN: usize = 10;

/// Type of JWT: session access or an emailed confirmation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Confirmation,
}

/// Envelope shared by every token we sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims<T> {
    pub iat: usize,      // issued at (unix timestamp)
    pub exp: usize,      // expires at (unix timestamp)
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // token type
    pub data: T,
}

/// Identity carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub hash: String,
}

impl From<&User> for AccessClaims {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            hash: password_fingerprint(&user.password_hash).to_string(),
        }
    }
}

/// Account mutation waiting for the user to follow an emailed link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PendingAction {
    Registration { email: String, password_hash: String },
    PasswordReset { user_id: Uuid },
    EmailChange { user_id: Uuid, new_email: String },
    AccountDeletion { user_id: Uuid },
}

impl PendingAction {
    pub fn name(&self) -> &'static str {
        match self {
            PendingAction::Registration { .. } => "registration",
            PendingAction::PasswordReset { .. } => "password_reset",
            PendingAction::EmailChange { .. } => "email_change",
            PendingAction::AccountDeletion { .. } => "account_deletion",
        }
    }
}

pub fn password_fingerprint(hash: &str) -> &str {
    let start = hash.len().saturating_sub(FINGERPRINT_LEN);
    hash.get(start..).unwrap_or(hash)
}

/// True while the credential that issued the token is still current.
pub fn fingerprint_matches(current_hash: &str, token_fingerprint: &str) -> bool {
    !token_fingerprint.is_empty() && password_fingerprint(current_hash) == token_fingerprint
}
