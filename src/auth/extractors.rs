use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{claims::fingerprint_matches, jwt::JwtKeys};
use crate::{
    error::AppError,
    state::AppState,
    users::model::{Role, User},
};

/// The live user behind a valid access token. Rejects with 401 when the
/// token is bad, the user is gone, or the password changed since issue.
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.0.role) {
            Ok(())
        } else {
            warn!(user_id = %self.0.id, role = %self.0.role, "role not allowed");
            Err(AppError::Forbidden)
        }
    }
}

fn bearer(parts: &Parts) -> Option<&str> {
    let auth = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or_else(|| {
            warn!("missing or malformed Authorization header");
            AppError::Unauthorized
        })?;

        let claims = JwtKeys::from_ref(state)
            .verify_access(token)
            .map_err(|_| AppError::Unauthorized)?;

        let user = state
            .users
            .find_by_email(&claims.email)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| {
                warn!(email = %claims.email, "token user no longer exists");
                AppError::Unauthorized
            })?;

        if user.id != claims.id
            || user.email != claims.email
            || !fingerprint_matches(&user.password_hash, &claims.hash)
        {
            warn!(user_id = %user.id, "stale access token");
            return Err(AppError::Unauthorized);
        }

        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::password::hash_password,
        users::model::{NewUser, UserPatch},
    };
    use axum::http::Request;

    async fn seeded(state: &AppState, role: Role) -> User {
        state
            .users
            .create(NewUser {
                email: "a@b.com".into(),
                password_hash: hash_password("abc123").unwrap(),
                role,
            })
            .await
            .unwrap()
    }

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/users/profile");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn accepts_current_token() {
        let state = AppState::fake();
        let user = seeded(&state, Role::Admin).await;
        let token = JwtKeys::from_ref(&state).sign_access(&user).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let AuthUser(found) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_or_else(|_| panic!("token should be accepted"));
        assert_eq!(found.id, user.id);
        assert!(AuthUser(found).require_role(&[Role::Admin, Role::Superadmin]).is_ok());
    }

    #[tokio::test]
    async fn rejects_missing_header_and_garbage() {
        let state = AppState::fake();
        for header in [None, Some("Basic abc"), Some("Bearer "), Some("Bearer nope")] {
            let mut parts = parts_with(header);
            let err = AuthUser::from_request_parts(&mut parts, &state).await.err().unwrap();
            assert!(matches!(err, AppError::Unauthorized));
        }
    }

    #[tokio::test]
    async fn rejects_token_after_password_change() {
        let state = AppState::fake();
        let user = seeded(&state, Role::User).await;
        let token = JwtKeys::from_ref(&state).sign_access(&user).unwrap();
        state
            .users
            .update(user.id, UserPatch::password_hash(hash_password("xyz789").unwrap()))
            .await
            .unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {token}")));
        let err = AuthUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn role_allow_list() {
        let state = AppState::fake();
        let user = seeded(&state, Role::User).await;
        let err = AuthUser(user).require_role(&[Role::Admin]).unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }
}
