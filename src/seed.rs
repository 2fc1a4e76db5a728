use tracing::{info, warn};

use crate::{
    auth::password::{hash_password, is_valid_email, is_valid_password},
    state::AppState,
    users::{
        model::{NewUser, Role},
        store::StoreError,
    },
};

/// Creates the configured superadmin unless that email already exists.
/// Returns whether an account was created.
pub async fn ensure_superadmin(state: &AppState) -> anyhow::Result<bool> {
    let Some(seed) = &state.config.superadmin else {
        return Ok(false);
    };
    let email = seed.email.trim();
    if !is_valid_email(email) || !is_valid_password(&seed.password) {
        anyhow::bail!("SUPERADMIN_EMAIL or SUPERADMIN_PASSWORD does not meet the account policy");
    }
    if state.users.exists_by_email(email).await? {
        info!(%email, "superadmin already present");
        return Ok(false);
    }
    let created = state
        .users
        .create(NewUser {
            email: email.to_string(),
            password_hash: hash_password(&seed.password)?,
            role: Role::Superadmin,
        })
        .await;
    match created {
        Ok(user) => {
            info!(user_id = %user.id, %email, "superadmin created");
            Ok(true)
        }
        Err(StoreError::DuplicateEmail) => {
            warn!(%email, "superadmin created concurrently");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SuperadminSeed;

    fn with_seed(email: &str, password: &str) -> AppState {
        let mut state = AppState::fake();
        let mut config = (*state.config).clone();
        config.superadmin = Some(SuperadminSeed {
            email: email.into(),
            password: password.into(),
        });
        state.config = Arc::new(config);
        state
    }

    #[tokio::test]
    async fn seeds_once() {
        let state = with_seed("root@corp.com", "rootpass1");
        assert!(ensure_superadmin(&state).await.unwrap());
        assert!(!ensure_superadmin(&state).await.unwrap());
        let root = state.users.find_by_email("root@corp.com").await.unwrap().unwrap();
        assert_eq!(root.role, Role::Superadmin);
        assert_ne!(root.password_hash, "rootpass1");
    }

    #[tokio::test]
    async fn skipped_without_config_and_rejects_weak_password() {
        assert!(!ensure_superadmin(&AppState::fake()).await.unwrap());
        assert!(ensure_superadmin(&with_seed("root@corp.com", "weak")).await.is_err());
    }
}
