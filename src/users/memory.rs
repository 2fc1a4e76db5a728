use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    model::{NewUser, User, UserPatch},
    store::{SortOrder, StoreError, UserFilter, UserStore},
};

/// In-process user store. Used for local runs (`USER_STORE=memory`) and
/// tests; uniqueness is checked under the write lock.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        if let Some(email) = &patch.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn list(&self, filter: &UserFilter) -> Result<(Vec<User>, u64), StoreError> {
        let users = self.users.read().await;
        let needle = filter.email.as_ref().map(|e| e.to_lowercase());

        let mut matched: Vec<&User> = users
            .values()
            .filter(|u| {
                needle
                    .as_ref()
                    .map_or(true, |n| u.email.to_lowercase().contains(n))
            })
            .filter(|u| filter.role.map_or(true, |r| u.role == r))
            .filter(|u| filter.date_range.as_ref().map_or(true, |d| d.contains(u)))
            .collect();

        matched.sort_by_key(|u| filter.order_by.of(u));
        if filter.order == SortOrder::Desc {
            matched.reverse();
        }

        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(usize::try_from(filter.offset()).unwrap_or(usize::MAX))
            .take(filter.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}
