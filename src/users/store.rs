use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{NewUser, Role, User, UserPatch};
use crate::error::AppError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email is already taken")]
    DuplicateEmail,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AppError::conflict("Email is already taken"),
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UserDateField {
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl UserDateField {
    pub fn column(&self) -> &'static str {
        match self {
            UserDateField::CreatedAt => "created_at",
            UserDateField::UpdatedAt => "updated_at",
        }
    }

    pub fn of(&self, user: &User) -> OffsetDateTime {
        match self {
            UserDateField::CreatedAt => user.created_at,
            UserDateField::UpdatedAt => user.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DateRange {
    pub field: UserDateField,
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
}

impl DateRange {
    pub fn contains(&self, user: &User) -> bool {
        let at = self.field.of(user);
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

/// Filters, ordering and pagination for user listings.
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub date_range: Option<DateRange>,
    pub order: SortOrder,
    pub order_by: UserDateField,
    pub limit: u64,
    pub page: u64,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            email: None,
            role: None,
            date_range: None,
            order: SortOrder::Desc,
            order_by: UserDateField::CreatedAt,
            limit: 10,
            page: 1,
        }
    }
}

impl UserFilter {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// Persistence port for user records. The postgres and in-memory
/// backends are interchangeable behind it.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    /// Fails with `DuplicateEmail` when the email is already used.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    /// Returns `None` when no user has this id.
    async fn update(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError>;

    /// Returns `false` when no user has this id.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// One page of matching users plus the total match count.
    async fn list(&self, filter: &UserFilter) -> Result<(Vec<User>, u64), StoreError>;
}
