use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::UpdateUserRequest,
    model::{PublicUser, Role, User, UserPatch},
    store::{UserFilter, UserStore},
};
use crate::{
    auth::password::hash_password_async,
    error::{AppError, AppResult},
    response::PaginatedResponse,
};

pub async fn find_by_id(users: &dyn UserStore, id: Uuid) -> AppResult<User> {
    users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User with id {id} not found")))
}

pub async fn find_by_email(users: &dyn UserStore, email: &str) -> AppResult<User> {
    users
        .find_by_email(email)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User with email {email} does not exist")))
}

pub async fn list_users(
    users: &dyn UserStore,
    filter: &UserFilter,
) -> AppResult<PaginatedResponse<PublicUser>> {
    let (page, total) = users.list(filter).await?;
    Ok(PaginatedResponse::new(
        page.into_iter().map(PublicUser::from).collect(),
        total,
        filter.limit,
        filter.page,
    ))
}

/// Moves `user` to `new_email`. The store's unique constraint still
/// guards the race between the check and the write.
pub async fn change_email(users: &dyn UserStore, user: &User, new_email: &str) -> AppResult<User> {
    let new_email = new_email.trim();
    if user.email == new_email {
        return Err(AppError::conflict("New email must differ from the current one"));
    }
    if users.exists_by_email(new_email).await? {
        return Err(AppError::conflict(format!("Email {new_email} is already taken")));
    }
    let updated = users
        .update(user.id, UserPatch::email(new_email))
        .await?
        .ok_or_else(|| AppError::not_found(format!("User with id {} not found", user.id)))?;
    info!(user_id = %updated.id, "email changed");
    Ok(updated)
}

pub async fn update_user(
    users: &dyn UserStore,
    requester: &User,
    id: Uuid,
    req: UpdateUserRequest,
) -> AppResult<User> {
    let target = find_by_id(users, id).await?;
    if target.role == Role::Superadmin && requester.role != Role::Superadmin {
        warn!(requester = %requester.id, target = %target.id, "admin tried to edit a superadmin");
        return Err(AppError::Forbidden);
    }

    if let Some(email) = &req.email {
        return change_email(users, &target, email).await;
    }

    let mut patch = UserPatch::default();
    if let Some(role) = req.role {
        if requester.role != Role::Superadmin {
            return Err(AppError::Forbidden);
        }
        if requester.id == target.id {
            return Err(AppError::conflict("You cannot change your own role"));
        }
        patch.role = Some(role);
    }
    if let Some(password) = req.password {
        patch.password_hash = Some(hash_password_async(password).await?);
    }
    if patch.is_empty() {
        return Err(AppError::bad_request("Nothing to update"));
    }

    let updated = users
        .update(target.id, patch)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User with id {id} not found")))?;
    info!(requester = %requester.id, user_id = %updated.id, "user updated");
    Ok(updated)
}

/// A superadmin may delete anyone but themselves; everyone else only
/// themselves.
pub fn ensure_can_delete(requester: &User, target: &User) -> AppResult<()> {
    let is_self = requester.id == target.id;
    match requester.role {
        Role::Superadmin if is_self => Err(AppError::Forbidden),
        Role::Superadmin => Ok(()),
        _ if is_self => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

/// Removes the account and returns its last known email.
pub async fn delete_user(users: &dyn UserStore, requester: &User, id: Uuid) -> AppResult<String> {
    let target = find_by_id(users, id).await?;
    ensure_can_delete(requester, &target)?;
    if !users.delete(target.id).await? {
        return Err(AppError::not_found(format!("User with id {id} not found")));
    }
    info!(requester = %requester.id, user_id = %target.id, "user deleted");
    Ok(target.email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{memory::MemoryUserStore, model::NewUser};

    async fn user(store: &MemoryUserStore, email: &str, role: Role) -> User {
        store
            .create(NewUser {
                email: email.into(),
                password_hash: "$argon2id$placeholder0123456789".into(),
                role,
            })
            .await
            .unwrap()
    }

    #[test]
    fn deletion_permissions() {
        let now = time::OffsetDateTime::now_utc();
        let make = |role| User {
            id: Uuid::new_v4(),
            email: "x@y.com".into(),
            password_hash: String::new(),
            role,
            created_at: now,
            updated_at: now,
        };
        let root = make(Role::Superadmin);
        let admin = make(Role::Admin);
        let plain = make(Role::User);

        assert!(matches!(ensure_can_delete(&root, &root), Err(AppError::Forbidden)));
        assert!(ensure_can_delete(&root, &plain).is_ok());
        assert!(ensure_can_delete(&plain, &plain).is_ok());
        assert!(matches!(ensure_can_delete(&plain, &admin), Err(AppError::Forbidden)));
        assert!(matches!(ensure_can_delete(&admin, &plain), Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn change_email_conflicts() {
        let store = MemoryUserStore::new();
        let a = user(&store, "a@b.com", Role::User).await;
        user(&store, "taken@b.com", Role::User).await;

        let same = change_email(&store, &a, "a@b.com").await.unwrap_err();
        assert!(matches!(same, AppError::Conflict(_)));
        let taken = change_email(&store, &a, "taken@b.com").await.unwrap_err();
        assert!(matches!(taken, AppError::Conflict(m) if m == "Email taken@b.com is already taken"));

        let moved = change_email(&store, &a, " new@b.com ").await.unwrap();
        assert_eq!(moved.email, "new@b.com");
    }

    #[tokio::test]
    async fn role_edits_need_a_superadmin_acting_on_someone_else() {
        let store = MemoryUserStore::new();
        let root = user(&store, "root@b.com", Role::Superadmin).await;
        let admin = user(&store, "admin@b.com", Role::Admin).await;
        let plain = user(&store, "plain@b.com", Role::User).await;
        let promote = || UpdateUserRequest {
            role: Some(Role::Admin),
            ..Default::default()
        };

        let err = update_user(&store, &admin, plain.id, promote()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let err = update_user(&store, &root, root.id, promote()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = update_user(
            &store,
            &admin,
            root.id,
            UpdateUserRequest {
                password: Some("abc123".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let promoted = update_user(&store, &root, plain.id, promote()).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);
    }

    #[tokio::test]
    async fn email_edit_is_applied_alone() {
        let store = MemoryUserStore::new();
        let admin = user(&store, "admin@b.com", Role::Admin).await;
        let plain = user(&store, "plain@b.com", Role::User).await;
        let updated = update_user(
            &store,
            &admin,
            plain.id,
            UpdateUserRequest {
                email: Some("renamed@b.com".into()),
                password: Some("abc123".into()),
                role: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.email, "renamed@b.com");
        assert_eq!(updated.password_hash, plain.password_hash);
    }

    #[tokio::test]
    async fn delete_and_missing_users() {
        let store = MemoryUserStore::new();
        let root = user(&store, "root@b.com", Role::Superadmin).await;
        let plain = user(&store, "plain@b.com", Role::User).await;

        assert_eq!(delete_user(&store, &root, plain.id).await.unwrap(), "plain@b.com");
        let err = find_by_id(&store, plain.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(m) if m.contains(&plain.id.to_string())));
        let err = delete_user(&store, &root, plain.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn listing_wraps_page_metadata() {
        let store = MemoryUserStore::new();
        for i in 0..3 {
            user(&store, &format!("u{i}@b.com"), Role::User).await;
        }
        let filter = UserFilter {
            limit: 2,
            ..UserFilter::default()
        };
        let page = list_users(&store, &filter).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 2);
    }
}
