use axum::extract::FromRef;
use tracing::{info, warn};

use super::{
    claims::PendingAction,
    dto::{
        ChangeEmailRequest, ChangePasswordRequest, DeleteProfileRequest, ForgotPasswordRequest,
        LoginRequest, LoginResponse, ResetPasswordRequest, SignUpRequest,
    },
    jwt::JwtKeys,
    password::{hash_password_async, verify_password_async},
};
use crate::{
    error::{AppError, AppResult},
    mailer::{templates, Email},
    response::DefaultResponse,
    state::AppState,
    users::{
        model::{NewUser, PublicUser, Role, User, UserPatch},
        services as users,
    },
};

/// Link the frontend turns into a confirm call carrying `token`.
fn link(state: &AppState, path: &str, token: &str) -> String {
    format!(
        "{}/{}/{}",
        state.config.frontend_link.trim_end_matches('/'),
        path,
        token
    )
}

fn wrong_action(expected: &str, got: &PendingAction) -> AppError {
    warn!(expected, got = got.name(), "token carries a different action");
    AppError::InvalidOrExpiredToken
}

async fn send(state: &AppState, email: Email) -> AppResult<()> {
    state.mailer.send(email).await.map_err(AppError::Internal)
}

pub async fn login(state: &AppState, req: LoginRequest) -> AppResult<LoginResponse> {
    let email = req.email.trim();
    let user = users::find_by_email(state.users.as_ref(), email).await?;
    verify_password_async(req.password, user.password_hash.clone())
        .await
        .inspect_err(|_| {
            warn!(user_id = %user.id, "login invalid password");
        })?;
    let access_token = JwtKeys::from_ref(state).sign_access(&user)?;
    info!(user_id = %user.id, "user logged in");
    Ok(LoginResponse {
        access_token,
        user: user.into(),
    })
}

pub async fn initiate_registration(
    state: &AppState,
    req: SignUpRequest,
) -> AppResult<DefaultResponse<()>> {
    let email = req.email.trim().to_string();
    if state.users.exists_by_email(&email).await? {
        return Err(AppError::conflict(format!("User {email} already exists")));
    }
    let action = PendingAction::Registration {
        email: email.clone(),
        password_hash: hash_password_async(req.password).await?,
    };
    let token = JwtKeys::from_ref(state).sign_action(&action)?;
    send(
        state,
        templates::registration(&email, &link(state, "auth/sign-up", &token)),
    )
    .await?;
    info!(%email, "registration link sent");
    Ok(DefaultResponse::message(format!(
        "Confirmation link sent to your email {email}"
    )))
}

pub async fn confirm_registration(
    state: &AppState,
    token: &str,
) -> AppResult<DefaultResponse<PublicUser>> {
    let action = JwtKeys::from_ref(state).verify_action(token)?;
    let (email, password_hash) = match action {
        PendingAction::Registration {
            email,
            password_hash,
        } => (email, password_hash),
        other => return Err(wrong_action("registration", &other)),
    };
    if state.users.exists_by_email(&email).await? {
        return Err(AppError::conflict(format!("User {email} already exists")));
    }
    let user = state
        .users
        .create(NewUser {
            email,
            password_hash,
            role: Role::User,
        })
        .await?;
    info!(user_id = %user.id, "user registered");
    Ok(DefaultResponse::with_data(
        format!("User {} registered successfully", user.email),
        user.into(),
    ))
}

pub async fn forgot_password(
    state: &AppState,
    req: ForgotPasswordRequest,
) -> AppResult<DefaultResponse<()>> {
    let user = users::find_by_email(state.users.as_ref(), req.email.trim()).await?;
    let token = JwtKeys::from_ref(state).sign_action(&PendingAction::PasswordReset {
        user_id: user.id,
    })?;
    send(
        state,
        templates::password_reset(&user.email, &link(state, "auth/reset-password", &token)),
    )
    .await?;
    info!(user_id = %user.id, "password reset link sent");
    Ok(DefaultResponse::message(format!(
        "Password reset email sent on {}",
        user.email
    )))
}

pub async fn reset_password(
    state: &AppState,
    token: &str,
    req: ResetPasswordRequest,
) -> AppResult<DefaultResponse<()>> {
    let action = JwtKeys::from_ref(state).verify_action(token)?;
    let user_id = match action {
        PendingAction::PasswordReset { user_id } => user_id,
        other => return Err(wrong_action("password_reset", &other)),
    };
    let user = users::find_by_id(state.users.as_ref(), user_id).await?;
    let password_hash = hash_password_async(req.new_password).await?;
    state
        .users
        .update(user.id, UserPatch::password_hash(password_hash))
        .await?
        .ok_or_else(|| AppError::not_found(format!("User with id {user_id} not found")))?;
    info!(%user_id, "password reset");
    Ok(DefaultResponse::message("Password has been successfully changed"))
}

pub async fn initiate_email_change(
    state: &AppState,
    user: &User,
    req: ChangeEmailRequest,
) -> AppResult<DefaultResponse<()>> {
    verify_password_async(req.password, user.password_hash.clone()).await?;
    let new_email = req.new_email.trim().to_string();
    if new_email == user.email {
        return Err(AppError::conflict("New email must differ from the current one"));
    }
    if state.users.exists_by_email(&new_email).await? {
        return Err(AppError::conflict(format!("Email {new_email} is already taken")));
    }
    let token = JwtKeys::from_ref(state).sign_action(&PendingAction::EmailChange {
        user_id: user.id,
        new_email: new_email.clone(),
    })?;
    send(
        state,
        templates::email_change(&new_email, &link(state, "settings/change-email", &token)),
    )
    .await?;
    info!(user_id = %user.id, "email change link sent");
    Ok(DefaultResponse::message(format!(
        "Confirmation link sent on {new_email}"
    )))
}

pub async fn confirm_email_change(state: &AppState, token: &str) -> AppResult<DefaultResponse<()>> {
    let action = JwtKeys::from_ref(state).verify_action(token)?;
    let (user_id, new_email) = match action {
        PendingAction::EmailChange { user_id, new_email } => (user_id, new_email),
        other => return Err(wrong_action("email_change", &other)),
    };
    let user = users::find_by_id(state.users.as_ref(), user_id).await?;
    users::change_email(state.users.as_ref(), &user, &new_email).await?;
    Ok(DefaultResponse::message("Email changed successfully"))
}

/// Immediate change; the new hash retires every access token issued
/// under the old one.
pub async fn change_password(
    state: &AppState,
    user: &User,
    req: ChangePasswordRequest,
) -> AppResult<DefaultResponse<()>> {
    if req.old_password == req.new_password {
        return Err(AppError::conflict("New password must differ from the old one"));
    }
    verify_password_async(req.old_password, user.password_hash.clone()).await?;
    let password_hash = hash_password_async(req.new_password).await?;
    state
        .users
        .update(user.id, UserPatch::password_hash(password_hash))
        .await?
        .ok_or_else(|| AppError::not_found(format!("User with id {} not found", user.id)))?;
    info!(user_id = %user.id, "password changed");
    Ok(DefaultResponse::message("Password changed successfully"))
}

pub async fn initiate_deletion(
    state: &AppState,
    requester: &User,
    req: DeleteProfileRequest,
) -> AppResult<DefaultResponse<()>> {
    let target = users::find_by_id(state.users.as_ref(), req.id).await?;
    users::ensure_can_delete(requester, &target).inspect_err(|_| {
        warn!(requester = %requester.id, target = %target.id, "deletion not allowed");
    })?;
    let token = JwtKeys::from_ref(state).sign_action(&PendingAction::AccountDeletion {
        user_id: target.id,
    })?;
    send(
        state,
        templates::account_deletion(&target.email, &link(state, "settings/delete-profile", &token)),
    )
    .await?;
    info!(requester = %requester.id, target = %target.id, "deletion link sent");
    Ok(DefaultResponse::message(format!(
        "Confirmation link sent on {}",
        target.email
    )))
}

pub async fn confirm_deletion(state: &AppState, token: &str) -> AppResult<DefaultResponse<()>> {
    let action = JwtKeys::from_ref(state).verify_action(token)?;
    let user_id = match action {
        PendingAction::AccountDeletion { user_id } => user_id,
        other => return Err(wrong_action("account_deletion", &other)),
    };
    let user = users::find_by_id(state.users.as_ref(), user_id).await?;
    if !state.users.delete(user.id).await? {
        return Err(AppError::not_found(format!("User with id {user_id} not found")));
    }
    info!(%user_id, "account deleted");
    Ok(DefaultResponse::message(format!(
        "All user data {} has been deleted successfully",
        user.email
    )))
}
