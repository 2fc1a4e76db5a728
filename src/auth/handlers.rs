use std::time::Duration;

use axum::{
    extract::{Path, State},
    middleware::from_fn_with_state,
    routing::post,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        ChangeEmailRequest, ChangePasswordRequest, DeleteProfileRequest, ForgotPasswordRequest,
        LoginRequest, LoginResponse, ResetPasswordRequest, SignUpRequest,
    },
    extractors::AuthUser,
    services,
};
use crate::{
    error::AppResult,
    payload::Payload,
    response::DefaultResponse,
    state::AppState,
    throttle::throttle,
    users::model::PublicUser,
};

const MINUTE: Duration = Duration::from_secs(60);

pub fn auth_routes(state: &AppState) -> Router<AppState> {
    let limited = |scope: &'static str, limit: u32| {
        from_fn_with_state(state.throttle(scope, limit, MINUTE), throttle)
    };

    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/sign-up", post(sign_up).layer(limited("sign-up", 2)))
        .route("/auth/sign-up/:token", post(confirm_sign_up))
        .route(
            "/auth/forgot-password",
            post(forgot_password).layer(limited("forgot-password", 1)),
        )
        .route("/auth/reset-password/:token", post(reset_password))
        .route(
            "/auth/change-email",
            post(change_email).layer(limited("change-email", 1)),
        )
        .route("/auth/change-email/:token", post(confirm_change_email))
        .route("/auth/change-password", post(change_password))
        .route(
            "/auth/delete-profile",
            post(delete_profile).layer(limited("delete-profile", 1)),
        )
        .route("/auth/delete-profile/:token", post(confirm_delete_profile))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Payload(payload): Payload<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    Ok(Json(services::login(&state, payload).await?))
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    Payload(payload): Payload<SignUpRequest>,
) -> AppResult<DefaultResponse<()>> {
    services::initiate_registration(&state, payload).await
}

#[instrument(skip(state, token))]
pub async fn confirm_sign_up(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<DefaultResponse<PublicUser>> {
    services::confirm_registration(&state, &token).await
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Payload(payload): Payload<ForgotPasswordRequest>,
) -> AppResult<DefaultResponse<()>> {
    services::forgot_password(&state, payload).await
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Payload(payload): Payload<ResetPasswordRequest>,
) -> AppResult<DefaultResponse<()>> {
    services::reset_password(&state, &token, payload).await
}

#[instrument(skip(state, user, payload))]
pub async fn change_email(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(payload): Payload<ChangeEmailRequest>,
) -> AppResult<DefaultResponse<()>> {
    services::initiate_email_change(&state, &user, payload).await
}

#[instrument(skip(state, _user, token))]
pub async fn confirm_change_email(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(token): Path<String>,
) -> AppResult<DefaultResponse<()>> {
    services::confirm_email_change(&state, &token).await
}

#[instrument(skip(state, user, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(payload): Payload<ChangePasswordRequest>,
) -> AppResult<DefaultResponse<()>> {
    services::change_password(&state, &user, payload).await
}

#[instrument(skip(state, user, payload))]
pub async fn delete_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(payload): Payload<DeleteProfileRequest>,
) -> AppResult<DefaultResponse<()>> {
    services::initiate_deletion(&state, &user, payload).await
}

#[instrument(skip(state, _user, token))]
pub async fn confirm_delete_profile(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(token): Path<String>,
) -> AppResult<DefaultResponse<()>> {
    services::confirm_deletion(&state, &token).await
}
