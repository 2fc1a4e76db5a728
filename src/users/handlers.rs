use axum::{
    extract::{rejection::PathRejection, rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{UpdateUserRequest, UserQueryParams},
    model::{PublicUser, Role},
    services,
    store::UserFilter,
};
use crate::{
    auth::extractors::AuthUser,
    error::AppResult,
    payload::Payload,
    response::{DefaultResponse, PaginatedResponse},
    state::AppState,
};

const STAFF: &[Role] = &[Role::Admin, Role::Superadmin];

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/profile", get(profile))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, auth, query))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    query: Result<Query<UserQueryParams>, QueryRejection>,
) -> AppResult<Json<PaginatedResponse<PublicUser>>> {
    auth.require_role(STAFF)?;
    let Query(params) = query?;
    let filter = UserFilter::try_from(params)?;
    Ok(Json(services::list_users(state.users.as_ref(), &filter).await?))
}

#[instrument(skip(user))]
pub async fn profile(AuthUser(user): AuthUser) -> DefaultResponse<PublicUser> {
    DefaultResponse::with_data("User profile", PublicUser::from(user))
}

#[instrument(skip(state, auth))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<DefaultResponse<PublicUser>> {
    auth.require_role(STAFF)?;
    let Path(id) = id?;
    let user = services::find_by_id(state.users.as_ref(), id).await?;
    Ok(DefaultResponse::with_data(
        format!("User {} found", user.email),
        PublicUser::from(user),
    ))
}

#[instrument(skip(state, auth, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    Payload(payload): Payload<UpdateUserRequest>,
) -> AppResult<DefaultResponse<PublicUser>> {
    auth.require_role(STAFF)?;
    let Path(id) = id?;
    let updated = services::update_user(state.users.as_ref(), &auth.0, id, payload).await?;
    Ok(DefaultResponse::with_data(
        format!("User {} updated successfully", updated.email),
        PublicUser::from(updated),
    ))
}

#[instrument(skip(state, auth))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<DefaultResponse<()>> {
    auth.require_role(&[Role::Superadmin])?;
    let Path(id) = id?;
    let email = services::delete_user(state.users.as_ref(), &auth.0, id).await?;
    Ok(DefaultResponse::message(format!(
        "All user data {email} has been deleted successfully"
    )))
}
