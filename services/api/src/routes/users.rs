//! User endpoints

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use crate::{
    auth::{generate_password, hash_password},
    error::{ApiError, ApiResult},
    extract::{AppJson, AppPath},
    models::{CreateUserRequest, NewUser, User, UserQuery, non_blank},
    repositories::EMAIL_TAKEN,
    state::AppState,
    validation::{normalize_email, validate_email, validate_name, validate_password},
};

/// List users, optionally filtered by role
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Vec<User>>> {
    let users = state.user_repository.list(query.role).await?;
    info!("Returned {} users", users.len());

    Ok(Json(users))
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<Json<User>> {
    let user = state
        .user_repository
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user))
}

/// Create a user; a client or employee row is created alongside
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = payload.name.trim();
    let email = normalize_email(&payload.email);
    validate_name(name).map_err(ApiError::BadRequest)?;
    validate_email(&email).map_err(ApiError::BadRequest)?;

    let password = match non_blank(payload.password) {
        Some(password) => {
            validate_password(&password).map_err(ApiError::BadRequest)?;
            password
        }
        None => generate_password(),
    };

    if state.user_repository.email_exists(&email).await? {
        return Err(ApiError::conflict(EMAIL_TAKEN));
    }

    let user = state
        .user_repository
        .create(&NewUser {
            name: name.to_string(),
            email,
            password_hash: hash_password(&password)?,
            role: payload.role.unwrap_or_default(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Delete a user and everything it owns
pub async fn delete_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<StatusCode> {
    if !state.user_repository.delete(id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
