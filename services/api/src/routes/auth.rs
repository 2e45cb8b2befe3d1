//! Login, registration and session endpoints

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    auth::{hash_password, verify_password},
    error::{ApiError, ApiResult},
    extract::AppJson,
    middleware::AuthUser,
    models::{LoginRequest, LoginResponse, NewUser, RegisterRequest, Role, User},
    repositories::EMAIL_TAKEN,
    state::AppState,
    validation::{normalize_email, validate_email, validate_name, validate_password},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Exchange email and password for a session token
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = normalize_email(&payload.email);
    let password = payload.password.trim();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    info!("Login attempt: {}", email);

    let Some((user, password_hash)) = state.user_repository.find_credentials(&email).await?
    else {
        warn!("Login failed, unknown email: {}", email);
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    if !verify_password(password, &password_hash) {
        warn!("Login failed, wrong password for user {}", user.id);
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let token = state
        .session_repository
        .create(user.id, state.config.session_ttl_hours)
        .await?;

    info!("User {} ({}) logged in", user.name, user.role);
    Ok(Json(LoginResponse { token, user }))
}

/// Self-service registration of a `user` account, logged in immediately
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = payload.name.trim();
    let email = normalize_email(&payload.email);
    let password = payload.password.trim();

    validate_name(name).map_err(ApiError::BadRequest)?;
    validate_email(&email).map_err(ApiError::BadRequest)?;
    validate_password(password).map_err(ApiError::BadRequest)?;

    if state.user_repository.email_exists(&email).await? {
        return Err(ApiError::conflict(EMAIL_TAKEN));
    }

    let user = state
        .user_repository
        .create(&NewUser {
            name: name.to_string(),
            email,
            password_hash: hash_password(password)?,
            role: Role::User,
        })
        .await?;

    let token = state
        .session_repository
        .create(user.id, state.config.session_ttl_hours)
        .await?;

    info!("Registered user {}", user.id);
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse { token, user }),
    ))
}

/// Close the current session
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> ApiResult<impl IntoResponse> {
    state.session_repository.delete(&auth.token).await?;
    info!("User {} logged out", auth.id);

    Ok(Json(json!({ "message": "Logged out" })))
}

/// The authenticated user
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> ApiResult<Json<User>> {
    let user = state
        .user_repository
        .find_by_id(auth.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session token"))?;

    Ok(Json(user))
}
