//! Client endpoints

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::{ApiError, ApiResult},
    extract::{AppJson, AppPath},
    models::client::{Client, CreateClientRequest, UpdateClientRequest},
    state::AppState,
};

pub async fn list_clients(State(state): State<AppState>) -> ApiResult<Json<Vec<Client>>> {
    Ok(Json(state.client_repository.list().await?))
}

pub async fn get_client(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<Json<Client>> {
    let client = state
        .client_repository
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Client not found"))?;

    Ok(Json(client))
}

/// Attach a client row to an existing user
pub async fn create_client(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateClientRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.user_id <= 0 {
        return Err(ApiError::bad_request("user_id is required"));
    }

    if state
        .user_repository
        .find_by_id(payload.user_id)
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("User not found"));
    }

    if state
        .client_repository
        .find_id_by_user(payload.user_id)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict("Client already exists for this user"));
    }

    let client = state.client_repository.create(payload).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn update_client(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<UpdateClientRequest>,
) -> ApiResult<Json<Client>> {
    let client = state
        .client_repository
        .update(id, payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Client not found"))?;

    Ok(Json(client))
}

pub async fn delete_client(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<StatusCode> {
    if !state.client_repository.delete(id).await? {
        return Err(ApiError::not_found("Client not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
