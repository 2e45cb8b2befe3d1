//! Training endpoints and participant registration

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

use super::PARTICIPANT_HEADER;
use crate::{
    error::{ApiError, ApiResult},
    extract::{AppJson, AppPath},
    middleware::AuthUser,
    models::{
        Role,
        training::{
            CreateTrainingRequest, StatusUpdateRequest, Training, TrainingQuery,
            UpdateRejection, UpdateTrainingRequest,
        },
    },
    state::AppState,
};

impl From<UpdateRejection> for ApiError {
    fn from(rejection: UpdateRejection) -> Self {
        match rejection {
            UpdateRejection::Invalid(msg) => ApiError::BadRequest(msg),
            UpdateRejection::Conflict(msg) => ApiError::Conflict(msg),
        }
    }
}

/// List trainings filtered by status, hall type and trainer
pub async fn list_trainings(
    State(state): State<AppState>,
    Query(query): Query<TrainingQuery>,
) -> ApiResult<Json<Vec<Training>>> {
    let trainings = state.training_repository.list(&query).await?;
    info!("Returned {} trainings", trainings.len());

    Ok(Json(trainings))
}

pub async fn get_training(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<Json<Training>> {
    Ok(Json(find_training(&state, id).await?))
}

async fn find_training(state: &AppState, id: i32) -> ApiResult<Training> {
    state
        .training_repository
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Training not found"))
}

/// Only the assigned trainer or an admin may edit a training
fn ensure_can_edit(auth: &AuthUser, training: &Training) -> ApiResult<()> {
    if auth.role.is_admin() || auth.id == training.trainer_id {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only the training's trainer or an admin can modify it",
        ))
    }
}

pub async fn create_training(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(payload): AppJson<CreateTrainingRequest>,
) -> ApiResult<impl IntoResponse> {
    let explicit_trainer = payload.trainer_id.filter(|id| *id > 0);
    let new = payload.validate(auth.id).map_err(ApiError::BadRequest)?;

    if let Some(trainer_id) = explicit_trainer {
        let trainer = state
            .user_repository
            .find_by_id(trainer_id)
            .await?
            .ok_or_else(|| ApiError::bad_request("Trainer not found"))?;
        if !trainer.role.is_staff() {
            return Err(ApiError::bad_request(
                "The selected user is not a trainer",
            ));
        }
    }

    let training = state.training_repository.create(&new).await?;
    Ok((StatusCode::CREATED, Json(training)))
}

pub async fn update_training(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<UpdateTrainingRequest>,
) -> ApiResult<Json<Training>> {
    let current = find_training(&state, id).await?;
    ensure_can_edit(&auth, &current)?;

    let next = payload.apply(&current)?;
    let training = state.training_repository.update(&next).await?;

    Ok(Json(training))
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<StatusUpdateRequest>,
) -> ApiResult<Json<Training>> {
    let current = find_training(&state, id).await?;
    ensure_can_edit(&auth, &current)?;

    let status = current.status_change(payload.status)?;
    state.training_repository.set_status(id, status).await?;

    Ok(Json(find_training(&state, id).await?))
}

pub async fn delete_training(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<StatusCode> {
    if !state.training_repository.delete(id).await? {
        return Err(ApiError::not_found("Training not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Participant an admin names through the participant header
///
/// Ignored for other roles and for values that are not an id.
fn participant_override(auth: &AuthUser, headers: &HeaderMap) -> Option<i32> {
    if auth.role != Role::Admin {
        return None;
    }

    headers
        .get(PARTICIPANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Register the caller, or the user named by an admin, for a training
pub async fn register(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i32>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let user_id = match participant_override(&auth, &headers) {
        Some(user_id) => {
            info!("Admin {} registers user {}", auth.id, user_id);
            if state.user_repository.find_by_id(user_id).await?.is_none() {
                return Err(ApiError::not_found("User not found"));
            }
            user_id
        }
        None => auth.id,
    };

    let participant = state
        .training_repository
        .register(id, user_id, !auth.role.is_staff())
        .await?;

    Ok((StatusCode::CREATED, Json(participant)))
}

/// Withdraw the caller's registration
pub async fn cancel_registration(
    State(state): State<AppState>,
    auth: AuthUser,
    AppPath(id): AppPath<i32>,
) -> ApiResult<impl IntoResponse> {
    if !state
        .training_repository
        .cancel_registration(id, auth.id)
        .await?
    {
        return Err(ApiError::not_found("Registration not found"));
    }

    Ok(Json(json!({ "message": "Registration cancelled" })))
}
