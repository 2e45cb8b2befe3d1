//! Employee endpoints

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::{ApiError, ApiResult},
    extract::{AppJson, AppPath},
    models::employee::{CreateEmployeeRequest, Employee, UpdateEmployeeRequest},
    state::AppState,
};

pub async fn list_employees(State(state): State<AppState>) -> ApiResult<Json<Vec<Employee>>> {
    Ok(Json(state.employee_repository.list().await?))
}

pub async fn get_employee(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<Json<Employee>> {
    let employee = state
        .employee_repository
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    Ok(Json(employee))
}

/// Attach an employee row to an existing user
pub async fn create_employee(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateEmployeeRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.user_id <= 0 || payload.position.trim().is_empty() {
        return Err(ApiError::bad_request("user_id and position are required"));
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
        .employee_repository
        .exists_for_user(payload.user_id)
        .await?
    {
        return Err(ApiError::conflict("Employee already exists for this user"));
    }

    let employee = state.employee_repository.create(payload).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

pub async fn update_employee(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<UpdateEmployeeRequest>,
) -> ApiResult<Json<Employee>> {
    let employee = state
        .employee_repository
        .update(id, payload)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    Ok(Json(employee))
}

pub async fn delete_employee(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<StatusCode> {
    if !state.employee_repository.delete(id).await? {
        return Err(ApiError::not_found("Employee not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
