//! Subscription endpoints

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    extract::{AppJson, AppPath},
    models::subscription::{
        CreateSubscriptionRequest, NewSubscription, Subscription, SubscriptionPlan,
        SubscriptionQuery,
    },
    state::AppState,
};

/// List subscriptions; statuses are refreshed against the current time
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionQuery>,
) -> ApiResult<Json<Vec<Subscription>>> {
    let subscriptions = state
        .subscription_repository
        .list(&query, Utc::now())
        .await?;
    info!("Returned {} subscriptions", subscriptions.len());

    Ok(Json(subscriptions))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<Json<Subscription>> {
    let subscription = state
        .subscription_repository
        .find_by_id(id, Utc::now())
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription not found"))?;

    Ok(Json(subscription))
}

/// Sell a plan to the client of `user_id`
pub async fn create_subscription(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateSubscriptionRequest>,
) -> ApiResult<impl IntoResponse> {
    let start_date = payload.start_date.trim();
    if payload.user_id <= 0 || payload.plan.trim().is_empty() || start_date.is_empty() {
        return Err(ApiError::bad_request(
            "user_id, type and start_date are required",
        ));
    }

    let start_date = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").map_err(|_| {
        ApiError::bad_request("start_date must be a date in YYYY-MM-DD format")
    })?;

    let client_id = state
        .client_repository
        .find_id_by_user(payload.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Client not found for this user"))?;

    let plan: SubscriptionPlan = payload
        .plan
        .parse()
        .map_err(|e| ApiError::bad_request(format!("Invalid subscription type: {}", e)))?;

    let now = Utc::now();
    let new = NewSubscription::for_plan(client_id, plan, start_date, now)
        .ok_or_else(|| ApiError::bad_request("start_date is out of range"))?;

    let subscription = state.subscription_repository.create(&new, now).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// Cancel a subscription; cancellation is permanent
pub async fn cancel_subscription(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<Json<Subscription>> {
    let subscription = state
        .subscription_repository
        .cancel(id, Utc::now())
        .await?
        .ok_or_else(|| ApiError::not_found("Subscription not found"))?;

    Ok(Json(subscription))
}

pub async fn delete_subscription(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<StatusCode> {
    if !state.subscription_repository.delete(id).await? {
        return Err(ApiError::not_found("Subscription not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
