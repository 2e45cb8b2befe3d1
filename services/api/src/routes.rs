//! API service routes

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::ApiResult,
    middleware::{auth_middleware, require_admin, require_trainer_or_admin},
    state::AppState,
};

pub mod auth;
pub mod clients;
pub mod employees;
pub mod stats;
pub mod subscriptions;
pub mod trainings;
pub mod users;

/// Header an admin uses to register another user for a training
pub const PARTICIPANT_HEADER: &str = "x-participant-id";

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register));

    let authenticated_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/trainings", get(trainings::list_trainings))
        .route("/trainings/:id", get(trainings::get_training))
        .route("/trainings/:id/register", post(trainings::register))
        .route("/trainings/:id/cancel", post(trainings::cancel_registration))
        .route(
            "/clients",
            get(clients::list_clients).post(clients::create_client),
        )
        .route(
            "/clients/:id",
            get(clients::get_client).put(clients::update_client),
        )
        .route(
            "/subscriptions",
            get(subscriptions::list_subscriptions).post(subscriptions::create_subscription),
        )
        .route("/subscriptions/:id", get(subscriptions::get_subscription))
        .route(
            "/employees",
            get(employees::list_employees).post(employees::create_employee),
        )
        .route("/employees/:id", get(employees::get_employee));

    let staff_routes = Router::new()
        .route("/trainings", post(trainings::create_training))
        .route("/trainings/:id", put(trainings::update_training))
        .route("/trainings/:id/status", put(trainings::update_status))
        .route("/stats", get(stats::get_stats))
        .route_layer(middleware::from_fn(require_trainer_or_admin));

    let admin_routes = Router::new()
        .route("/users/:id", delete(users::delete_user))
        .route("/trainings/:id", delete(trainings::delete_training))
        .route("/clients/:id", delete(clients::delete_client))
        .route(
            "/subscriptions/:id",
            delete(subscriptions::delete_subscription),
        )
        .route(
            "/subscriptions/:id/cancel",
            post(subscriptions::cancel_subscription),
        )
        .route(
            "/employees/:id",
            put(employees::update_employee).delete(employees::delete_employee),
        )
        .route_layer(middleware::from_fn(require_admin));

    let protected_routes = authenticated_routes
        .merge(staff_routes)
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

/// Reflects the request origin and allows credentials
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(PARTICIPANT_HEADER),
        ])
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    common::database::health_check(&state.db_pool).await?;

    Ok(Json(json!({
        "status": "ok",
        "service": "fitclub-api"
    })))
}
