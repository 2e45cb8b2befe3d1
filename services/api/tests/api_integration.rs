//! End-to-end tests of the HTTP API against PostgreSQL
//!
//! Each test truncates every table first. They need a disposable database
//! reachable through the `DB_*` variables:
//! `cargo test -p fitclub-api -- --ignored`.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use serial_test::serial;
use sqlx::PgPool;
use tokio::task::JoinSet;
use tower::ServiceExt;

use common::database::{DatabaseConfig, init_pool};
use fitclub_api::{
    AppState,
    auth::hash_password,
    config::AppConfig,
    error::ApiError,
    models::{NewUser, Role, subscription::SubscriptionPlan},
    repositories::TrainingRepository,
    routes::{PARTICIPANT_HEADER, create_router},
};

const ADMIN_EMAIL: &str = "admin@fitclub.test";
const ADMIN_PASSWORD: &str = "admin123";

struct TestApp {
    router: Router,
    pool: PgPool,
}

impl TestApp {
    async fn start() -> Self {
        dotenvy::dotenv().ok();
        let db_config = DatabaseConfig::from_env().unwrap();
        let pool = init_pool(&db_config).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        sqlx::query(
            "TRUNCATE sessions, training_participants, trainings, subscriptions, employees, clients, users RESTART IDENTITY CASCADE",
        )
        .execute(&pool)
        .await
        .unwrap();

        let state = AppState::new(pool.clone(), AppConfig::default());
        state
            .user_repository
            .create(&NewUser {
                name: "Admin".to_string(),
                email: ADMIN_EMAIL.to_string(),
                password_hash: hash_password(ADMIN_PASSWORD).unwrap(),
                role: Role::Admin,
            })
            .await
            .unwrap();

        Self {
            router: create_router(state),
            pool,
        }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        send(self.router.clone(), build_request(method, uri, token, body)).await
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Create an account through the API and return its id
    async fn create_user(&self, admin: &str, name: &str, role: &str) -> i64 {
        let email = format!("{}@fitclub.test", name.to_lowercase());
        let (status, body) = self
            .call(
                Method::POST,
                "/api/users",
                Some(admin),
                Some(json!({ "name": name, "email": email, "password": "pw", "role": role })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}

fn build_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, token);
    }
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Registration request made by an admin on behalf of `user_id`
fn register_on_behalf(training_id: i64, admin: &str, user_id: i64) -> Request<Body> {
    let mut request = build_request(
        Method::POST,
        &format!("/api/trainings/{training_id}/register"),
        Some(admin),
        None,
    );
    request
        .headers_mut()
        .insert(PARTICIPANT_HEADER, user_id.to_string().parse().unwrap());
    request
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_login_session_lifecycle() {
    let app = TestApp::start().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "  ADMIN@fitclub.test ", "password": ADMIN_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);
    assert_eq!(body["user"]["role"], "admin");
    assert!(body["user"].get("password").is_none());

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, me) = app.call(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], ADMIN_EMAIL);

    let (status, _) = app
        .call(Method::POST, "/api/auth/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_register_creates_client_and_session() {
    let app = TestApp::start().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Maria", "email": "maria@fitclub.test", "password": "pw" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "user");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, clients) = app.call(Method::GET, "/api/clients", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clients.as_array().unwrap().len(), 1);
    assert_eq!(clients[0]["user_id"], body["user"]["id"]);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Maria", "email": "maria@fitclub.test", "password": "pw" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_user_creation_cascades_by_role() {
    let app = TestApp::start().await;
    let admin = app.admin_token().await;

    let client_user = app.create_user(&admin, "Ivan", "user").await;
    let trainer = app.create_user(&admin, "Olga", "trainer").await;

    let (_, clients) = app.call(Method::GET, "/api/clients", Some(&admin), None).await;
    let clients = clients.as_array().unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0]["user_id"].as_i64(), Some(client_user));

    let (_, employees) = app.call(Method::GET, "/api/employees", Some(&admin), None).await;
    let employees = employees.as_array().unwrap();
    assert_eq!(employees.len(), 1);
    assert_eq!(employees[0]["user_id"].as_i64(), Some(trainer));
    assert_eq!(employees[0]["position"], "Trainer");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({ "name": "Ivan", "email": "ivan@fitclub.test" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/users/{client_user}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/users/{client_user}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_role_gates() {
    let app = TestApp::start().await;
    let admin = app.admin_token().await;
    app.create_user(&admin, "Petr", "user").await;
    let user = app.login("petr@fitclub.test", "pw").await;

    let (status, _) = app.call(Method::GET, "/api/stats", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(Method::DELETE, "/api/users/1", Some(&user), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.call(Method::GET, "/api/users/abc", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, stats) = app.call(Method::GET, "/api/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_users"], 2);
    assert_eq!(stats["total_clients"], 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_subscription_terms_and_cancellation() {
    let app = TestApp::start().await;
    let admin = app.admin_token().await;
    let user_id = app.create_user(&admin, "Anna", "user").await;

    let today = Utc::now().date_naive();
    let (status, sub) = app
        .call(
            Method::POST,
            "/api/subscriptions",
            Some(&admin),
            Some(json!({
                "user_id": user_id,
                "type": "monthly",
                "start_date": today.format("%Y-%m-%d").to_string(),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{sub}");
    let end = SubscriptionPlan::Monthly.end_date(today).unwrap();
    assert_eq!(sub["end_date"], end.format("%Y-%m-%d").to_string());
    assert_eq!(sub["price"], 2000.0);
    assert_eq!(sub["status"], "active");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/subscriptions",
            Some(&admin),
            Some(json!({ "user_id": user_id, "type": "weekly", "start_date": "2024-01-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, old) = app
        .call(
            Method::POST,
            "/api/subscriptions",
            Some(&admin),
            Some(json!({ "user_id": user_id, "type": "monthly", "start_date": "2020-01-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(old["status"], "expired");

    let id = sub["id"].as_i64().unwrap();
    let (status, cancelled) = app
        .call(
            Method::POST,
            &format!("/api/subscriptions/{id}/cancel"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (_, active) = app
        .call(
            Method::GET,
            "/api/subscriptions?status=active",
            Some(&admin),
            None,
        )
        .await;
    assert!(active.as_array().unwrap().is_empty());
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_registration_workflow() {
    let app = TestApp::start().await;
    let admin = app.admin_token().await;
    let anna = app.create_user(&admin, "Anna", "user").await;
    app.create_user(&admin, "Boris", "user").await;
    app.create_user(&admin, "Olga", "trainer").await;
    let anna_token = app.login("anna@fitclub.test", "pw").await;
    let boris_token = app.login("boris@fitclub.test", "pw").await;
    let trainer_token = app.login("olga@fitclub.test", "pw").await;

    let (status, training) = app
        .call(
            Method::POST,
            "/api/trainings",
            Some(&trainer_token),
            Some(json!({
                "title": "Stretching",
                "type": "personal",
                "hall_type": "pilates",
                "start_time": "2030-05-01T10:00:00Z",
                "max_participants": 5,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{training}");
    assert_eq!(training["max_participants"], 1);
    assert_eq!(training["duration_minutes"], 60);
    let id = training["id"].as_i64().unwrap();
    let register = format!("/api/trainings/{id}/register");
    let cancel = format!("/api/trainings/{id}/cancel");

    // No subscription yet
    let (status, _) = app.call(Method::POST, &register, Some(&anna_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
    for user_id in [anna, anna + 1] {
        let (status, _) = app
            .call(
                Method::POST,
                "/api/subscriptions",
                Some(&admin),
                Some(json!({ "user_id": user_id, "type": "yearly", "start_date": today })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, participant) = app.call(Method::POST, &register, Some(&anna_token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(participant["status"], "registered");

    let (status, _) = app.call(Method::POST, &register, Some(&boris_token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, training) = app
        .call(Method::GET, &format!("/api/trainings/{id}"), Some(&admin), None)
        .await;
    assert_eq!(training["current_participants"], 1);
    assert_eq!(training["participants"].as_array().unwrap().len(), 1);

    let (status, _) = app.call(Method::POST, &cancel, Some(&boris_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call(Method::POST, &cancel, Some(&anna_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, training) = app
        .call(Method::GET, &format!("/api/trainings/{id}"), Some(&admin), None)
        .await;
    assert_eq!(training["current_participants"], 0);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/trainings/{id}/status"),
            Some(&trainer_token),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/trainings/{id}/status"),
            Some(&admin),
            Some(json!({ "status": "scheduled" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.call(Method::POST, &register, Some(&anna_token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_expired_session_is_unauthorized() {
    let app = TestApp::start().await;
    let admin = app.admin_token().await;

    sqlx::query("UPDATE sessions SET expires_at = $2 WHERE token = $1")
        .bind(&admin)
        .bind(Utc::now() - Duration::minutes(1))
        .execute(&app.pool)
        .await
        .unwrap();

    let (status, body) = app.call(Method::GET, "/api/auth/me", Some(&admin), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_concurrent_duplicate_emails_conflict() {
    let app = TestApp::start().await;
    let admin = app.admin_token().await;

    for round in 0..3 {
        let email = format!("twin{round}@fitclub.test");
        let mut requests = JoinSet::new();
        for _ in 0..8 {
            let request = build_request(
                Method::POST,
                "/api/users",
                Some(&admin),
                Some(json!({ "name": "Twin", "email": &email, "password": "pw" })),
            );
            requests.spawn(send(app.router.clone(), request));
        }

        let mut statuses = Vec::new();
        while let Some(result) = requests.join_next().await {
            let (status, body) = result.unwrap();
            if status == StatusCode::CONFLICT {
                assert_eq!(body["error"], "A user with this email already exists");
            }
            statuses.push(status);
        }

        assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
        assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count(), 7);
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_admin_registers_on_behalf_and_duplicates_conflict() {
    let app = TestApp::start().await;
    let admin = app.admin_token().await;
    let pavel = app.create_user(&admin, "Pavel", "user").await;

    let (status, training) = app
        .call(
            Method::POST,
            "/api/trainings",
            Some(&admin),
            Some(json!({
                "title": "Yoga",
                "type": "group",
                "hall_type": "yoga",
                "start_time": "2030-05-01T10:00:00Z",
                "max_participants": 3,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{training}");
    let id = training["id"].as_i64().unwrap();

    // Admin registrations skip the subscription check
    let (status, participant) =
        send(app.router.clone(), register_on_behalf(id, &admin, pavel)).await;
    assert_eq!(status, StatusCode::CREATED, "{participant}");
    assert_eq!(participant["user_id"].as_i64(), Some(pavel));

    let (status, _) = send(app.router.clone(), register_on_behalf(id, &admin, pavel)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, training) = app
        .call(Method::GET, &format!("/api/trainings/{id}"), Some(&admin), None)
        .await;
    assert_eq!(training["current_participants"], 1);
    let participants = training["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["user_id"].as_i64(), Some(pavel));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_concurrent_registrations_respect_capacity() {
    let app = TestApp::start().await;
    let admin = app.admin_token().await;

    let mut users = Vec::new();
    for n in 0..10 {
        users.push(app.create_user(&admin, &format!("Guest{n}"), "user").await);
    }

    let (status, training) = app
        .call(
            Method::POST,
            "/api/trainings",
            Some(&admin),
            Some(json!({
                "title": "Crossfit",
                "type": "group",
                "hall_type": "gym",
                "start_time": "2030-06-01T18:00:00Z",
                "max_participants": 2,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{training}");
    let id = training["id"].as_i64().unwrap();

    let mut requests = JoinSet::new();
    for user_id in users {
        requests.spawn(send(app.router.clone(), register_on_behalf(id, &admin, user_id)));
    }

    let mut created = 0;
    while let Some(result) = requests.join_next().await {
        let (status, body) = result.unwrap();
        match status {
            StatusCode::CREATED => created += 1,
            StatusCode::BAD_REQUEST => {}
            other => panic!("unexpected {other}: {body}"),
        }
    }
    assert_eq!(created, 2);

    let (_, training) = app
        .call(Method::GET, &format!("/api/trainings/{id}"), Some(&admin), None)
        .await;
    assert_eq!(training["current_participants"], 2);
    assert_eq!(training["participants"].as_array().unwrap().len(), 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_update_of_vanished_training_is_not_found() {
    let app = TestApp::start().await;
    let admin = app.admin_token().await;

    let (status, training) = app
        .call(
            Method::POST,
            "/api/trainings",
            Some(&admin),
            Some(json!({
                "title": "Boxing",
                "type": "personal",
                "hall_type": "gym",
                "start_time": "2030-07-01T09:00:00Z",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{training}");
    let id = training["id"].as_i64().unwrap() as i32;

    let repository = TrainingRepository::new(app.pool.clone());
    let mut stale = repository.find_by_id(id).await.unwrap().unwrap();
    assert!(repository.delete(id).await.unwrap());

    stale.title = "Kickboxing".to_string();
    let err = repository.update(&stale).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)), "{err}");
}
