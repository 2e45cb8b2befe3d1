//! Repositories for database operations

use std::str::FromStr;

use chrono::{Duration, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use crate::{
    auth::generate_token,
    error::{ApiError, ApiResult},
    models::{NewUser, Role, User, UserSummary, employee::DEFAULT_TRAINER_POSITION},
};

pub mod clients;
pub mod employees;
pub mod stats;
pub mod subscriptions;
pub mod trainings;

pub use clients::ClientRepository;
pub use employees::EmployeeRepository;
pub use stats::StatsRepository;
pub use subscriptions::SubscriptionRepository;
pub use trainings::TrainingRepository;

/// Read a text column into one of the closed enumerations
pub(crate) fn parse_text<T>(row: &PgRow, column: &str) -> sqlx::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn user_from_row(row: &PgRow) -> sqlx::Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: parse_text(row, "role")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Embedded user read from `user_name`, `user_email` and `user_role` aliases
pub(crate) fn user_summary_from_row(row: &PgRow, id_column: &str) -> sqlx::Result<UserSummary> {
    Ok(UserSummary {
        id: row.try_get(id_column)?,
        name: row.try_get("user_name")?,
        email: row.try_get("user_email")?,
        role: parse_text(row, "user_role")?,
    })
}

/// Conflict message for an email that is already registered
pub const EMAIL_TAKEN: &str = "A user with this email already exists";

/// Map a violation of the `users.email` unique constraint to a conflict
fn email_conflict(err: sqlx::Error) -> ApiError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::conflict(EMAIL_TAKEN),
        _ => ApiError::Database(err),
    }
}

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List users, optionally restricted to one role
    pub async fn list(&self, role: Option<Role>) -> sqlx::Result<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, email, role, created_at
            FROM users
            WHERE ($1::text IS NULL OR role = $1)
            ORDER BY id
            "#,
        )
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: i32) -> sqlx::Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, role, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Find a user and its password hash by normalized email
    pub async fn find_credentials(&self, email: &str) -> sqlx::Result<Option<(User, String)>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, password, role, created_at
            FROM users
            WHERE LOWER(TRIM(email)) = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let user = user_from_row(&row)?;
                let password: String = row.try_get("password")?;
                Ok(Some((user, password)))
            }
            None => Ok(None),
        }
    }

    /// Check whether an email is already taken
    pub async fn email_exists(&self, email: &str) -> sqlx::Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(TRIM(email)) = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
    }

    /// Create a user together with its client or employee row
    ///
    /// A `user` gets a client row; a `trainer` gets an employee row hired
    /// today. Both inserts share one transaction. Losing a race on the email
    /// unique constraint is a conflict.
    pub async fn create(&self, new_user: &NewUser) -> ApiResult<User> {
        info!("Creating user: {}", new_user.email);

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (name, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, role, created_at
            "#,
        )
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(email_conflict)?;
        let user = user_from_row(&row)?;

        match user.role {
            Role::User => {
                sqlx::query("INSERT INTO clients (user_id) VALUES ($1)")
                    .bind(user.id)
                    .execute(&mut *tx)
                    .await?;
                info!("Created client for user {}", user.id);
            }
            Role::Trainer => {
                sqlx::query(
                    "INSERT INTO employees (user_id, position, hire_date) VALUES ($1, $2, CURRENT_DATE)",
                )
                .bind(user.id)
                .bind(DEFAULT_TRAINER_POSITION)
                .execute(&mut *tx)
                .await?;
                info!("Created employee for trainer {}", user.id);
            }
            Role::Admin => {}
        }

        tx.commit().await?;
        Ok(user)
    }

    /// Delete a user; returns false when no row matched
    ///
    /// Trainings the user was registered for lose one participant first.
    pub async fn delete(&self, id: i32) -> sqlx::Result<bool> {
        info!("Deleting user: {}", id);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE trainings
            SET current_participants = GREATEST(current_participants - 1, 0)
            WHERE id IN (SELECT training_id FROM training_participants WHERE user_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Session repository for database operations
#[derive(Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a session for a user, valid for `ttl_hours`; returns its token
    pub async fn create(&self, user_id: i32, ttl_hours: i64) -> sqlx::Result<String> {
        info!("Creating session for user: {}", user_id);

        let expires_at = Utc::now() + Duration::hours(ttl_hours);
        sqlx::query_scalar(
            r#"
            INSERT INTO sessions (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING token
            "#,
        )
        .bind(user_id)
        .bind(generate_token())
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
    }

    /// Resolve a token to its user while the session has not expired
    pub async fn find_user_by_token(&self, token: &str) -> sqlx::Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.name, u.email, u.role, u.created_at
            FROM sessions s
            JOIN users u ON s.user_id = u.id
            WHERE s.token = $1 AND s.expires_at > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Delete the session holding `token`; absent sessions are not an error
    pub async fn delete(&self, token: &str) -> sqlx::Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
