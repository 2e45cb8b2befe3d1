//! Client repository

use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use super::user_summary_from_row;
use crate::models::{
    client::{Client, CreateClientRequest, UpdateClientRequest},
    non_blank,
};

const SELECT_CLIENTS: &str = r#"
    SELECT c.id, c.user_id, COALESCE(c.phone, '') AS phone, COALESCE(c.address, '') AS address,
           c.birth_date, c.created_at,
           u.name AS user_name, u.email AS user_email, u.role AS user_role
    FROM clients c
    JOIN users u ON u.id = c.user_id
"#;

fn client_from_row(row: &PgRow) -> sqlx::Result<Client> {
    Ok(Client {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        birth_date: row.try_get("birth_date")?,
        created_at: row.try_get("created_at")?,
        user: Some(user_summary_from_row(row, "user_id")?),
    })
}

/// Client repository for database operations
#[derive(Clone)]
pub struct ClientRepository {
    pool: PgPool,
}

impl ClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> sqlx::Result<Vec<Client>> {
        let rows = sqlx::query(&format!("{} ORDER BY c.id", SELECT_CLIENTS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(client_from_row).collect()
    }

    pub async fn find_by_id(&self, id: i32) -> sqlx::Result<Option<Client>> {
        let row = sqlx::query(&format!("{} WHERE c.id = $1", SELECT_CLIENTS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(client_from_row).transpose()
    }

    /// Client id of the account, if it has a client row
    pub async fn find_id_by_user(&self, user_id: i32) -> sqlx::Result<Option<i32>> {
        sqlx::query_scalar("SELECT id FROM clients WHERE user_id = $1 ORDER BY id LIMIT 1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn create(&self, req: CreateClientRequest) -> sqlx::Result<Client> {
        info!("Creating client for user: {}", req.user_id);

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO clients (user_id, phone, address, birth_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(req.user_id)
        .bind(non_blank(req.phone))
        .bind(non_blank(req.address))
        .bind(req.birth_date)
        .fetch_one(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Overwrite only the supplied non-blank fields
    pub async fn update(&self, id: i32, req: UpdateClientRequest) -> sqlx::Result<Option<Client>> {
        info!("Updating client: {}", id);

        let updated: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE clients
            SET phone = COALESCE($2, phone),
                address = COALESCE($3, address),
                birth_date = COALESCE($4, birth_date)
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(non_blank(req.phone))
        .bind(non_blank(req.address))
        .bind(req.birth_date)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(id) => self.find_by_id(id).await,
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: i32) -> sqlx::Result<bool> {
        info!("Deleting client: {}", id);

        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
