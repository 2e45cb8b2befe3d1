//! Subscription repository
//!
//! Reads recompute each subscription's status against the current time and
//! write changed statuses back, so stored rows converge on the derived value.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use super::parse_text;
use crate::models::{
    client::ClientSummary,
    subscription::{NewSubscription, Subscription, SubscriptionQuery, SubscriptionStatus},
};

const SELECT_SUBSCRIPTIONS: &str = r#"
    SELECT s.id, s.client_id, s.type, s.start_date, s.end_date, s.price, s.status, s.created_at,
           c.user_id AS client_user_id,
           COALESCE(c.phone, '') AS client_phone,
           COALESCE(c.address, '') AS client_address
    FROM subscriptions s
    JOIN clients c ON c.id = s.client_id
"#;

fn subscription_from_row(row: &PgRow) -> sqlx::Result<Subscription> {
    let client_id: i32 = row.try_get("client_id")?;
    Ok(Subscription {
        id: row.try_get("id")?,
        client_id,
        plan: parse_text(row, "type")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        price: row.try_get("price")?,
        status: parse_text(row, "status")?,
        created_at: row.try_get("created_at")?,
        client: Some(ClientSummary {
            id: client_id,
            user_id: row.try_get("client_user_id")?,
            phone: row.try_get("client_phone")?,
            address: row.try_get("client_address")?,
        }),
    })
}

/// Subscription repository for database operations
#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List subscriptions with refreshed statuses
    ///
    /// The status filter applies to the refreshed value.
    pub async fn list(
        &self,
        query: &SubscriptionQuery,
        now: DateTime<Utc>,
    ) -> sqlx::Result<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "{} WHERE ($1::int IS NULL OR s.client_id = $1) ORDER BY s.id",
            SELECT_SUBSCRIPTIONS
        ))
        .bind(query.client_id)
        .fetch_all(&self.pool)
        .await?;

        let mut subscriptions = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut subscription = subscription_from_row(row)?;
            self.refresh_status(&mut subscription, now).await?;
            if query.status.is_none_or(|status| status == subscription.status) {
                subscriptions.push(subscription);
            }
        }

        Ok(subscriptions)
    }

    pub async fn find_by_id(
        &self,
        id: i32,
        now: DateTime<Utc>,
    ) -> sqlx::Result<Option<Subscription>> {
        let row = sqlx::query(&format!("{} WHERE s.id = $1", SELECT_SUBSCRIPTIONS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut subscription = subscription_from_row(&row)?;
                self.refresh_status(&mut subscription, now).await?;
                Ok(Some(subscription))
            }
            None => Ok(None),
        }
    }

    /// Persist the derived status when it differs from the stored one
    async fn refresh_status(
        &self,
        subscription: &mut Subscription,
        now: DateTime<Utc>,
    ) -> sqlx::Result<()> {
        let derived =
            subscription
                .status
                .derive(subscription.start_date, subscription.end_date, now);
        if derived == subscription.status {
            return Ok(());
        }

        info!(
            "Subscription {} status {} -> {}",
            subscription.id, subscription.status, derived
        );
        self.set_status(subscription.id, derived).await?;
        subscription.status = derived;
        Ok(())
    }

    async fn set_status(&self, id: i32, status: SubscriptionStatus) -> sqlx::Result<bool> {
        let result = sqlx::query("UPDATE subscriptions SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn create(
        &self,
        new: &NewSubscription,
        now: DateTime<Utc>,
    ) -> sqlx::Result<Subscription> {
        info!(
            "Creating {} subscription for client: {}",
            new.plan, new.client_id
        );

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO subscriptions (client_id, type, start_date, end_date, price, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(new.client_id)
        .bind(new.plan.as_str())
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.price)
        .bind(new.status.as_str())
        .fetch_one(&self.pool)
        .await?;

        self.find_by_id(id, now)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Mark a subscription cancelled; `None` when it does not exist
    pub async fn cancel(&self, id: i32, now: DateTime<Utc>) -> sqlx::Result<Option<Subscription>> {
        info!("Cancelling subscription: {}", id);

        if !self.set_status(id, SubscriptionStatus::Cancelled).await? {
            return Ok(None);
        }
        self.find_by_id(id, now).await
    }

    pub async fn delete(&self, id: i32) -> sqlx::Result<bool> {
        info!("Deleting subscription: {}", id);

        let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
