//! Aggregate statistics queries

use chrono::Utc;
use sqlx::{PgPool, Row};

use crate::models::stats::Stats;

#[derive(Clone)]
pub struct StatsRepository {
    pool: PgPool,
}

impl StatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Collect all counters in a single round trip
    pub async fn collect(&self) -> sqlx::Result<Stats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM clients) AS total_clients,
                (SELECT COUNT(*) FROM employees) AS total_trainers,
                (SELECT COUNT(*) FROM trainings) AS total_trainings,
                (SELECT COUNT(*) FROM subscriptions
                    WHERE status = 'active'
                      AND (end_date + TIME '00:00') AT TIME ZONE 'UTC' >= $1)
                    AS active_subscriptions,
                (SELECT COALESCE(AVG(duration_minutes), 0)::float8 FROM trainings)
                    AS average_training_duration,
                (SELECT COUNT(*) FROM trainings
                    WHERE status = 'scheduled' AND start_time > $1) AS upcoming_trainings,
                (SELECT COUNT(*) FROM trainings WHERE status = 'completed') AS completed_trainings
            "#,
        )
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(Stats {
            total_users: row.try_get("total_users")?,
            total_clients: row.try_get("total_clients")?,
            total_trainers: row.try_get("total_trainers")?,
            total_trainings: row.try_get("total_trainings")?,
            active_subscriptions: row.try_get("active_subscriptions")?,
            average_training_duration: row.try_get("average_training_duration")?,
            upcoming_trainings: row.try_get("upcoming_trainings")?,
            completed_trainings: row.try_get("completed_trainings")?,
        })
    }
}
