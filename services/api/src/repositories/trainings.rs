//! Training repository, including participant registration

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{info, warn};

use super::{parse_text, user_summary_from_row};
use crate::{
    error::{ApiError, ApiResult},
    models::training::{
        NewTraining, Participant, ParticipantStatus, Training, TrainingQuery, TrainingStatus,
    },
};

const SELECT_TRAININGS: &str = r#"
    SELECT t.id, t.trainer_id, t.title, t.description, t.type, t.hall_type, t.start_time,
           t.duration_minutes, t.max_participants, t.current_participants, t.status, t.created_at,
           u.name AS user_name, u.email AS user_email, u.role AS user_role
    FROM trainings t
    JOIN users u ON u.id = t.trainer_id
"#;

fn training_from_row(row: &PgRow) -> sqlx::Result<Training> {
    Ok(Training {
        id: row.try_get("id")?,
        trainer_id: row.try_get("trainer_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        kind: parse_text(row, "type")?,
        hall_type: parse_text(row, "hall_type")?,
        start_time: row.try_get("start_time")?,
        duration_minutes: row.try_get("duration_minutes")?,
        max_participants: row.try_get("max_participants")?,
        current_participants: row.try_get("current_participants")?,
        status: parse_text(row, "status")?,
        created_at: row.try_get("created_at")?,
        trainer: Some(user_summary_from_row(row, "trainer_id")?),
        participants: Vec::new(),
    })
}

fn participant_from_row(row: &PgRow) -> sqlx::Result<Participant> {
    Ok(Participant {
        id: row.try_get("id")?,
        training_id: row.try_get("training_id")?,
        user_id: row.try_get("user_id")?,
        status: parse_text(row, "status")?,
        registered_at: row.try_get("registered_at")?,
        user: None,
    })
}

/// Training repository for database operations
#[derive(Clone)]
pub struct TrainingRepository {
    pool: PgPool,
}

impl TrainingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List trainings by start time, each with its participants
    pub async fn list(&self, query: &TrainingQuery) -> sqlx::Result<Vec<Training>> {
        let rows = sqlx::query(&format!(
            r#"{}
            WHERE ($1::text IS NULL OR t.status = $1)
              AND ($2::text IS NULL OR t.hall_type = $2)
              AND ($3::int IS NULL OR t.trainer_id = $3)
            ORDER BY t.start_time ASC"#,
            SELECT_TRAININGS
        ))
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.hall_type.map(|h| h.as_str()))
        .bind(query.trainer_id)
        .fetch_all(&self.pool)
        .await?;

        let mut trainings = rows
            .iter()
            .map(training_from_row)
            .collect::<sqlx::Result<Vec<_>>>()?;
        self.attach_participants(&mut trainings).await?;

        Ok(trainings)
    }

    pub async fn find_by_id(&self, id: i32) -> sqlx::Result<Option<Training>> {
        let row = sqlx::query(&format!("{} WHERE t.id = $1", SELECT_TRAININGS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut trainings = vec![training_from_row(&row)?];
        self.attach_participants(&mut trainings).await?;

        Ok(trainings.pop())
    }

    /// Load participants of all `trainings` in one query
    async fn attach_participants(&self, trainings: &mut [Training]) -> sqlx::Result<()> {
        if trainings.is_empty() {
            return Ok(());
        }

        let ids: Vec<i32> = trainings.iter().map(|t| t.id).collect();
        let rows = sqlx::query(
            r#"
            SELECT tp.id, tp.training_id, tp.user_id, tp.status, tp.registered_at,
                   u.name AS user_name, u.email AS user_email, u.role AS user_role
            FROM training_participants tp
            JOIN users u ON u.id = tp.user_id
            WHERE tp.training_id = ANY($1)
            ORDER BY tp.registered_at, tp.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let positions: HashMap<i32, usize> = trainings
            .iter()
            .enumerate()
            .map(|(index, t)| (t.id, index))
            .collect();

        for row in &rows {
            let mut participant = participant_from_row(row)?;
            participant.user = Some(user_summary_from_row(row, "user_id")?);
            if let Some(&index) = positions.get(&participant.training_id) {
                trainings[index].participants.push(participant);
            }
        }

        Ok(())
    }

    pub async fn create(&self, new: &NewTraining) -> sqlx::Result<Training> {
        info!("Creating training: {}", new.title);

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO trainings (trainer_id, title, description, type, hall_type, start_time,
                                   duration_minutes, max_participants, current_participants, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9)
            RETURNING id
            "#,
        )
        .bind(new.trainer_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.kind.as_str())
        .bind(new.hall_type.as_str())
        .bind(new.start_time)
        .bind(new.duration_minutes)
        .bind(new.max_participants)
        .bind(new.status.as_str())
        .fetch_one(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Store the editable fields of `training`
    ///
    /// The capacity guard is repeated in SQL so that a registration committed
    /// since `training` was read cannot end up over capacity.
    pub async fn update(&self, training: &Training) -> ApiResult<Training> {
        info!("Updating training: {}", training.id);

        let result = sqlx::query(
            r#"
            UPDATE trainings
            SET title = $2, description = $3, type = $4, hall_type = $5, start_time = $6,
                duration_minutes = $7, max_participants = $8, status = $9
            WHERE id = $1 AND current_participants <= $8
            "#,
        )
        .bind(training.id)
        .bind(&training.title)
        .bind(&training.description)
        .bind(training.kind.as_str())
        .bind(training.hall_type.as_str())
        .bind(training.start_time)
        .bind(training.duration_minutes)
        .bind(training.max_participants)
        .bind(training.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM trainings WHERE id = $1)")
                    .bind(training.id)
                    .fetch_one(&self.pool)
                    .await?;
            if !exists {
                return Err(ApiError::not_found("Training not found"));
            }
            return Err(ApiError::bad_request(
                "max_participants cannot be lower than the registered participants",
            ));
        }

        self.find_by_id(training.id)
            .await?
            .ok_or_else(|| ApiError::not_found("Training not found"))
    }

    pub async fn set_status(&self, id: i32, status: TrainingStatus) -> sqlx::Result<bool> {
        info!("Training {} status -> {}", id, status);

        let result = sqlx::query("UPDATE trainings SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i32) -> sqlx::Result<bool> {
        info!("Deleting training: {}", id);

        let result = sqlx::query("DELETE FROM trainings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Register `user_id` for a training
    ///
    /// Runs under a row lock on the training, so the capacity check, the
    /// duplicate check and both writes see a consistent counter. With
    /// `require_subscription` the user must hold an active subscription.
    pub async fn register(
        &self,
        training_id: i32,
        user_id: i32,
        require_subscription: bool,
    ) -> ApiResult<Participant> {
        info!("Registering user {} for training {}", user_id, training_id);

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT max_participants, current_participants, status
            FROM trainings
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(training_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Training not found"))?;

        let status: TrainingStatus = parse_text(&row, "status")?;
        if status != TrainingStatus::Scheduled {
            return Err(ApiError::bad_request(format!(
                "Cannot register for a {} training",
                status
            )));
        }

        let max: i32 = row.try_get("max_participants")?;
        let current: i32 = row.try_get("current_participants")?;
        if current >= max {
            return Err(ApiError::bad_request("No free places left"));
        }

        let already: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM training_participants WHERE training_id = $1 AND user_id = $2)",
        )
        .bind(training_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        if already {
            return Err(ApiError::conflict("Already registered for this training"));
        }

        if require_subscription {
            let active: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1
                    FROM clients c
                    JOIN subscriptions s ON s.client_id = c.id
                    WHERE c.user_id = $1
                      AND s.status = 'active'
                      AND (s.end_date + TIME '00:00') AT TIME ZONE 'UTC' >= $2
                )
                "#,
            )
            .bind(user_id)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;
            if !active {
                warn!("User {} has no active subscription", user_id);
                return Err(ApiError::forbidden(
                    "An active subscription is required to register for trainings",
                ));
            }
        }

        let row = sqlx::query(
            r#"
            INSERT INTO training_participants (training_id, user_id, status)
            VALUES ($1, $2, $3)
            RETURNING id, training_id, user_id, status, registered_at
            "#,
        )
        .bind(training_id)
        .bind(user_id)
        .bind(ParticipantStatus::Registered.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let participant = participant_from_row(&row)?;

        sqlx::query(
            "UPDATE trainings SET current_participants = current_participants + 1 WHERE id = $1",
        )
        .bind(training_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(participant)
    }

    /// Remove the registration of `user_id`; `false` when there was none
    pub async fn cancel_registration(&self, training_id: i32, user_id: i32) -> sqlx::Result<bool> {
        info!(
            "Cancelling registration of user {} for training {}",
            user_id, training_id
        );

        let mut tx = self.pool.begin().await?;

        // Serializes with concurrent registrations on the same training.
        sqlx::query("SELECT id FROM trainings WHERE id = $1 FOR UPDATE")
            .bind(training_id)
            .fetch_optional(&mut *tx)
            .await?;

        let result =
            sqlx::query("DELETE FROM training_participants WHERE training_id = $1 AND user_id = $2")
                .bind(training_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE trainings
            SET current_participants = GREATEST(current_participants - $2, 0)
            WHERE id = $1
            "#,
        )
        .bind(training_id)
        .bind(result.rows_affected() as i32)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}
