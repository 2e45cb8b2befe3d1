//! Training models, capacity rules and the status state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{UserSummary, non_blank, text_enum};

/// Duration used when a training is created without one
pub const DEFAULT_DURATION_MINUTES: i32 = 60;

text_enum! {
    /// Personal trainings seat exactly one participant
    TrainingKind("training type") {
        Personal => "personal",
        Group => "group",
    }
}

text_enum! {
    HallType("hall type") {
        Pilates => "pilates",
        Yoga => "yoga",
        Gym => "gym",
        Dance => "dance",
        Cardio => "cardio",
    }
}

text_enum! {
    /// `completed` and `cancelled` are terminal
    TrainingStatus("training status") {
        Scheduled => "scheduled",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

text_enum! {
    ParticipantStatus("participant status") {
        Registered => "registered",
        Attended => "attended",
        Cancelled => "cancelled",
    }
}

impl TrainingKind {
    /// Resolve the seat count for this kind
    pub fn capacity(&self, requested: Option<i32>) -> Result<i32, String> {
        match self {
            TrainingKind::Personal => Ok(1),
            TrainingKind::Group => match requested {
                Some(max) if max >= 2 => Ok(max),
                _ => Err("Group training requires max_participants of at least 2".to_string()),
            },
        }
    }
}

impl TrainingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TrainingStatus::Scheduled)
    }

    /// Whether a training in this status may be moved to `next`
    pub fn can_become(&self, next: TrainingStatus) -> bool {
        *self == next || !self.is_terminal()
    }
}

/// Training entity with its trainer and participants
#[derive(Debug, Clone, Serialize)]
pub struct Training {
    pub id: i32,
    pub trainer_id: i32,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: TrainingKind,
    pub hall_type: HallType,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub max_participants: i32,
    pub current_participants: i32,
    pub status: TrainingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trainer: Option<UserSummary>,
    pub participants: Vec<Participant>,
}

/// Registration of a user for a training
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub id: i32,
    pub training_id: i32,
    pub user_id: i32,
    pub status: ParticipantStatus,
    pub registered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

/// Request for training creation
///
/// Enumerations are kept textual so that missing and unknown values are
/// reported separately.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTrainingRequest {
    pub trainer_id: Option<i32>,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub hall_type: String,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub max_participants: Option<i32>,
    pub status: Option<TrainingStatus>,
}

/// Validated training ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewTraining {
    pub trainer_id: i32,
    pub title: String,
    pub description: String,
    pub kind: TrainingKind,
    pub hall_type: HallType,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub max_participants: i32,
    pub status: TrainingStatus,
}

impl CreateTrainingRequest {
    /// Apply defaults and the capacity rules
    ///
    /// `trainer_id` falls back to `caller_id`; whether an explicit trainer
    /// exists is checked against the store by the caller.
    pub fn validate(self, caller_id: i32) -> Result<NewTraining, String> {
        let title = self.title.trim();
        if title.is_empty() || self.kind.trim().is_empty() || self.hall_type.trim().is_empty() {
            return Err("Title, type and hall_type are required".to_string());
        }

        let kind: TrainingKind = self.kind.parse().map_err(|e| format!("{}", e))?;
        let hall_type: HallType = self.hall_type.parse().map_err(|e| format!("{}", e))?;
        let start_time = self.start_time.ok_or("start_time is required")?;

        let duration_minutes = match self.duration_minutes {
            None | Some(0) => DEFAULT_DURATION_MINUTES,
            Some(d) if d > 0 => d,
            Some(_) => return Err("duration_minutes must be positive".to_string()),
        };

        Ok(NewTraining {
            trainer_id: self.trainer_id.filter(|id| *id > 0).unwrap_or(caller_id),
            title: title.to_string(),
            description: self.description.unwrap_or_default(),
            kind,
            hall_type,
            start_time,
            duration_minutes,
            max_participants: kind.capacity(self.max_participants)?,
            status: self.status.unwrap_or(TrainingStatus::Scheduled),
        })
    }
}

/// Training update payload; absent fields keep their stored value
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTrainingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<TrainingKind>,
    pub hall_type: Option<HallType>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub max_participants: Option<i32>,
    pub status: Option<TrainingStatus>,
}

impl UpdateTrainingRequest {
    /// Merge the update into `current`, enforcing capacity and status rules
    ///
    /// Returns the training to store. A status change out of a terminal
    /// state is reported through `UpdateRejection::Conflict`.
    pub fn apply(self, current: &Training) -> Result<Training, UpdateRejection> {
        let mut next = current.clone();

        if let Some(title) = non_blank(self.title) {
            next.title = title;
        }
        if let Some(description) = non_blank(self.description) {
            next.description = description;
        }
        if let Some(kind) = self.kind {
            next.kind = kind;
        }
        if let Some(hall_type) = self.hall_type {
            next.hall_type = hall_type;
        }
        if let Some(start_time) = self.start_time {
            next.start_time = start_time;
        }
        match self.duration_minutes {
            Some(d) if d > 0 => next.duration_minutes = d,
            Some(0) | None => {}
            Some(_) => {
                return Err(UpdateRejection::Invalid(
                    "duration_minutes must be positive".to_string(),
                ));
            }
        }

        let requested = self.max_participants.or(Some(next.max_participants));
        next.max_participants = next
            .kind
            .capacity(requested)
            .map_err(UpdateRejection::Invalid)?;
        if next.max_participants < next.current_participants {
            return Err(UpdateRejection::Invalid(format!(
                "max_participants cannot be lower than the {} registered participants",
                next.current_participants
            )));
        }

        if let Some(status) = self.status {
            next.status = current.status_change(status)?;
        }

        Ok(next)
    }
}

impl Training {
    /// Validate a move to `status` against the state machine
    pub fn status_change(&self, status: TrainingStatus) -> Result<TrainingStatus, UpdateRejection> {
        if self.status.can_become(status) {
            Ok(status)
        } else {
            Err(UpdateRejection::Conflict(format!(
                "Training is already {} and cannot become {}",
                self.status, status
            )))
        }
    }
}

/// Why a training update was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateRejection {
    Invalid(String),
    Conflict(String),
}

/// Status change payload
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: TrainingStatus,
}

/// Query parameters for training listing
#[derive(Debug, Default, Deserialize)]
pub struct TrainingQuery {
    pub status: Option<TrainingStatus>,
    pub hall_type: Option<HallType>,
    pub trainer_id: Option<i32>,
}
