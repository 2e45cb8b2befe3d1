//! Employee models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::UserSummary;

/// Position given to employees created alongside a trainer account
pub const DEFAULT_TRAINER_POSITION: &str = "Trainer";

/// Employee entity; one-to-one with a staff account
#[derive(Debug, Clone, Serialize)]
pub struct Employee {
    pub id: i32,
    pub user_id: i32,
    pub position: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<f64>,
    pub hire_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

/// Request for employee creation
#[derive(Debug, Deserialize)]
pub struct CreateEmployeeRequest {
    #[serde(default)]
    pub user_id: i32,
    #[serde(default)]
    pub position: String,
    pub salary: Option<f64>,
    /// Defaults to today
    pub hire_date: Option<NaiveDate>,
}

/// Employee update payload
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEmployeeRequest {
    pub position: Option<String>,
    pub salary: Option<f64>,
    pub hire_date: Option<NaiveDate>,
}
