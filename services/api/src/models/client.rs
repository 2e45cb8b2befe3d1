//! Client models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::UserSummary;

/// Client entity; one-to-one with a `user`-role account
#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub id: i32,
    pub user_id: i32,
    pub phone: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

/// Client embedded in a subscription
#[derive(Debug, Clone, Serialize)]
pub struct ClientSummary {
    pub id: i32,
    pub user_id: i32,
    pub phone: String,
    pub address: String,
}

/// Request for client creation
#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    #[serde(default)]
    pub user_id: i32,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// Client update payload; blank or missing fields keep their stored value
#[derive(Debug, Default, Deserialize)]
pub struct UpdateClientRequest {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
}
