//! Dashboard statistics

use serde::Serialize;

/// Aggregate counters over the whole club
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub total_users: i64,
    pub total_clients: i64,
    /// Rows in the employees table
    pub total_trainers: i64,
    pub total_trainings: i64,
    pub active_subscriptions: i64,
    /// Minutes; zero when there are no trainings
    pub average_training_duration: f64,
    pub upcoming_trainings: i64,
    pub completed_trainings: i64,
}
