//! Application state shared across handlers

use sqlx::PgPool;

use crate::{
    config::AppConfig,
    repositories::{
        ClientRepository, EmployeeRepository, SessionRepository, StatsRepository,
        SubscriptionRepository, TrainingRepository, UserRepository,
    },
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: AppConfig,
    pub user_repository: UserRepository,
    pub session_repository: SessionRepository,
    pub client_repository: ClientRepository,
    pub employee_repository: EmployeeRepository,
    pub subscription_repository: SubscriptionRepository,
    pub training_repository: TrainingRepository,
    pub stats_repository: StatsRepository,
}

impl AppState {
    /// Wire every repository onto one pool
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self {
            user_repository: UserRepository::new(pool.clone()),
            session_repository: SessionRepository::new(pool.clone()),
            client_repository: ClientRepository::new(pool.clone()),
            employee_repository: EmployeeRepository::new(pool.clone()),
            subscription_repository: SubscriptionRepository::new(pool.clone()),
            training_repository: TrainingRepository::new(pool.clone()),
            stats_repository: StatsRepository::new(pool.clone()),
            db_pool: pool,
            config,
        }
    }
}
