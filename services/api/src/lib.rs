//! Fitness-club administration API
//!
//! Users, clients, employees, subscriptions and trainings behind session
//! token authentication with `user`, `trainer` and `admin` roles.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod validation;

pub use state::AppState;
