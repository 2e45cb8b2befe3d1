//! Service configuration loaded from the environment

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Server and session settings
///
/// # Environment Variables
/// - `SERVER_HOST`: bind address (default: "0.0.0.0")
/// - `SERVER_PORT`: bind port (default: 8080)
/// - `SESSION_TTL_HOURS`: session lifetime (default: 24)
/// - `RUN_MIGRATIONS`: apply pending migrations at startup (default: true)
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub session_ttl_hours: i64,
    pub run_migrations: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            session_ttl_hours: 24,
            run_migrations: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Config::builder()
            .set_default("server_host", defaults.server_host)?
            .set_default("server_port", i64::from(defaults.server_port))?
            .set_default("session_ttl_hours", defaults.session_ttl_hours)?
            .set_default("run_migrations", defaults.run_migrations)?
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const KEYS: [&str; 4] = [
        "SERVER_HOST",
        "SERVER_PORT",
        "SESSION_TTL_HOURS",
        "RUN_MIGRATIONS",
    ];

    fn clear_env() {
        for key in KEYS {
            unsafe {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();

        let config = AppConfig::from_env().expect("Failed to load config");
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.session_ttl_hours, 24);
        assert!(config.run_migrations);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear_env();
        unsafe {
            env::set_var("SERVER_HOST", "127.0.0.1");
            env::set_var("SERVER_PORT", "9090");
            env::set_var("SESSION_TTL_HOURS", "2");
            env::set_var("RUN_MIGRATIONS", "false");
        }

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:9090");
        assert_eq!(config.session_ttl_hours, 2);
        assert!(!config.run_migrations);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_port_is_rejected() {
        clear_env();
        unsafe {
            env::set_var("SERVER_PORT", "eighty");
        }

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }
}
