//! Configuration types.

use chrono::Duration;

use crate::error::ConfigError;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the libSQL database file.
    pub db_path: String,
    /// Port the HTTP server binds on.
    pub port: u16,
    /// How long issued sessions stay valid.
    pub session_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "./data/stepflow.db".to_string(),
            port: 8080,
            session_ttl: Duration::days(7),
        }
    }
}

impl Config {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// `STEPFLOW_DB_PATH`, `STEPFLOW_PORT`, `STEPFLOW_SESSION_TTL_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = std::env::var("STEPFLOW_DB_PATH").unwrap_or(defaults.db_path);

        let port = match std::env::var("STEPFLOW_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "STEPFLOW_PORT".into(),
                message: format!("not a valid port: {raw}"),
            })?,
            Err(_) => defaults.port,
        };

        let session_ttl = match std::env::var("STEPFLOW_SESSION_TTL_SECS") {
            Ok(raw) => {
                let secs: i64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "STEPFLOW_SESSION_TTL_SECS".into(),
                    message: format!("not a number of seconds: {raw}"),
                })?;
                Duration::seconds(secs)
            }
            Err(_) => defaults.session_ttl,
        };

        Ok(Self {
            db_path,
            port,
            session_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert!(config.session_ttl > Duration::hours(1));
    }
}
