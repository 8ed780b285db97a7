//! Environment-based configuration.

use service_core::config::Config as CommonConfig;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub common: CommonConfig,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let common = CommonConfig::load()?;

        let url = env::var("AUTOPARTS_DATABASE_URL").map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("AUTOPARTS_DATABASE_URL must be set"))
        })?;

        let max_connections = env::var("AUTOPARTS_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid max connections: {}", e))
            })?;

        let min_connections = env::var("AUTOPARTS_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid min connections: {}", e))
            })?;

        Ok(Self {
            common,
            service_name: "autoparts-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: env::var("AUTOPARTS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("AUTOPARTS_OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url,
                max_connections,
                min_connections,
            },
        })
    }
}
