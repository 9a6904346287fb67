use crate::utils::error::{LaunchError, Result};
use crate::utils::validation::{self, Validate};
use std::env;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub app_name: String,
    pub app_version: String,
    pub environment: String,
    pub region: Option<String>,
    pub database: Option<DatabaseConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            app_name: "AWS Deployment Demo".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            region: None,
            database: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let port = match env::var("PORT") {
            Ok(raw) => parse_port("PORT", &raw)?,
            Err(_) => defaults.port,
        };

        let database = match env::var("DB_HOST").ok().filter(|h| !h.trim().is_empty()) {
            Some(host) => Some(DatabaseConfig {
                host,
                port: match env::var("DB_PORT") {
                    Ok(raw) => parse_port("DB_PORT", &raw)?,
                    Err(_) => 5432,
                },
                name: env::var("DB_NAME").ok(),
            }),
            None => None,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port,
            app_name: env::var("APP_NAME").unwrap_or(defaults.app_name),
            app_version: env::var("APP_VERSION").unwrap_or(defaults.app_version),
            environment: env::var("APP_ENV")
                .or_else(|_| env::var("NODE_ENV"))
                .unwrap_or(defaults.environment),
            region: env::var("AWS_REGION")
                .or_else(|_| env::var("AWS_DEFAULT_REGION"))
                .ok(),
            database,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_port(field: &str, raw: &str) -> Result<u16> {
    raw.trim()
        .parse()
        .map_err(|e| LaunchError::InvalidConfigValueError {
            field: field.to_string(),
            value: raw.to_string(),
            reason: format!("not a valid port: {}", e),
        })
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("HOST", &self.host)?;
        validation::validate_non_empty_string("APP_NAME", &self.app_name)?;
        if let Some(region) = &self.region {
            validation::validate_region("AWS_REGION", region)?;
        }
        Ok(())
    }
}
