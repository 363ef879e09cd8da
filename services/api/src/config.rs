//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Output format of the log subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Console,
    Json,
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub issuer: String,
    pub secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: String,
    pub starttls: bool,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` runs the service on the in-memory account store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    /// `None` logs outgoing mail instead of sending it.
    pub smtp: Option<SmtpConfig>,
    pub external_url: String,
    pub frontend_password_reset_path: String,
    pub log_filter: String,
    pub log_format: LogFormat,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // --- Server and Database Settings ---
        let bind_address: SocketAddr =
            parse_or(&var, "BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>().ok())?;
        let database_url = var("DATABASE_URL");
        let database_max_connections: u32 = parse_or(&var, "DATABASE_MAX_CONNECTIONS", Some(10))?;

        // --- Token Settings ---
        // No default for the signing secret.
        let secret = var("JWT_SECRET").ok_or_else(|| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        let jwt = JwtConfig {
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "arc".to_string()),
            secret,
            access_token_ttl: Duration::from_secs(parse_or(&var, "JWT_ACCESS_TOKEN_TTL_SECS", Some(15 * 60))?),
            refresh_token_ttl: Duration::from_secs(parse_or(
                &var,
                "JWT_REFRESH_TOKEN_TTL_SECS",
                Some(168 * 60 * 60),
            )?),
        };

        // --- Mail Settings ---
        let smtp = match var("SMTP_HOST") {
            Some(host) => {
                // Credentials come as a pair or not at all.
                let (username, password) = match (var("SMTP_USERNAME"), var("SMTP_PASSWORD")) {
                    (Some(_), None) => return Err(ConfigError::MissingVar("SMTP_PASSWORD".to_string())),
                    (None, Some(_)) => return Err(ConfigError::MissingVar("SMTP_USERNAME".to_string())),
                    pair => pair,
                };
                Some(SmtpConfig {
                    host,
                    port: parse_or(&var, "SMTP_PORT", Some(25))?,
                    username,
                    password,
                    sender: var("SMTP_SENDER").unwrap_or_else(|| "arc@localhost".to_string()),
                    starttls: parse_or(&var, "SMTP_STARTTLS", Some(false))?,
                })
            }
            None => None,
        };

        // --- Link Settings ---
        let external_url = var("EXTERNAL_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let frontend_password_reset_path = var("FRONTEND_PASSWORD_RESET_PATH")
            .unwrap_or_else(|| "frontend-password-reset-path".to_string())
            .trim_matches('/')
            .to_string();

        // --- Logging ---
        let log_filter = var("RUST_LOG").unwrap_or_else(|| "info".to_string());
        let log_format = match var("LOG_FORMAT").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("console") => LogFormat::Console,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "LOG_FORMAT".to_string(),
                    format!("'{}' is not one of console, json", other),
                ))
            }
        };

        let request_timeout = Duration::from_secs(parse_or(&var, "REQUEST_TIMEOUT_SECS", Some(30))?);
        let shutdown_timeout = Duration::from_secs(parse_or(&var, "SHUTDOWN_TIMEOUT_SECS", Some(10))?);

        Ok(Self {
            bind_address,
            database_url,
            database_max_connections,
            jwt,
            smtp,
            external_url,
            frontend_password_reset_path,
            log_filter,
            log_format,
            request_timeout,
            shutdown_timeout,
        })
    }
}

/// Parses `name` when set, otherwise falls back to `default`.
fn parse_or<T, F>(var: &F, name: &str, default: Option<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(name.to_string())),
    }
}
