use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Which record store backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => bail!("Unknown STORE_BACKEND '{other}' (expected 'postgres' or 'memory')"),
        }
    }
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreBackend::Postgres => "postgres",
            StoreBackend::Memory => "memory",
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub port: u16,
    pub rust_log: String,
    /// Mount point of the forms router, e.g. `/api/v1`.
    pub api_prefix: String,
    pub cors_origin: String,
    /// Upload ceiling for the `resume` file field.
    pub upload_max_bytes: usize,
    /// Ceiling for JSON and urlencoded bodies.
    pub json_body_limit: usize,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    /// Body fields allowed to repeat; all others collapse to their last value.
    pub hpp_allowlist: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_backend: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 10,
            port: 8080,
            rust_log: "info".to_string(),
            api_prefix: "/api/v1".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            upload_max_bytes: 10 * 1024 * 1024,
            json_body_limit: 10 * 1024,
            rate_limit_max: 100,
            rate_limit_window_secs: 30 * 60,
            hpp_allowlist: vec!["hobbies".to_string()],
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        let store_backend: StoreBackend = optional_env("STORE_BACKEND")
            .unwrap_or_else(|| "postgres".to_string())
            .parse()?;

        let database_url = match store_backend {
            StoreBackend::Postgres => Some(require_env("DATABASE_URL")?),
            StoreBackend::Memory => optional_env("DATABASE_URL"),
        };

        Ok(Config {
            store_backend,
            database_url,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            port: parse_env("PORT", defaults.port)?,
            rust_log: optional_env("RUST_LOG").unwrap_or(defaults.rust_log),
            api_prefix: normalize_prefix(
                &optional_env("API_PREFIX").unwrap_or(defaults.api_prefix),
            ),
            cors_origin: optional_env("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            upload_max_bytes: parse_env("UPLOAD_MAX_BYTES", defaults.upload_max_bytes)?,
            json_body_limit: parse_env("JSON_BODY_LIMIT", defaults.json_body_limit)?,
            rate_limit_max: parse_env("RATE_LIMIT_MAX", defaults.rate_limit_max)?,
            rate_limit_window_secs: parse_env(
                "RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window_secs,
            )?,
            hpp_allowlist: optional_env("HPP_ALLOWLIST")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.hpp_allowlist),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// `api/v1/` -> `/api/v1`; empty and `/` mean "mount at root".
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parses_aliases() {
        assert_eq!("Postgres".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert_eq!("mem".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("mongo".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_prefix_normalization() {
        assert_eq!(normalize_prefix("api/v1/"), "/api/v1");
        assert_eq!(normalize_prefix("/api/v1"), "/api/v1");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn test_allowlist_parsing_skips_blanks() {
        assert_eq!(parse_list("hobbies, ,tags"), vec!["hobbies", "tags"]);
    }
}
