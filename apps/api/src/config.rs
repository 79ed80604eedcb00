use anyhow::{Context, Result};

const DEFAULT_EXPORT_MAX_ROWS: i64 = 20_000;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Optional: without a key the generation endpoints answer 500 "not configured".
    pub gemini_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub app_env: AppEnv,
    pub export_max_rows: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Production,
    Staging,
}

impl AppEnv {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("staging") {
            AppEnv::Staging
        } else {
            AppEnv::Production
        }
    }

    pub fn is_staging(self) -> bool {
        self == AppEnv::Staging
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            app_env: AppEnv::parse(&std::env::var("APP_ENV").unwrap_or_default()),
            export_max_rows: parse_export_max_rows(optional_env("EXPORT_MAX_ROWS"))?,
        })
    }
}

fn parse_export_max_rows(value: Option<String>) -> Result<i64> {
    let Some(v) = value else {
        return Ok(DEFAULT_EXPORT_MAX_ROWS);
    };
    v.parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
        .with_context(|| format!("EXPORT_MAX_ROWS must be a positive integer (got '{v}')"))
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_env_parse() {
        assert_eq!(AppEnv::parse("staging"), AppEnv::Staging);
        assert_eq!(AppEnv::parse(" Staging "), AppEnv::Staging);
        assert_eq!(AppEnv::parse("production"), AppEnv::Production);
        assert_eq!(AppEnv::parse(""), AppEnv::Production);
    }

    #[test]
    fn test_export_max_rows_must_be_positive() {
        assert_eq!(parse_export_max_rows(None).unwrap(), DEFAULT_EXPORT_MAX_ROWS);
        assert_eq!(parse_export_max_rows(Some("100".into())).unwrap(), 100);
        assert!(parse_export_max_rows(Some("0".into())).is_err());
        assert!(parse_export_max_rows(Some("-5".into())).is_err());
        assert!(parse_export_max_rows(Some("abc".into())).is_err());
    }
}
