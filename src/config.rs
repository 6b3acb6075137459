use anyhow::{Context, Result, anyhow};
use std::env;
use std::str::FromStr;

use chrono::NaiveTime;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Logging
    pub log_dir: String,
    pub log_level: tracing::Level,

    /// Leave days granted when a user has no allowance row for the year yet.
    pub default_leave_allowance: f64,
    /// Self check-ins after this time are marked late.
    pub late_after: NaiveTime,
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).ok_or_else(|| anyhow!("{key} must be set"))
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("{key} has an invalid value '{raw}'"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            server_addr: required(&lookup, "SERVER_ADDR")?,
            database_url: required(&lookup, "DATABASE_URL")?,
            jwt_secret: required(&lookup, "JWT_SECRET")?,
            access_token_ttl: parsed(&lookup, "ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: parsed(&lookup, "REFRESH_TOKEN_TTL", "604800")?, // 7 days

            rate_login_per_min: parsed(&lookup, "RATE_LOGIN_PER_MIN", "60")?,
            rate_register_per_min: parsed(&lookup, "RATE_REGISTER_PER_MIN", "30")?,
            rate_refresh_per_min: parsed(&lookup, "RATE_REFRESH_PER_MIN", "30")?,
            rate_protected_per_min: parsed(&lookup, "RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),

            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            log_level: parsed(&lookup, "LOG_LEVEL", "debug")?,

            default_leave_allowance: parsed(&lookup, "DEFAULT_LEAVE_ALLOWANCE", "14")?,
            late_after: {
                let raw = lookup("LATE_AFTER").unwrap_or_else(|| "09:15".to_string());
                crate::utils::hhmm::parse(raw.trim())
                    .ok_or_else(|| anyhow!("LATE_AFTER has an invalid value '{raw}', expected HH:mm"))?
            },
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/hr_desk_test".into()),
            "JWT_SECRET" => Some("test-secret".into()),
            _ => None,
        })
        .unwrap_or_else(|e| panic!("test config: {e}"))
    }
}
