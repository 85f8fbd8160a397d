use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string; the service falls back to in-memory stores when unset.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub payment_session_ttl_secs: i64,
    pub payment_page_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let jwt_ttl_hours = parse_or("JWT_TTL_HOURS", 24);
        let payment_session_ttl_secs = parse_or("PAYMENT_SESSION_TTL_SECS", 300);
        let payment_page_url =
            env::var("PAYMENT_PAGE_URL").unwrap_or_else(|_| "/webpay/simulator".to_string());

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_ttl_hours,
            payment_session_ttl_secs,
            payment_page_url,
        })
    }

    /// Configuration with every default applied and the given signing secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: None,
            host: "127.0.0.1".to_string(),
            port: 3000,
            jwt_secret: jwt_secret.into(),
            jwt_ttl_hours: 24,
            payment_session_ttl_secs: 300,
            payment_page_url: "/webpay/simulator".to_string(),
        }
    }
}

fn parse_or(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
