use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

/// Process configuration, read from the environment (after `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = var("WEBLOG_PORT", "8080");
        let ttl = var("WEBLOG_JWT_TTL_HOURS", "24");

        Ok(Self {
            jwt_secret: var("WEBLOG_JWT_SECRET", "dev-secret-change-me"),
            jwt_ttl_hours: ttl
                .parse()
                .with_context(|| format!("WEBLOG_JWT_TTL_HOURS is not a number: {}", ttl))?,
            db_path: PathBuf::from(var("WEBLOG_DB_PATH", "weblog.db")),
            host: var("WEBLOG_HOST", "0.0.0.0"),
            port: port
                .parse()
                .with_context(|| format!("WEBLOG_PORT is not a valid port: {}", port))?,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().with_context(|| format!("invalid listen address {}", addr))
    }
}
