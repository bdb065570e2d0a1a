use std::path::PathBuf;

use anyhow::{Context, bail};

/// Sample-file secrets refused at startup.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "changeme",
    "change-me",
    "dev-secret-change-me",
    "secret",
    "your_jwt_secret",
    "your-secret-key",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl_days: i64,
    /// Allowed CORS origins. Empty means permissive.
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Read `MURMUR_*` variables from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("MURMUR_JWT_SECRET")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("MURMUR_JWT_SECRET must be set")?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.to_ascii_lowercase().as_str()) {
            bail!("MURMUR_JWT_SECRET is a placeholder value, refusing to start");
        }

        let db_path = lookup("MURMUR_DB_PATH").unwrap_or_else(|| "murmur.db".into());
        let host = lookup("MURMUR_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("MURMUR_PORT")
            .unwrap_or_else(|| "5050".into())
            .parse()
            .context("MURMUR_PORT must be a port number")?;
        let token_ttl_days: i64 = lookup("MURMUR_TOKEN_TTL_DAYS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .context("MURMUR_TOKEN_TTL_DAYS must be a whole number of days")?;
        if token_ttl_days <= 0 {
            bail!("MURMUR_TOKEN_TTL_DAYS must be positive");
        }

        let cors_origins = lookup("MURMUR_CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            jwt_secret,
            db_path: PathBuf::from(db_path),
            host,
            port,
            token_ttl_days,
            cors_origins,
        })
    }
}
