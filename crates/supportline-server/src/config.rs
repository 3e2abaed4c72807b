use std::path::PathBuf;

use anyhow::{Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub const DEFAULT_GREETING: &str = "Здравствуйте! Это чат поддержки курса. \
     Напишите свой вопрос, и мы ответим в ближайшее время.";

pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub greeting: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("SUPPORTLINE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!(
                "SUPPORTLINE_JWT_SECRET is unset or still a placeholder; \
                 it must match the secret of the session service"
            );
        }

        let port = match get("SUPPORTLINE_PORT") {
            Some(port) => port.parse()?,
            None => 3000,
        };

        Ok(Self {
            jwt_secret,
            db_path: get("SUPPORTLINE_DB_PATH")
                .unwrap_or_else(|| "supportline.db".into())
                .into(),
            host: get("SUPPORTLINE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            greeting: get("SUPPORTLINE_GREETING")
                .filter(|g| !g.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GREETING.into()),
        })
    }
}
