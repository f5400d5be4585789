use std::time::Duration;

use anyhow::Context;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub client_origin: String,
    pub token_secret: String,
    pub token_ttl_secs: i64,
    pub service_key: String,
    pub moderation: ModerationConfig,
}

#[derive(Debug, Clone)]
pub struct ModerationConfig {
    /// No key means the remote classifier is disabled and only the
    /// denylist fallback runs.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

const DEFAULT_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        let bind_addr = var_or("BIND_ADDR", "0.0.0.0:5000");
        let database_url = dotenv::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let client_origin = var_or("CLIENT_URL", "http://localhost:5173");
        let token_secret = dotenv::var("TOKEN_SECRET").context("TOKEN_SECRET is required")?;
        let token_ttl_secs = match dotenv::var("TOKEN_TTL_SECS") {
            Ok(v) => v.parse().context("TOKEN_TTL_SECS must be an integer")?,
            Err(_) => DEFAULT_TOKEN_TTL_SECS,
        };
        let service_key = dotenv::var("SERVICE_KEY").context("SERVICE_KEY is required")?;

        let api_key = dotenv::var("MODERATION_API_KEY").ok().filter(|k| !k.is_empty());
        let timeout_ms = match dotenv::var("MODERATION_TIMEOUT_MS") {
            Ok(v) => v.parse().context("MODERATION_TIMEOUT_MS must be an integer")?,
            Err(_) => 4000,
        };
        let moderation = ModerationConfig {
            api_key,
            base_url: var_or("MODERATION_BASE_URL", "https://api.groq.com/openai/v1"),
            model: var_or("MODERATION_MODEL", "llama-3.3-70b-versatile"),
            timeout: Duration::from_millis(timeout_ms),
        };

        Ok(Config {
            bind_addr,
            database_url,
            client_origin,
            token_secret,
            token_ttl_secs,
            service_key,
            moderation,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    dotenv::var(key).unwrap_or_else(|_| default.to_owned())
}
