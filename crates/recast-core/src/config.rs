//! Configuration module
//!
//! Env-var-driven configuration for the API binary and the pipeline. All
//! external collaborators (speech vendor, completion model, Postgres) are
//! configured here and validated at startup so a missing or placeholder
//! credential fails the process before it accepts work.

use std::env;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_PROGRESS_TOKEN_TTL_SECS: i64 = 900;
const DEFAULT_STEP_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Shared secret the upload collaborator presents on write endpoints.
    /// When unset (local development), writes are open.
    pub service_api_key: Option<String>,
    // Progress channel credentials
    pub progress_token_secret: String,
    pub progress_token_ttl_secs: i64,
    // Speech-to-text vendor
    pub speech_api_base_url: String,
    pub speech_api_key: String,
    // Completion model vendor
    pub completion_api_base_url: String,
    pub completion_api_key: String,
    pub completion_model: String,
    // Step executor retry budget
    pub step_max_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = Self {
            server_port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            environment: env::var("ENVIRONMENT")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or_else(|_| "development".to_string()),
            database_url: require("DATABASE_URL")?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
            service_api_key: env::var("SERVICE_API_KEY").ok().filter(|k| !k.is_empty()),
            progress_token_secret: require("PROGRESS_TOKEN_SECRET")?,
            progress_token_ttl_secs: env::var("PROGRESS_TOKEN_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PROGRESS_TOKEN_TTL_SECS),
            speech_api_base_url: env::var("SPEECH_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.assemblyai.com".to_string()),
            speech_api_key: require("SPEECH_API_KEY")?,
            completion_api_base_url: env::var("COMPLETION_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            completion_api_key: require("COMPLETION_API_KEY")?,
            completion_model: env::var("COMPLETION_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-5".to_string()),
            step_max_attempts: env::var("STEP_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_STEP_MAX_ATTEMPTS),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject placeholder credentials before the process accepts work.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        validate_api_key("SPEECH_API_KEY", &self.speech_api_key)?;
        validate_api_key("COMPLETION_API_KEY", &self.completion_api_key)?;
        if self.progress_token_secret.len() < 32 {
            anyhow::bail!("PROGRESS_TOKEN_SECRET must be at least 32 bytes");
        }
        if self.step_max_attempts == 0 {
            anyhow::bail!("STEP_MAX_ATTEMPTS must be at least 1");
        }
        Ok(())
    }
}

fn require(name: &str) -> Result<String, anyhow::Error> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} environment variable is required", name))
}

fn validate_api_key(name: &str, key: &str) -> Result<(), anyhow::Error> {
    if key.is_empty() {
        anyhow::bail!("{} is required but not provided", name);
    }
    if key == "your-api-key" || key == "sk-" || key.len() < 10 {
        anyhow::bail!(
            "{} appears to be invalid or a placeholder. Please provide a valid API key.",
            name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server_port: 8080,
            environment: "test".into(),
            database_url: "postgres://localhost/recast".into(),
            db_max_connections: 5,
            service_api_key: None,
            progress_token_secret: "0123456789abcdef0123456789abcdef".into(),
            progress_token_ttl_secs: 900,
            speech_api_base_url: "http://localhost:9999".into(),
            speech_api_key: "test-speech-key-123".into(),
            completion_api_base_url: "http://localhost:9998".into(),
            completion_api_key: "test-completion-key-123".into(),
            completion_model: "test-model".into(),
            step_max_attempts: 3,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn placeholder_api_key_rejected() {
        let mut config = valid_config();
        config.speech_api_key = "your-api-key".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn short_token_secret_rejected() {
        let mut config = valid_config();
        config.progress_token_secret = "short".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = valid_config();
        config.step_max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
