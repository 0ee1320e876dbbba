//! Configuration module
//!
//! Environment-backed configuration for the intake services: record store
//! connection, draft/blob storage paths, admin authorization, notification
//! settings, and the application lifetime.

use std::env;

use anyhow::Context;

/// Application configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    /// Postgres connection string for the record store.
    pub database_url: String,
    pub db_max_connections: u32,
    /// Directory for device-local draft files.
    pub draft_storage_path: String,
    /// Directory for uploaded document blobs.
    pub blob_storage_path: String,
    /// Base URL that blob paths are served from.
    pub blob_base_url: String,
    /// Email domains whose authenticated users get the admin capability.
    pub admin_domains: Vec<String>,
    /// Recipients copied on every submission summary.
    pub admin_notify_emails: Vec<String>,
    // SMTP notification settings
    pub email_enabled: bool,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_tls: bool,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Build configuration from the process environment. Loads `.env` first
    /// when present.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let config = Config {
            environment: env::var("ENVIRONMENT")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or_else(|_| "development".to_string()),
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            draft_storage_path: env_or("DRAFT_STORAGE_PATH", "./data/drafts"),
            blob_storage_path: env_or("BLOB_STORAGE_PATH", "./data/documents"),
            blob_base_url: env_or("BLOB_BASE_URL", "http://localhost:3000/documents"),
            admin_domains: env_list("ADMIN_EMAIL_DOMAINS"),
            admin_notify_emails: env_list("ADMIN_NOTIFY_EMAILS"),
            email_enabled: env_bool("EMAIL_ENABLED", false),
            smtp_host: env::var("SMTP_HOST").ok(),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()),
            smtp_user: env::var("SMTP_USER").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            smtp_from: env::var("SMTP_FROM").ok(),
            smtp_tls: env_bool("SMTP_TLS", true),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.email_enabled && self.smtp_host.is_none() {
            anyhow::bail!("EMAIL_ENABLED requires SMTP_HOST");
        }
        if self.email_enabled && self.smtp_from.is_none() {
            anyhow::bail!("EMAIL_ENABLED requires SMTP_FROM");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            environment: "test".to_string(),
            database_url: "postgresql://localhost/dealdesk_test".to_string(),
            db_max_connections: 5,
            draft_storage_path: "/tmp/drafts".to_string(),
            blob_storage_path: "/tmp/documents".to_string(),
            blob_base_url: "http://localhost:3000/documents".to_string(),
            admin_domains: vec!["example.com".to_string()],
            admin_notify_emails: vec![],
            email_enabled: false,
            smtp_host: None,
            smtp_port: None,
            smtp_user: None,
            smtp_password: None,
            smtp_from: None,
            smtp_tls: true,
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn email_enabled_requires_smtp_settings() {
        let mut config = base_config();
        config.email_enabled = true;
        assert!(config.validate().is_err());

        config.smtp_host = Some("smtp.example.com".to_string());
        config.smtp_from = Some("intake@example.com".to_string());
        assert!(config.validate().is_ok());
    }

}
