use std::env;

use crate::errors::{AppError, Result};

/// Which transactional email backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailProvider {
    SendGrid,
    Resend,
    /// No provider: messages are only written to the log
    Log,
}

impl EmailProvider {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "sendgrid" => Ok(EmailProvider::SendGrid),
            "resend" => Ok(EmailProvider::Resend),
            "log" | "" => Ok(EmailProvider::Log),
            other => Err(AppError::Config(format!(
                "Invalid EMAIL_PROVIDER '{}'. Must be one of: sendgrid, resend, log",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub app_base_url: String,
    pub jwt_secret: String,

    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,

    pub email_provider: EmailProvider,
    pub email_api_key: Option<String>,
    pub email_from: String,

    /// Seeded admin account, created at startup when both are set
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_host = optional("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let server_port = optional("SERVER_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;

        let database_url = optional("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL must be set".to_string()))?;

        let app_base_url = optional("APP_BASE_URL")
            .unwrap_or_else(|| format!("http://{}:{}", server_host, server_port));

        let jwt_secret = match optional("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set, using an insecure development key");
                "default-insecure-key-change-this".to_string()
            }
        };

        let email_api_key = optional("EMAIL_API_KEY");
        let email_provider = match optional("EMAIL_PROVIDER") {
            Some(value) => EmailProvider::parse(&value)?,
            None => EmailProvider::Log,
        };
        if email_provider != EmailProvider::Log && email_api_key.is_none() {
            return Err(AppError::Config(
                "EMAIL_API_KEY must be set when EMAIL_PROVIDER is sendgrid or resend".to_string(),
            ));
        }

        let config = Self {
            server_host,
            server_port,
            database_url,
            app_base_url,
            jwt_secret,
            stripe_secret_key: optional("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
            email_provider,
            email_api_key,
            email_from: optional("EMAIL_FROM").unwrap_or_else(|| "no-reply@localhost".to_string()),
            admin_email: optional("ADMIN_EMAIL"),
            admin_password: optional("ADMIN_PASSWORD"),
        };

        tracing::info!(
            host = %config.server_host,
            port = config.server_port,
            email_provider = ?config.email_provider,
            stripe = config.stripe_secret_key.is_some(),
            "Application configuration loaded"
        );

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/shop")]).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.app_base_url, "http://127.0.0.1:8080");
        assert_eq!(config.email_provider, EmailProvider::Log);
        assert!(config.stripe_secret_key.is_none());
    }

    #[test]
    fn requires_database_url() {
        assert!(matches!(config_from(&[]), Err(AppError::Config(_))));
    }

    #[test]
    fn rejects_bad_port() {
        let result = config_from(&[("DATABASE_URL", "postgres://x"), ("SERVER_PORT", "eighty")]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn email_provider_needs_a_key() {
        let result = config_from(&[("DATABASE_URL", "postgres://x"), ("EMAIL_PROVIDER", "resend")]);
        assert!(matches!(result, Err(AppError::Config(_))));

        let config = config_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("EMAIL_PROVIDER", "SendGrid"),
            ("EMAIL_API_KEY", "SG.key"),
        ])
        .unwrap();
        assert_eq!(config.email_provider, EmailProvider::SendGrid);
    }
}
