use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Credentials for the transactional email relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub endpoint: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Public origin used to build card and connect links.
    pub origin: String,
    /// `None` disables email notifications.
    pub relay: Option<RelayConfig>,
}

impl Config {
    /// Read configuration from the process environment, loading `.env`
    /// first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("THIEP_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("THIEP_JWT_SECRET is unset or still a placeholder");
        }

        let port: u16 = var("THIEP_PORT", "3000")
            .parse()
            .context("THIEP_PORT must be a port number")?;

        let relay = match lookup("THIEP_RELAY_SERVICE_ID") {
            Some(service_id) if !service_id.is_empty() => Some(RelayConfig {
                endpoint: var(
                    "THIEP_RELAY_ENDPOINT",
                    "https://api.emailjs.com/api/v1.0/email/send",
                ),
                service_id,
                template_id: lookup("THIEP_RELAY_TEMPLATE_ID")
                    .context("THIEP_RELAY_TEMPLATE_ID is required when the relay is enabled")?,
                public_key: lookup("THIEP_RELAY_PUBLIC_KEY")
                    .context("THIEP_RELAY_PUBLIC_KEY is required when the relay is enabled")?,
            }),
            _ => None,
        };

        Ok(Self {
            db_path: var("THIEP_DB_PATH", "thiep.db").into(),
            host: var("THIEP_HOST", "0.0.0.0"),
            port,
            jwt_secret,
            origin: var("THIEP_ORIGIN", "http://localhost:5173"),
            relay,
        })
    }
}
