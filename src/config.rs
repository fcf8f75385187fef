use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PinataConfig {
    pub api_url: String,
    pub gateway_url: String,
    pub api_key: String,
    pub api_secret: String,
}

/// How the verification message is dispatched during registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailDelivery {
    /// Detached task; registration succeeds whatever the delivery outcome.
    Background,
    /// Registration waits for delivery and fails if it fails.
    Blocking,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub sendgrid_api_key: Option<String>,
    pub from_email: String,
    pub from_name: String,
    pub delivery: MailDelivery,
    pub timeout_secs: u64,
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub pinata: PinataConfig,
    pub mail: MailConfig,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = database_url_from_env()?;

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET")?;
        anyhow::ensure!(!secret.is_empty(), "JWT_SECRET must not be empty");
        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "arkive".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "arkive-users".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 60 * 24),
        };

        let pinata = PinataConfig {
            api_url: std::env::var("PINATA_API_URL")
                .unwrap_or_else(|_| "https://api.pinata.cloud".into()),
            gateway_url: std::env::var("PINATA_GATEWAY_URL")
                .unwrap_or_else(|_| "https://gateway.pinata.cloud".into()),
            api_key: std::env::var("PINATA_API_KEY").context("PINATA_API_KEY")?,
            api_secret: std::env::var("PINATA_API_SECRET").context("PINATA_API_SECRET")?,
        };

        let delivery = match std::env::var("MAIL_DELIVERY").as_deref() {
            Ok("blocking") => MailDelivery::Blocking,
            Ok("background") | Err(_) => MailDelivery::Background,
            Ok(other) => anyhow::bail!("MAIL_DELIVERY must be `background` or `blocking`, got `{other}`"),
        };
        let mail = MailConfig {
            sendgrid_api_key: std::env::var("SENDGRID_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            from_email: std::env::var("FROM_EMAIL").unwrap_or_else(|_| "no-reply@arkive.local".into()),
            from_name: std::env::var("FROM_NAME").unwrap_or_else(|_| "Arkive".into()),
            delivery,
            timeout_secs: parse_or("MAIL_TIMEOUT_SECS", 10),
        };

        Ok(Self {
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            jwt,
            pinata,
            mail,
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 30),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `DATABASE_URL` wins; otherwise the URL is assembled from the `POSTGRES_*` variables.
fn database_url_from_env() -> anyhow::Result<String> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return Ok(url);
    }
    let part = |name: &str| std::env::var(name).with_context(|| format!("DATABASE_URL or {name}"));
    Ok(format!(
        "postgres://{}:{}@{}/{}",
        part("POSTGRES_USER")?,
        part("POSTGRES_PASSWORD")?,
        part("POSTGRES_HOST")?,
        part("POSTGRES_DB")?,
    ))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
