use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use tracing::info;

use crate::config::MailConfig;

/// One-time code delivery to a freshly registered account.
#[derive(Clone)]
pub struct VerificationMessage {
    pub recipient: String,
    pub display_name: String,
    pub code: String,
    pub registered_at: OffsetDateTime,
}

impl VerificationMessage {
    pub const SUBJECT: &'static str = "Your Verification Code";

    pub fn plain_text(&self) -> String {
        let when = self
            .registered_at
            .format(&Rfc2822)
            .unwrap_or_else(|_| self.registered_at.to_string());
        format!(
            "Hi {}! Your verification code is: {}. Registered on: {}",
            self.display_name, self.code, when
        )
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, msg: &VerificationMessage) -> anyhow::Result<()>;
}

/// SendGrid v3 mail-send over HTTPS.
pub struct SendGridNotifier {
    client: Client,
    api_key: String,
    from_email: String,
    from_name: String,
}

impl SendGridNotifier {
    const ENDPOINT: &'static str = "https://api.sendgrid.com/v3/mail/send";

    pub fn new(api_key: String, cfg: &MailConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout())
            .build()
            .context("build sendgrid http client")?;
        Ok(Self {
            client,
            api_key,
            from_email: cfg.from_email.clone(),
            from_name: cfg.from_name.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SendGridNotifier {
    async fn send(&self, msg: &VerificationMessage) -> anyhow::Result<()> {
        let payload = json!({
            "personalizations": [{
                "to": [{ "email": msg.recipient, "name": msg.display_name }],
            }],
            "from": { "email": self.from_email, "name": self.from_name },
            "subject": VerificationMessage::SUBJECT,
            "content": [{ "type": "text/plain", "value": msg.plain_text() }],
        });

        let res = self
            .client
            .post(Self::ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("sendgrid mail send")?;

        let status = res.status();
        anyhow::ensure!(status.is_success(), "sendgrid status {status}");
        Ok(())
    }
}

/// Writes the message to the log instead of sending it. Used when no mail
/// provider is configured, e.g. local development.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, msg: &VerificationMessage) -> anyhow::Result<()> {
        info!(
            recipient = %msg.recipient,
            code = %msg.code,
            "verification mail not sent: no provider configured"
        );
        Ok(())
    }
}

pub fn notifier_from_config(cfg: &MailConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match &cfg.sendgrid_api_key {
        Some(key) => Arc::new(SendGridNotifier::new(key.clone(), cfg)?),
        None => Arc::new(LogNotifier),
    };
    Ok(notifier)
}

/// Bounded wait used by the detached delivery task.
pub async fn send_with_timeout(
    notifier: &dyn Notifier,
    msg: &VerificationMessage,
    limit: Duration,
) -> anyhow::Result<()> {
    tokio::time::timeout(limit, notifier.send(msg))
        .await
        .map_err(|_| anyhow::anyhow!("verification mail timed out after {limit:?}"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn plain_text_carries_name_code_and_date() {
        let msg = VerificationMessage {
            recipient: "a@x.com".into(),
            display_name: "alice".into(),
            code: "004213".into(),
            registered_at: datetime!(2024-06-01 12:00 UTC),
        };
        let text = msg.plain_text();
        assert_eq!(
            text,
            "Hi alice! Your verification code is: 004213. Registered on: Sat, 01 Jun 2024 12:00:00 +0000"
        );
    }

    struct Stuck;

    #[async_trait]
    impl Notifier for Stuck {
        async fn send(&self, _msg: &VerificationMessage) -> anyhow::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn send_with_timeout_gives_up() {
        let msg = VerificationMessage {
            recipient: "a@x.com".into(),
            display_name: "alice".into(),
            code: "000001".into(),
            registered_at: OffsetDateTime::now_utc(),
        };
        let err = send_with_timeout(&Stuck, &msg, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
