use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Serialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::config::MailConfig;
use crate::error::MonitorError;
use crate::service::mailer::Mailer;
use crate::types::alert::AlertMessage;

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Delivers alerts by POSTing JSON to an HTTP mail relay.
pub struct WebhookMailer {
    client: reqwest::Client,
    relay_url: Url,
    api_token: Option<String>,
    sender: String,
    limiter: DefaultDirectRateLimiter,
}

impl WebhookMailer {
    pub fn new(relay_url: Url, cfg: &MailConfig) -> Result<Self, MonitorError> {
        let client = reqwest::Client::builder()
            .user_agent("heartwatch-alerts/1.0")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()?;
        let per_minute = NonZeroU32::new(cfg.per_minute).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            client,
            relay_url,
            api_token: cfg.api_token.clone(),
            sender: cfg.sender.clone(),
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    async fn post_once(&self, message: &AlertMessage) -> Result<(), MonitorError> {
        let payload = RelayPayload {
            from: &self.sender,
            to: &message.recipient,
            subject: &message.subject,
            text: &message.body,
        };
        let mut req = self.client.post(self.relay_url.clone()).json(&payload);
        if let Some(token) = self.api_token.as_deref() {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        match resp.error_for_status_ref() {
            Ok(_) => Ok(()),
            // 5xx stays a transport error so the retry policy picks it up
            Err(e) if status.is_server_error() => Err(e.into()),
            Err(_) => Err(MonitorError::Delivery {
                recipient: message.recipient.clone(),
                reason: format!("relay responded with {status}"),
            }),
        }
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, message: &AlertMessage) -> Result<(), MonitorError> {
        // every attempt, retries included, counts against the relay quota
        (|| async {
            self.limiter.until_ready().await;
            self.post_once(message).await
        })
            .retry(default_retry_policy())
            .when(|e: &MonitorError| e.is_retryable())
            .notify(|err, dur: Duration| {
                warn!(
                    recipient = %message.recipient,
                    "mail relay retrying after error {}, sleeping {:?}",
                    err, dur
                );
            })
            .await
    }
}
