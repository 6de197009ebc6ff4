// Telegram Bot API sink
//
// Rich path: sendAnimation with the text as caption.
// Plain path: sendMessage. The plain path is always tried when the rich one
// fails, so a broken media URL never swallows a reward notification.
// Messages go out without `parse_mode`: the text carries token symbols read
// from chain, which must never be interpreted as markup.

use super::{Notification, Notifier};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_SECS: u64 = 2;
const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
    api_base: String,
    retry_delay: Duration,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("configured", &self.config.is_configured())
            .field("api_base", &"<redacted>")
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        Self::with_api_base(config, API_BASE)
    }

    /// Point the notifier at another Bot API host (local bot server, tests)
    pub fn with_api_base(config: TelegramConfig, base: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .wrap_err("failed to build HTTP client")?;
        let api_base = format!("{}/bot{}", base.trim_end_matches('/'), config.bot_token);

        Ok(Self {
            config,
            client,
            api_base,
            retry_delay: Duration::from_secs(RETRY_DELAY_SECS),
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": self.config.chat_id,
                "text": text,
                "disable_web_page_preview": true,
            }),
        )
        .await
    }

    async fn send_animation(&self, animation: &str, caption: &str) -> Result<()> {
        self.call(
            "sendAnimation",
            json!({
                "chat_id": self.config.chat_id,
                "animation": animation,
                "caption": caption,
            }),
        )
        .await
    }

    async fn call(&self, method: &str, body: Value) -> Result<()> {
        let url = format!("{}/{}", self.api_base, method);
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match self.client.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) if !is_retryable(resp.status()) => {
                    let status = resp.status();
                    let detail = resp.text().await.unwrap_or_default();
                    warn!("Telegram {} rejected: {} {}", method, status, detail);
                    return Err(eyre!("{method} rejected with {status}: {detail}"));
                }
                Ok(resp) => {
                    warn!(
                        "Telegram {} attempt {}/{} failed: {}",
                        method,
                        attempt + 1,
                        MAX_RETRIES,
                        resp.status()
                    );
                    last_error = Some(eyre!("{method} returned {}", resp.status()));
                }
                Err(e) => {
                    warn!(
                        "Telegram {} attempt {}/{} failed: {:?}",
                        method,
                        attempt + 1,
                        MAX_RETRIES,
                        e
                    );
                    last_error = Some(eyre!("{method} request failed: {e}"));
                }
            }

            if attempt < MAX_RETRIES - 1 {
                tokio::time::sleep(self.retry_delay * (attempt + 1)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| eyre!("{method} failed")))
    }
}

/// Server errors and rate limiting are transient; other 4xx are final
fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        if !self.is_configured() {
            let preview: String = notification.text.chars().take(200).collect();
            info!("Telegram not configured, would send: {}", preview);
            return Ok(());
        }

        if let Some(media) = &notification.media {
            match self.send_animation(media, &notification.text).await {
                Ok(()) => return Ok(()),
                Err(e) => warn!(error = %e, "animation send failed, falling back to text"),
            }
        }

        self.send_message(&notification.text).await
    }
}
