// NATS sink
//
// Publishes each notification as JSON on one subject, for deployments where
// a separate relay owns chat delivery. Media stays a reference; the relay
// decides how to render it.

use super::{Notification, Notifier};
use async_nats::Client;
use async_trait::async_trait;
use eyre::Result;
use tracing::info;

pub struct NatsNotifier {
    client: Client,
    subject: String,
}

impl NatsNotifier {
    /// Connect to NATS server
    pub async fn connect(nats_url: &str, subject: impl Into<String>) -> Result<Self> {
        let client = async_nats::connect(nats_url).await?;
        let subject = subject.into();
        info!("Connected to NATS at {}, publishing on {}", nats_url, subject);
        Ok(Self { client, subject })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Wire payload for a notification
pub(crate) fn encode(notification: &Notification) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(notification)?)
}

#[async_trait]
impl Notifier for NatsNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let payload = encode(notification)?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.flush().await?;
        info!("NATS notifier flushed");
        Ok(())
    }
}
