//! NATS consumer for incoming CSV batches

use anyhow::Result;
use async_nats::{Client, Message, Subscriber};
use tracing::info;

/// Header carrying the caller's batch identifier
pub const BATCH_ID_HEADER: &str = "Batch-Id";

/// Consumer for receiving scoring requests from NATS
pub struct BatchConsumer {
    client: Client,
    subject: String,
}

impl BatchConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the request subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to scoring requests");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Batch identifier from the message headers, or a fresh one.
pub fn batch_id(message: &Message) -> String {
    message
        .headers
        .as_ref()
        .and_then(|headers| headers.get(BATCH_ID_HEADER))
        .map(|value| value.as_str().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    // Subscription tests require a running NATS server
}
