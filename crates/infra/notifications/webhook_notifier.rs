use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::domain::repositories::booking_notifier::{BookingNotification, BookingNotifier};

/// Forwards booking notifications to the messaging service. Without a URL the notification is
/// only logged, which is what local development runs with.
pub struct WebhookBookingNotifier {
    webhook_url: Option<Url>,
    client: Client,
}

impl WebhookBookingNotifier {
    pub fn new(webhook_url: Option<Url>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(3)).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

#[async_trait]
impl BookingNotifier for WebhookBookingNotifier {
    async fn notify(&self, notification: BookingNotification) -> Result<()> {
        let Some(webhook_url) = self.webhook_url.as_ref() else {
            info!(
                booking_id = %notification.booking_id,
                status = %notification.status,
                message = %notification.message,
                "notifications: webhook not configured; logged only"
            );
            return Ok(());
        };

        let response = self
            .client
            .post(webhook_url.clone())
            .json(&notification)
            .send()
            .await
            .map_err(|err| anyhow!("booking notification request failed: {}", err.without_url()))?;

        if !response.status().is_success() {
            warn!(
                booking_id = %notification.booking_id,
                status = %response.status(),
                "notifications: webhook rejected booking notification"
            );
            return Err(anyhow!(
                "booking notification webhook returned {}",
                response.status()
            ));
        }

        Ok(())
    }
}
