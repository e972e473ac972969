use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, warn};
use url::Url;

const ALERT_QUEUE_CAPACITY: usize = 256;
const ALERT_CONTENT_LIMIT: usize = 2000;

#[derive(Debug, Clone)]
pub(crate) struct SpanSummary {
    pub(crate) name: String,
    pub(crate) fields: BTreeMap<String, String>,
}

/// A log event severe enough to page someone.
#[derive(Debug, Clone)]
pub(crate) struct AlertEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) location: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) spans: Vec<SpanSummary>,
}

impl AlertEvent {
    pub(crate) fn render(&self) -> String {
        let mut lines = vec![
            format!(
                "**{}** `{}` `{}` `{}`",
                self.service_name,
                self.environment,
                self.component,
                self.level.as_str()
            ),
            format!(
                "`{}` `{}`{}",
                self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                self.target,
                self.location
                    .as_deref()
                    .map(|loc| format!(" `{loc}`"))
                    .unwrap_or_default()
            ),
        ];

        if let Some(message) = self.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            lines.push(format!("> {message}"));
        }

        if !self.spans.is_empty() {
            let chain: Vec<&str> = self.spans.iter().map(|s| s.name.as_str()).collect();
            lines.push(format!("spans: `{}`", chain.join(" > ")));
        }

        let span_fields = self.spans.iter().flat_map(|span| span.fields.iter());
        for (key, value) in self.fields.iter().chain(span_fields) {
            lines.push(format!("- `{key}` = `{value}`"));
        }

        truncate(lines.join("\n"), ALERT_CONTENT_LIMIT)
    }
}

#[async_trait]
pub(crate) trait AlertSink: Send + Sync {
    async fn send(&self, event: &AlertEvent) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Posts `{"content": ...}`, the chat-webhook shape understood by Discord and compatible relays.
pub(crate) struct WebhookAlertSink {
    webhook_url: Url,
    client: Client,
}

impl WebhookAlertSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(3)).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": event.render() }))
            .send()
            .await
            .map_err(|error| {
                // reqwest errors include the URL, which carries the webhook secret.
                if error.is_timeout() {
                    anyhow!("ops alert webhook timed out")
                } else if error.is_connect() {
                    anyhow!("ops alert webhook connection failed")
                } else {
                    anyhow!("ops alert webhook request failed")
                }
            })?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "ops alert webhook returned non-success status: {}",
                response.status()
            ));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Bounded queue in front of the sinks so logging never blocks on the network.
#[derive(Clone)]
pub(crate) struct AlertDispatcher {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertDispatcher {
    pub(crate) fn spawn(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(ALERT_QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for sink in &sinks {
                    if let Err(error) = sink.send(&event).await {
                        warn!(sink = sink.name(), error = %error, "ops alert sink failed");
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn dispatch(&self, event: AlertEvent) {
        if let Err(err) = self.tx.try_send(event) {
            let reason = match err {
                mpsc::error::TrySendError::Full(_) => "full",
                mpsc::error::TrySendError::Closed(_) => "closed",
            };
            warn!(reason, "ops alert queue unavailable; dropping event");
        }
    }
}

fn truncate(content: String, limit: usize) -> String {
    const SUFFIX: &str = "\n... (truncated)";

    if content.chars().count() <= limit {
        return content;
    }
    let keep = limit.saturating_sub(SUFFIX.len());
    let mut truncated: String = content.chars().take(keep).collect();
    truncated.push_str(SUFFIX);
    truncated
}
