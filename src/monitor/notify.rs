//! Notification channels for alert dispatch.
//!
//! Channels are best-effort: every failure is logged and contained here,
//! never surfaced to the monitoring cycle or any functional caller. Each
//! dispatch gets one bounded retry of its own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use super::alerts::{Alert, AlertSeverity, AlertTransition};

/// Structured payload handed to every channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// `triggered` or `resolved`.
    pub kind: String,
    pub title: String,
    pub description: String,
    pub component: String,
    pub timestamp: DateTime<Utc>,
}

impl NotificationPayload {
    pub fn from_transition(transition: &AlertTransition) -> Self {
        match transition {
            AlertTransition::Triggered(alert) => Self::triggered(alert),
            AlertTransition::Resolved(alert) => Self::resolved(alert),
        }
    }

    fn triggered(alert: &Alert) -> Self {
        let severity = match alert.severity {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "CRITICAL",
        };
        Self {
            kind: "triggered".to_string(),
            title: format!("[{severity}] {}", alert.rule),
            description: format!(
                "{} is {:.4}, threshold {:.4}",
                alert.metric, alert.value, alert.threshold
            ),
            component: alert.metric.clone(),
            timestamp: alert.triggered_at,
        }
    }

    fn resolved(alert: &Alert) -> Self {
        Self {
            kind: "resolved".to_string(),
            title: format!("[resolved] {}", alert.rule),
            description: format!("{} is back within bounds", alert.metric),
            component: alert.metric.clone(),
            timestamp: alert.resolved_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("notification endpoint returned status {status}")]
    Rejected { status: u16 },
}

/// One delivery target. Implementations must be cheap to call concurrently;
/// the dashboard fans out to every channel per transition.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError>;
}

/// Generic webhook: POSTs the payload as JSON.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Slack incoming-webhook channel.
pub struct SlackChannel {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackChannel {
    pub fn new(client: reqwest::Client, webhook_url: &str) -> Self {
        Self {
            client,
            webhook_url: webhook_url.to_string(),
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let body = json!({
            "text": format!("{}\n{}", payload.title, payload.description),
        });
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::RecordingChannel;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use parking_lot::Mutex;

    use async_trait::async_trait;

    use super::{NotificationChannel, NotificationPayload, NotifyError};

    /// Records payloads instead of delivering them; optionally fails a
    /// scripted number of leading calls.
    #[derive(Default)]
    pub struct RecordingChannel {
        received: Mutex<Vec<NotificationPayload>>,
        failures_remaining: Mutex<u32>,
    }

    impl RecordingChannel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_next(&self, count: u32) {
            *self.failures_remaining.lock() = count;
        }

        pub fn received(&self) -> Vec<NotificationPayload> {
            self.received.lock().clone()
        }
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
            {
                let mut failures = self.failures_remaining.lock();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(NotifyError::Rejected { status: 503 });
                }
            }
            self.received.lock().push(payload.clone());
            Ok(())
        }
    }
}
