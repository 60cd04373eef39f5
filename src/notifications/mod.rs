use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Notification errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Tells a customer their order is ready. Best effort: `Ok(false)` means the
/// channel declined the message, `Err` means it could not be reached.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderReadyNotifier: Send + Sync {
    async fn notify_order_ready(&self, email: &str, order_id: i32)
        -> Result<bool, NotificationError>;
}

/// Writes the notification to the log only
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl OrderReadyNotifier for LoggingNotifier {
    async fn notify_order_ready(
        &self,
        email: &str,
        order_id: i32,
    ) -> Result<bool, NotificationError> {
        info!(order_id, email, "order ready notification");
        Ok(true)
    }
}

#[derive(Debug, Serialize)]
struct OrderReadyPayload<'a> {
    email: &'a str,
    order_id: i32,
    event: &'static str,
}

/// Posts a JSON payload to a configured endpoint
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl OrderReadyNotifier for WebhookNotifier {
    #[instrument(skip(self, email), fields(url = %self.url))]
    async fn notify_order_ready(
        &self,
        email: &str,
        order_id: i32,
    ) -> Result<bool, NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .json(&OrderReadyPayload {
                email,
                order_id,
                event: "order.ready",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(order_id, %status, "order ready webhook rejected");
        }
        Ok(status.is_success())
    }
}

/// Builds the notifier selected by configuration
pub fn notifier_from_config(
    config: &crate::config::AppConfig,
) -> Result<Arc<dyn OrderReadyNotifier>, NotificationError> {
    match config.notification_webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Ok(Arc::new(WebhookNotifier::new(
            url,
            Duration::from_secs(config.notification_timeout_secs),
        )?)),
        _ => Ok(Arc::new(LoggingNotifier)),
    }
}

/// Sends the notification on a detached task. Failures are logged and never
/// reach the caller.
pub fn dispatch_order_ready(
    notifier: Arc<dyn OrderReadyNotifier>,
    email: String,
    order_id: i32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.notify_order_ready(&email, order_id).await {
            Ok(true) => {
                metrics::counter!("pos.notifications.sent", 1);
            }
            Ok(false) => {
                metrics::counter!("pos.notifications.failed", 1);
                warn!(order_id, "order ready notification was not accepted");
            }
            Err(e) => {
                metrics::counter!("pos.notifications.failed", 1);
                warn!(order_id, error = %e, "order ready notification failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn dispatch_calls_the_notifier_once() {
        let mut mock = MockOrderReadyNotifier::new();
        mock.expect_notify_order_ready()
            .with(eq("guest@example.com"), eq(42))
            .times(1)
            .returning(|_, _| Ok(true));

        dispatch_order_ready(Arc::new(mock), "guest@example.com".into(), 42)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dispatch_swallows_notifier_errors() {
        let mut mock = MockOrderReadyNotifier::new();
        mock.expect_notify_order_ready()
            .times(1)
            .returning(|_, _| Err(NotificationError::Internal("smtp down".into())));

        let handle = dispatch_order_ready(Arc::new(mock), "guest@example.com".into(), 7);
        assert!(handle.await.is_ok());
    }

    #[test]
    fn config_without_webhook_selects_logging_notifier() {
        let cfg = crate::config::AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            0,
            "test".into(),
        );
        assert!(notifier_from_config(&cfg).is_ok());
    }
}
