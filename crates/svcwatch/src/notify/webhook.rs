use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::Notifier;
use crate::error::NotifyError;
use crate::escalation::{Alert, Tier};

/// Posts alert transitions as JSON to a webhook
///
/// Refreshes of an unchanged alert are not re-sent; a change of tier or
/// count is.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
    /// Last (tier, count) delivered, `None` when no alert is active
    delivered: Mutex<Option<(Tier, u64)>>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).user_agent(crate::USER_AGENT).build()?;

        Ok(Self {
            url: url.into(),
            client,
            delivered: Mutex::new(None),
        })
    }

    async fn post(&self, payload: serde_json::Value) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(format!("webhook request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "webhook answered {}",
                response.status().as_u16()
            )));
        }

        Ok(())
    }
}

fn raise_payload(alert: &Alert) -> serde_json::Value {
    let since = alert
        .since
        .filter(|millis| *millis > 0)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|at| at.to_rfc3339());

    json!({
        "event": "raise",
        "tier": alert.tier,
        "count": alert.count,
        "new_failures": alert.new_failures,
        "insistent": alert.tier.is_insistent(),
        "last_ok": since,
        "text": alert.to_string(),
        "timestamp": Utc::now().to_rfc3339(),
    })
}

fn cancel_payload() -> serde_json::Value {
    json!({
        "event": "cancel",
        "tier": Tier::None,
        "text": "All services reachable",
        "timestamp": Utc::now().to_rfc3339(),
    })
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn raise(&self, alert: &Alert) -> Result<(), NotifyError> {
        let mut delivered = self.delivered.lock().await;
        let current = (alert.tier, alert.count);

        if *delivered == Some(current) {
            debug!("Webhook: {} alert unchanged, not re-sent", alert.tier);
            return Ok(());
        }

        self.post(raise_payload(alert)).await?;
        info!("Webhook: delivered {} alert for {} service(s)", alert.tier, alert.count);
        *delivered = Some(current);
        Ok(())
    }

    async fn cancel(&self) -> Result<(), NotifyError> {
        let mut delivered = self.delivered.lock().await;
        if delivered.is_none() {
            return Ok(());
        }

        self.post(cancel_payload()).await?;
        info!("Webhook: delivered alert cancellation");
        *delivered = None;
        Ok(())
    }
}
