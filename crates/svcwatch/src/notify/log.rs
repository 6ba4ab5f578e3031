use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::Notifier;
use crate::error::NotifyError;
use crate::escalation::{Alert, Tier};

/// Renders alerts into the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

fn format_since(since: Option<i64>) -> String {
    match since.and_then(DateTime::<Utc>::from_timestamp_millis) {
        Some(at) if at.timestamp_millis() > 0 => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        _ => "never".to_string(),
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn raise(&self, alert: &Alert) -> Result<(), NotifyError> {
        let last_ok = format_since(alert.since);
        match alert.tier {
            Tier::None => info!("{}", alert),
            Tier::Weak => warn!(count = alert.count, last_ok = %last_ok, "[ALERT] {}", alert),
            Tier::Strong => error!(
                count = alert.count,
                new = alert.new_failures,
                last_ok = %last_ok,
                "[ALARM] {}",
                alert
            ),
        }
        Ok(())
    }

    async fn cancel(&self) -> Result<(), NotifyError> {
        info!("Alert cleared");
        Ok(())
    }
}
