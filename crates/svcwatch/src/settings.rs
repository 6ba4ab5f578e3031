//! Tunables of the polling and escalation engine.

use std::time::Duration;

use tracing::warn;

use crate::error::SettingsError;

const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(10);
const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 3600);
const MIN_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(300);

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Nominal re-probe period of a healthy endpoint
    pub check_interval: Duration,

    /// How long an endpoint must fail before the alarm turns strong
    pub react_interval: Duration,

    /// Sequential attempts per probe
    pub retry_attempts: u32,

    /// Connect and overall request timeout of one attempt
    pub probe_timeout: Duration,

    /// Pause between two attempts against the same endpoint
    pub retry_delay: Duration,

    /// Upper bound of probes in flight, unbounded when `None`
    pub max_concurrency: Option<usize>,

    /// Re-check connectivity before recording a failure and drop it if offline
    pub discard_offline_failures: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(10 * 60),
            react_interval: Duration::from_secs(55 * 60),
            retry_attempts: 3,
            probe_timeout: Duration::from_secs(15),
            retry_delay: Duration::from_secs(5),
            max_concurrency: None,
            discard_offline_failures: false,
        }
    }
}

impl MonitorSettings {
    /// Create a new settings builder
    pub fn builder() -> MonitorSettingsBuilder {
        MonitorSettingsBuilder::default()
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.check_interval < MIN_CHECK_INTERVAL {
            return Err(SettingsError::IntervalTooShort(self.check_interval, MIN_CHECK_INTERVAL));
        }
        if self.check_interval > MAX_CHECK_INTERVAL {
            return Err(SettingsError::IntervalTooLong(self.check_interval, MAX_CHECK_INTERVAL));
        }
        if self.probe_timeout < MIN_PROBE_TIMEOUT || self.probe_timeout > MAX_PROBE_TIMEOUT {
            return Err(SettingsError::TimeoutOutOfRange(
                self.probe_timeout,
                MIN_PROBE_TIMEOUT,
                MAX_PROBE_TIMEOUT,
            ));
        }
        if self.retry_attempts == 0 {
            return Err(SettingsError::NoAttempts);
        }
        if self.max_concurrency == Some(0) {
            return Err(SettingsError::ZeroConcurrency);
        }

        if self.react_interval <= self.check_interval {
            warn!(
                "React interval {:?} is not longer than the check interval {:?}; single failures will escalate at once",
                self.react_interval, self.check_interval
            );
        }

        Ok(())
    }

    /// Worst-case duration of one probe including retries.
    pub fn probe_budget(&self) -> Duration {
        let attempts = self.retry_attempts.max(1);
        self.probe_timeout * attempts + self.retry_delay * (attempts - 1)
    }
}

/// Builder for MonitorSettings
#[derive(Default)]
pub struct MonitorSettingsBuilder {
    settings: MonitorSettings,
}

impl MonitorSettingsBuilder {
    /// Build the settings
    pub fn build(self) -> MonitorSettings {
        self.settings
    }

    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.settings.check_interval = interval;
        self
    }

    pub fn react_interval(mut self, interval: Duration) -> Self {
        self.settings.react_interval = interval;
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.settings.retry_attempts = attempts;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.settings.probe_timeout = timeout;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.settings.retry_delay = delay;
        self
    }

    /// Bound the number of concurrent probes
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.settings.max_concurrency = Some(limit);
        self
    }

    /// Let every due endpoint be probed at once
    pub fn unbounded(mut self) -> Self {
        self.settings.max_concurrency = None;
        self
    }

    pub fn discard_offline_failures(mut self, enable: bool) -> Self {
        self.settings.discard_offline_failures = enable;
        self
    }
}
