//! Monitored endpoints and their health bookkeeping.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Millis;
use crate::error::{EndpointError, StoreError};

/// Stable identifier of an endpoint, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(pub i64);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Health status of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Never probed since creation or the last edit
    New,
    Ok,
    Fail,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "NEW",
            Status::Ok => "OK",
            Status::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Status::New),
            "OK" => Ok(Status::Ok),
            "FAIL" => Ok(Status::Fail),
            other => Err(StoreError::Corrupt(format!("unknown status '{other}'"))),
        }
    }
}

/// A monitored HTTP target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    pub name: String,
    pub address: String,
    pub status: Status,
    /// Last successful probe, 0 if the endpoint never answered 200
    pub last_ok: Millis,
    /// Last probe attempt of any outcome
    pub last_check: Millis,
    /// Set once this failure was counted by a raised alarm, cleared on recovery
    pub notified: bool,
}

impl Endpoint {
    /// Fresh endpoint as created by the catalog.
    pub fn new(id: EndpointId, new: NewEndpoint) -> Self {
        Self {
            id,
            name: new.name,
            address: new.address,
            status: Status::New,
            last_ok: 0,
            last_check: 0,
            notified: false,
        }
    }

    /// Whether a cycle at `now` should probe this endpoint.
    ///
    /// Failing endpoints are always due; others once half the check interval
    /// has elapsed since the last attempt.
    pub fn is_due(&self, now: Millis, check_interval: Duration) -> bool {
        self.status == Status::Fail || now - self.last_check > half_interval_millis(check_interval)
    }

    /// Whether this endpoint has been failing for longer than `react_interval`.
    pub fn is_persistently_failing(&self, now: Millis, react_interval: Duration) -> bool {
        self.status == Status::Fail && now - self.last_ok > duration_millis(react_interval)
    }

    pub fn record_success(&mut self, now: Millis) {
        self.status = Status::Ok;
        self.last_ok = now;
        self.last_check = now;
        self.notified = false;
    }

    pub fn record_failure(&mut self, now: Millis) {
        self.status = Status::Fail;
        // A clock step backwards must not put last_check before last_ok.
        self.last_check = now.max(self.last_ok);
    }

    /// Forget all probe history, as done after an edit.
    pub fn reset(&mut self) {
        self.status = Status::New;
        self.last_ok = 0;
        self.last_check = 0;
        self.notified = false;
    }
}

/// Validated input for creating or editing an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEndpoint {
    pub name: String,
    pub address: String,
}

impl NewEndpoint {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Result<Self, EndpointError> {
        let name = name.into().trim().to_string();
        let address = address.into().trim().to_string();

        if name.is_empty() {
            return Err(EndpointError::Required("name"));
        }
        if address.is_empty() {
            return Err(EndpointError::Required("address"));
        }
        validate_address(&address)?;

        Ok(Self { name, address })
    }
}

/// Only absolute http(s) URLs can be probed.
pub fn validate_address(address: &str) -> Result<(), EndpointError> {
    let url = Url::parse(address).map_err(|e| EndpointError::InvalidAddress(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().is_none() {
        return Err(EndpointError::InvalidAddress(format!("{address} has no host")));
    }

    Ok(())
}

/// Duration as epoch-millisecond offset, saturating.
pub fn duration_millis(duration: Duration) -> Millis {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Staleness threshold of the due rule.
pub fn half_interval_millis(interval: Duration) -> Millis {
    duration_millis(interval) / 2
}
