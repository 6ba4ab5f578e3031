//! svcwatch - polling and failure-escalation engine for HTTP service monitoring
//!
//! This library decides which endpoints are due, probes them concurrently with
//! bounded retries, records the outcome per endpoint and turns the aggregate
//! health into a graduated alarm (none, weak, strong).
//!
//! Storage, notification rendering, connectivity detection and the periodic
//! wake-up are collaborators behind traits so the binary can plug in its own.

pub mod connectivity;
pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod escalation;
pub mod events;
pub mod keepalive;
pub mod notify;
pub mod probe;
pub mod settings;
pub mod store;

// Re-export main types
pub use connectivity::{AlwaysOnline, Connectivity, TcpConnectivity};
pub use coordinator::{CycleOutcome, CycleReport, PollCoordinator, SkipReason};
pub use endpoint::{Endpoint, EndpointId, NewEndpoint, Status};
pub use error::{EndpointError, NotifyError, ProbeFailure, SettingsError, StoreError};
pub use escalation::{Alert, Decision, EscalationEngine, Tier};
pub use events::{CycleEvent, EventBus};
pub use keepalive::{KeepAlive, KeepAliveGuard, NoKeepAlive};
pub use notify::{FanoutNotifier, LogNotifier, Notifier, WebhookNotifier};
pub use probe::{HttpProbe, Outcome, Probe, ProbeExecutor};
pub use settings::MonitorSettings;
pub use store::{EndpointCatalog, EndpointStore, FailureAggregate, MemoryStore};

/// Timestamps are milliseconds since the Unix epoch; 0 means "never".
pub type Millis = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> Millis {
    chrono::Utc::now().timestamp_millis()
}

/// User agent sent with every probe request
pub const USER_AGENT: &str = concat!("svcwatch/", env!("CARGO_PKG_VERSION"));
