#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use svcwatch::{
    Alert, Connectivity, Endpoint, EndpointId, KeepAlive, KeepAliveGuard, Millis, MonitorSettings, NotifyError,
    Notifier, Probe, ProbeExecutor, ProbeFailure, Status,
};

pub const MINUTE: Millis = 60 * 1000;
pub const HOUR: Millis = 60 * MINUTE;

/// Fixed "now" far enough from the epoch for any offset used in tests
pub const NOW: Millis = 1_700_000_000_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn settings() -> MonitorSettings {
    MonitorSettings::builder()
        .check_interval(Duration::from_secs(600))
        .react_interval(Duration::from_secs(55 * 60))
        .retry_attempts(1)
        .retry_delay(Duration::ZERO)
        .build()
}

pub fn endpoint(id: i64, status: Status, last_ok: Millis, last_check: Millis) -> Endpoint {
    Endpoint {
        id: EndpointId(id),
        name: format!("svc-{id}"),
        address: format!("http://svc-{id}.test/health"),
        status,
        last_ok,
        last_check,
        notified: false,
    }
}

/// How the scripted probe answers one address
#[derive(Debug, Clone)]
pub enum Behaviour {
    Healthy,
    Down(u16),
    /// Sleep first, then answer healthy
    Slow(Duration),
    Panic,
}

/// Probe answering from a per-address script and counting attempts
#[derive(Default)]
pub struct ScriptedProbe {
    script: Mutex<HashMap<String, Behaviour>>,
    calls: Mutex<HashMap<String, usize>>,
    pub running: AtomicUsize,
    pub peak: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, endpoint: &Endpoint, behaviour: Behaviour) {
        self.script.lock().unwrap().insert(endpoint.address.clone(), behaviour);
    }

    pub fn calls(&self, endpoint: &Endpoint) -> usize {
        self.calls.lock().unwrap().get(&endpoint.address).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn attempt(&self, address: &str) -> Result<(), ProbeFailure> {
        *self.calls.lock().unwrap().entry(address.to_string()).or_default() += 1;
        let behaviour = self.script.lock().unwrap().get(address).cloned().unwrap_or(Behaviour::Healthy);

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        let result = match behaviour {
            Behaviour::Healthy => Ok(()),
            Behaviour::Down(code) => Err(ProbeFailure::Status(code)),
            Behaviour::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Behaviour::Panic => {
                self.running.fetch_sub(1, Ordering::SeqCst);
                panic!("probe blew up for {address}");
            }
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn executor(probe: Arc<ScriptedProbe>, settings: &MonitorSettings) -> ProbeExecutor {
    ProbeExecutor::new(probe, settings.retry_attempts, settings.retry_delay)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Raise(Alert),
    Cancel,
}

/// Notifier remembering every call in order
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<Call>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Call> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn raise(&self, alert: &Alert) -> Result<(), NotifyError> {
        self.calls.lock().unwrap().push(Call::Raise(*alert));
        Ok(())
    }

    async fn cancel(&self) -> Result<(), NotifyError> {
        self.calls.lock().unwrap().push(Call::Cancel);
        Ok(())
    }
}

/// Keep-alive counting acquisitions and releases
#[derive(Default)]
pub struct CountingKeepAlive {
    pub acquired: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl CountingKeepAlive {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl KeepAlive for CountingKeepAlive {
    fn acquire(&self) -> KeepAliveGuard {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let released = self.released.clone();
        KeepAliveGuard::new(move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// Connectivity switchable from the test
pub struct Switch {
    online: AtomicBool,
    checks: AtomicUsize,
}

impl Switch {
    pub fn new(online: bool) -> Arc<Self> {
        Arc::new(Self { online: AtomicBool::new(online), checks: AtomicUsize::new(0) })
    }

    pub fn set(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connectivity for Switch {
    async fn is_reachable(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.online.load(Ordering::SeqCst)
    }
}

/// Goes offline after the first check, i.e. right after the cycle gate
pub struct DropsAfterGate {
    checks: AtomicUsize,
}

impl DropsAfterGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { checks: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl Connectivity for DropsAfterGate {
    async fn is_reachable(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst) == 0
    }
}
