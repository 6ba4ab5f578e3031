//! Scoped "stay awake" resource held for the duration of a scan cycle.
//!
//! Platforms that can suspend the process mid-cycle plug in their own
//! [`KeepAlive`]; the guard releases on drop so every exit path of a cycle
//! gives it back.

/// Source of keep-alive guards
pub trait KeepAlive: Send + Sync {
    fn acquire(&self) -> KeepAliveGuard;
}

/// Releases the keep-alive when dropped
#[must_use = "the keep-alive is released as soon as the guard is dropped"]
pub struct KeepAliveGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl KeepAliveGuard {
    /// Guard running `release` exactly once on drop
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self { release: Some(Box::new(release)) }
    }

    /// Guard with nothing to release
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for KeepAliveGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for KeepAliveGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepAliveGuard").field("held", &self.release.is_some()).finish()
    }
}

/// For hosts that never suspend a running process
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeepAlive;

impl KeepAlive for NoKeepAlive {
    fn acquire(&self) -> KeepAliveGuard {
        KeepAliveGuard::noop()
    }
}
