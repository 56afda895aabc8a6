//! PurgeTimer: the single delayed cleanup armed while nobody is signed in

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default delay between sign-out and the purge of report data
pub const DEFAULT_PURGE_DELAY: Duration = Duration::from_secs(30 * 60);

/// At most one outstanding delayed task.
///
/// Scheduling replaces (aborts) any pending task. Requires a tokio runtime
/// at scheduling time; without one nothing is armed.
#[derive(Debug)]
pub struct PurgeTimer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl PurgeTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the timer, cancelling any pending one. Returns whether it was armed.
    pub fn schedule<F>(&self, action: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime available; purge not scheduled");
            return false;
        };

        let delay = self.delay;
        *pending = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        }));
        tracing::debug!("Purge scheduled in {:?}", delay);
        true
    }

    /// Disarm the timer. Returns whether a pending task was cancelled.
    pub fn cancel(&self) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                tracing::debug!("Pending purge cancelled");
                true
            }
            _ => false,
        }
    }

    /// True while a scheduled task has not yet fired
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PurgeTimer {
    fn drop(&mut self) {
        if let Some(handle) = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
