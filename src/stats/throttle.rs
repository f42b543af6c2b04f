use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Minimum spacing between two operational warnings of the same kind.
pub const OPS_ALERT_INTERVAL: Duration = Duration::from_secs(60);

/// Lets an operational warning through at most once per `interval`.
pub struct AlertThrottle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl AlertThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn ready(&self) -> bool {
        self.ready_at(Instant::now())
    }

    /// Claims the slot if `interval` has passed since the last claim.
    pub fn ready_at(&self, now: Instant) -> bool {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(previous) if now.saturating_duration_since(previous) < self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}
