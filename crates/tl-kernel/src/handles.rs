//! Shared run-control state: the stop flag and progress counters.
//!
//! Both handles are cheap to clone and safe to poll from other threads while
//! a run is in progress.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tl_core::Real;

/// Why a component asked the run to end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StopReason {
    pub component: String,
    pub message: String,
}

#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<StopReason>>>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cooperative cancellation; honored at the next step boundary.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Stop on behalf of a component. The first reason recorded wins.
    pub fn request_failure(&self, component: &str, message: &str) {
        {
            let mut reason = self.reason.lock().unwrap_or_else(|e| e.into_inner());
            if reason.is_none() {
                *reason = Some(StopReason {
                    component: component.to_string(),
                    message: message.to_string(),
                });
            }
        }
        self.request_stop();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn reset(&self) {
        *self.reason.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Progress {
    pub step: u64,
    pub total_steps: u64,
    pub time: Real,
    pub fraction: Real,
}

#[derive(Clone, Debug, Default)]
pub struct ProgressHandle {
    step: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
    time_bits: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
}

impl ProgressHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Progress {
        let step = self.step.load(Ordering::Relaxed);
        let total = self.total.load(Ordering::Relaxed);
        let fraction = if total > 0 {
            step as Real / total as Real
        } else {
            0.0
        };
        Progress {
            step,
            total_steps: total,
            time: Real::from_bits(self.time_bits.load(Ordering::Relaxed)),
            fraction,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub(crate) fn start(&self, total_steps: u64, time: Real) {
        self.finished.store(false, Ordering::SeqCst);
        self.total.store(total_steps, Ordering::Relaxed);
        self.update(0, time);
    }

    pub(crate) fn update(&self, step: u64, time: Real) {
        self.step.store(step, Ordering::Relaxed);
        self.time_bits.store(time.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_reason_is_kept() {
        let h = StopHandle::new();
        let other = h.clone();
        other.request_failure("valve", "spool stuck");
        h.request_failure("pump", "later");
        assert!(h.is_stop_requested());
        assert_eq!(h.reason().unwrap().component, "valve");
        h.reset();
        assert!(!other.is_stop_requested());
        assert!(other.reason().is_none());
    }

    #[test]
    fn progress_fraction() {
        let p = ProgressHandle::new();
        p.start(200, 0.0);
        p.update(50, 0.5);
        let s = p.snapshot();
        assert_eq!(s.step, 50);
        assert_eq!(s.fraction, 0.25);
        assert_eq!(s.time, 0.5);
        assert!(!p.is_finished());
        p.finish();
        assert!(p.is_finished());
    }
}
