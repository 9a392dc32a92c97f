//! Request and error counters for the request-handling layer
//!
//! Workers never touch the monitor; whoever receives end-user requests calls
//! [`Monitor::add`] when a request starts and [`Monitor::add_error`] when it
//! ends in a server-side failure, and logs [`Monitor::report`] periodically.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free request/error counters
#[derive(Debug)]
pub struct Monitor {
    started_at: DateTime<Utc>,
    requests: AtomicU64,
    errors: AtomicU64,
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Count a started request
    pub fn add(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed request
    pub fn add_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// One-line summary suitable for the log
    pub fn report(&self) -> String {
        let requests = self.requests();
        let errors = self.errors();
        let error_rate = if requests == 0 {
            0.0
        } else {
            errors as f64 * 100.0 / requests as f64
        };

        format!(
            "Requests since {}: {}, errors: {} ({:.1}%)",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            requests,
            errors,
            error_rate
        )
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}
