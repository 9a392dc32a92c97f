//! One-shot job timer
//!
//! A [`Watchdog`] is armed when a job starts. If it is still armed after the
//! job budget elapses it marks the worker [`WorkerState::TimedOut`]. It never
//! touches the in-flight connection; the request ends through its own socket
//! timeouts and then observes the flag.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::state::{StateCell, WorkerState};

/// Armed one-shot timer bound to a worker's state cell
///
/// Dropping the watchdog aborts the timer without waiting for it, so a
/// cancelled request cannot leave a stray timer behind.
#[derive(Debug)]
pub struct Watchdog {
    timer: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Arm a timer that flips `state` to `TimedOut` after `budget`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(state: Arc<StateCell>, budget: Duration, port: u16) -> Self {
        let timer = tokio::spawn(async move {
            tokio::time::sleep(budget).await;
            state.set(WorkerState::TimedOut);
            warn!(
                port,
                "Job on worker port {} exceeded {:?}, marking worker as timed out", port, budget
            );
        });

        Self { timer: Some(timer) }
    }

    /// Cancel the timer and wait until it can no longer fire.
    ///
    /// A timer caught mid-fire completes its store before this returns. Has
    /// no effect if it already fired.
    pub async fn disarm(mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            // Cancelled or finished; either way the task is gone
            let _ = timer.await;
        }
    }

    fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}
