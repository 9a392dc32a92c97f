//! Supervised rendering worker: job dispatch and teardown

use parking_lot::Mutex;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::process::WorkerProcess;
use crate::protocol::{classify, ResponseKind, PING_PAYLOAD};
use crate::state::{StateCell, WorkerState};
use crate::watchdog::Watchdog;
use chartexport_config::WorkerConfig;

/// One rendering process plus the endpoint it serves jobs on
///
/// A pool is expected to hand a worker to one caller at a time; an internal
/// lock serialises concurrent callers anyway. The process is torn down by
/// [`Worker::cleanup`] or, at the latest, when the worker is dropped.
#[derive(Debug)]
pub struct Worker {
    host: String,
    port: u16,
    endpoint: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    max_timeout: Duration,
    state: Arc<StateCell>,
    client: Client,
    process: Mutex<Option<WorkerProcess>>,
    job_lock: tokio::sync::Mutex<()>,
}

impl Worker {
    /// Spawn the worker process and complete the readiness handshake.
    ///
    /// On failure the process has already been killed and no worker exists.
    pub async fn spawn(config: &WorkerConfig) -> WorkerResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .map_err(|e| WorkerError::Startup(format!("Failed to build HTTP client: {}", e)))?;

        let process = WorkerProcess::launch(config).await?;
        debug!("Worker process started on port {}", config.port);

        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            endpoint: config.endpoint_url(),
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            max_timeout: config.max_timeout,
            state: Arc::new(StateCell::new(WorkerState::Idle)),
            client,
            process: Mutex::new(Some(process)),
            job_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Send one job to the worker and return its response body.
    ///
    /// A body starting with `ERROR` is returned, not raised; it is logged at
    /// error level. A connect or read timeout fails with
    /// [`WorkerError::SocketTimeout`]. Otherwise, if the job budget elapses
    /// before the exchange settles, the call fails with
    /// [`WorkerError::JobTimeout`]. Either way a worker whose budget elapsed
    /// stays [`WorkerState::TimedOut`].
    pub async fn request(&self, payload: &str) -> WorkerResult<String> {
        let _serial = self.job_lock.lock().await;

        if !self.is_running() {
            return Err(WorkerError::Conversion(format!(
                "worker on port {} has been shut down",
                self.port
            )));
        }

        debug!(port = self.port, bytes = payload.len(), "Dispatching job");
        self.state.set(WorkerState::Busy);
        let _job = JobGuard { state: &self.state };
        let watchdog = Watchdog::arm(Arc::clone(&self.state), self.max_timeout, self.port);

        let outcome = self.exchange(payload).await;
        watchdog.disarm().await;

        // A socket timeout is reported as such even after the watchdog fired;
        // the worker then stays TIMEDOUT.
        if let Err(e) = &outcome {
            if e.is_timeout() {
                return Err(WorkerError::SocketTimeout(describe(e)));
            }
        }

        if self.state.get() == WorkerState::TimedOut {
            let cause = match &outcome {
                Ok(_) => "response arrived after the job budget".to_string(),
                Err(e) => describe(e),
            };
            return Err(WorkerError::JobTimeout(format!(
                "job on port {} exceeded {:?}: {}",
                self.port, self.max_timeout, cause
            )));
        }

        match outcome {
            Ok(body) => {
                log_response(self.port, &body);
                Ok(body)
            }
            Err(e) => Err(WorkerError::Conversion(describe(&e))),
        }
    }

    /// Liveness check; `true` when the worker answers the ping with `OK`.
    ///
    /// A successful ping leaves the worker idle, which is how a pool clears a
    /// [`WorkerState::TimedOut`] worker after a health check.
    pub async fn ping(&self) -> WorkerResult<bool> {
        let body = self.request(PING_PAYLOAD).await?;
        Ok(classify(&body) == ResponseKind::Ping)
    }

    /// Close the process's streams and terminate it.
    ///
    /// Idempotent and infallible: safe to call repeatedly, after the process
    /// exited on its own, and from `Drop`.
    pub fn cleanup(&self) {
        let process = self.process.lock().take();
        match process {
            Some(process) => {
                process.terminate();
                debug!("Destroyed worker process running on port {}", self.port);
            }
            None => debug!("Worker process on port {} already shut down", self.port),
        }
    }

    /// Whether the process has not been torn down yet
    pub fn is_running(&self) -> bool {
        self.process.lock().is_some()
    }

    /// OS process id of the worker, while it is running
    pub fn pid(&self) -> Option<u32> {
        self.process.lock().as_ref().and_then(WorkerProcess::id)
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Force a state, e.g. after an external health check
    pub fn set_state(&self, state: WorkerState) {
        self.state.set(state);
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn max_timeout(&self) -> Duration {
        self.max_timeout
    }

    async fn exchange(&self, payload: &str) -> Result<String, reqwest::Error> {
        let response = self
            .client
            .post(&self.endpoint)
            .body(payload.to_owned())
            .send()
            .await?;
        response.text().await
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(
                "Shutting down worker on port {}, killing process directly",
                self.port
            );
        }
        self.cleanup();
    }
}

/// Returns a busy worker to idle when the job ends, including when the
/// request future is dropped mid-flight. A watchdog verdict is kept.
struct JobGuard<'a> {
    state: &'a StateCell,
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.state.transition(WorkerState::Busy, WorkerState::Idle);
    }
}

fn log_response(port: u16, body: &str) {
    match classify(body) {
        ResponseKind::WorkerError => error!(port, "Worker exited with message '{}'", body),
        ResponseKind::Message => info!(port, "Worker completed with message '{}'", body),
        ResponseKind::Ping => {}
    }
}

/// Error message including its source chain
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
