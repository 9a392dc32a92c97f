//! Rendering process lifecycle: spawn, readiness handshake, teardown

use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::WorkerError;
use crate::protocol::{is_ready_line, launch_args};
use chartexport_config::WorkerConfig;

/// A spawned rendering process that passed its readiness handshake
///
/// Owns the child and its three standard streams. stdout and stderr are
/// drained into the debug log for the lifetime of the process so the child
/// never blocks on a full pipe.
#[derive(Debug)]
pub struct WorkerProcess {
    port: u16,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
}

impl WorkerProcess {
    /// Spawn the worker executable and wait for its readiness line
    pub async fn launch(config: &WorkerConfig) -> Result<Self, WorkerError> {
        let args = launch_args(config);
        debug!("Launching worker: {:?} {:?}", config.exec, args);

        let mut cmd = Command::new(&config.exec);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        terminate_with_parent(&mut cmd);

        let mut child = cmd.spawn().map_err(|e| {
            WorkerError::Startup(format!("Failed to spawn {:?}: {}", config.exec, e))
        })?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WorkerError::Startup("Failed to get stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| WorkerError::Startup("Failed to get stderr".to_string()))?;

        let mut reader = BufReader::new(stdout);
        if let Err(reason) = read_handshake(&mut reader, config).await {
            warn!("Command starting worker on port {} failed: {}", config.port, reason);
            if let Err(e) = child.kill().await {
                debug!("Failed to kill worker process on port {}: {}", config.port, e);
            }
            return Err(WorkerError::Startup(reason));
        }

        let port = config.port;
        Ok(Self {
            port,
            child,
            stdin,
            stdout_task: tokio::spawn(drain_lines(port, "stdout", reader)),
            stderr_task: tokio::spawn(drain_lines(port, "stderr", BufReader::new(stderr))),
        })
    }

    /// OS process id, if the child has not been reaped yet
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Close the process's streams and kill it.
    ///
    /// Never fails: every problem is logged and swallowed. Safe to call from
    /// `Drop` and outside a runtime.
    pub fn terminate(mut self) {
        // Input stream
        drop(self.stdin.take());
        // Output and error streams are owned by the drain tasks
        self.stdout_task.abort();
        self.stderr_task.abort();

        if let Err(e) = self.child.start_kill() {
            warn!("Error while shutting down process on port {}: {}", self.port, e);
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("Worker process on port {} exited with {}", self.port, status)
            }
            // Not reaped yet; Tokio reaps killed children in the background
            Ok(None) => {}
            Err(e) => debug!("Failed to reap worker process on port {}: {}", self.port, e),
        }
    }
}

/// Read the first stdout line and check it for the ready sentinel
async fn read_handshake(
    reader: &mut BufReader<ChildStdout>,
    config: &WorkerConfig,
) -> Result<(), String> {
    let mut line = String::new();
    let read = reader.read_line(&mut line);

    let outcome = match config.startup_timeout {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| format!("no readiness line within {:?}", limit))?,
        None => read.await,
    };

    match outcome {
        Ok(0) => Err("worker closed stdout before signalling readiness".to_string()),
        Ok(_) if is_ready_line(&line) => {
            debug!("Worker on port {} is ready: {}", config.port, line.trim_end());
            Ok(())
        }
        Ok(_) => Err(format!("unexpected first line: {:?}", line.trim_end())),
        Err(e) => Err(format!("failed to read worker stdout: {}", e)),
    }
}

/// Forward every line of a child stream to the debug log until EOF
async fn drain_lines<R>(port: u16, stream: &'static str, reader: BufReader<R>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(port, stream, "worker: {}", line),
            Ok(None) => {
                debug!("Worker on port {} closed {}", port, stream);
                break;
            }
            Err(e) => {
                debug!("Failed to read worker {} on port {}: {}", stream, port, e);
                break;
            }
        }
    }
}

/// Ask the kernel to kill the worker when this process dies, so a crashed
/// supervisor never leaves orphaned rendering processes behind.
#[cfg(target_os = "linux")]
fn terminate_with_parent(cmd: &mut Command) {
    use nix::sys::prctl;
    use nix::sys::signal::Signal;

    // The signal is tied to the spawning thread, which for a runtime worker
    // thread lives as long as the runtime.
    // SAFETY: the closure only performs the async-signal-safe prctl syscall.
    unsafe {
        cmd.pre_exec(|| {
            prctl::set_pdeathsig(Signal::SIGTERM).map_err(std::io::Error::from)
        });
    }
}

#[cfg(not(target_os = "linux"))]
fn terminate_with_parent(_cmd: &mut Command) {}
