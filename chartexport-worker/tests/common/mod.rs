//! Shared fixtures: fake worker processes, fake worker endpoints, log capture

#![allow(dead_code)]

use axum::{extract::State, routing::post, Router};
use chartexport_worker::{WorkerConfig, PING_PAYLOAD};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Script that announces readiness and then idles like a listening worker
pub const READY_SCRIPT: &str = "echo 'OK, PhantomJS is ready.'\nexec sleep 30\n";

/// Write an `sh` script into `dir` and return its path
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    path
}

/// Worker configuration running `script` through `sh`
pub fn worker_config(dir: &Path, script: PathBuf, port: u16) -> WorkerConfig {
    WorkerConfig {
        exec: PathBuf::from("sh"),
        script: Some(script),
        host: "127.0.0.1".to_string(),
        port,
        connect_timeout: Duration::from_secs(1),
        read_timeout: Duration::from_secs(2),
        max_timeout: Duration::from_secs(5),
        startup_timeout: Some(Duration::from_secs(5)),
        temp_dir: dir.to_path_buf(),
    }
}

/// Whether a process is still running (not exited and not a zombie)
pub fn process_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // The state field follows the parenthesised command name
        Ok(stat) => stat
            .rsplit_once(')')
            .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// Poll until `pid` is gone, giving up after two seconds
pub async fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..40 {
        if !process_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

/// A port nothing listens on
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[derive(Clone)]
struct EndpointState {
    delay: Duration,
    reply: String,
    received: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

/// HTTP endpoint standing in for the rendering worker's web server
pub struct FakeEndpoint {
    pub port: u16,
    received: Arc<Mutex<Vec<String>>>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeEndpoint {
    /// Payloads received so far
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Highest number of jobs observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

async fn render_handler(State(state): State<EndpointState>, payload: String) -> String {
    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_in_flight.fetch_max(now, Ordering::SeqCst);
    state.received.lock().unwrap().push(payload.clone());

    tokio::time::sleep(state.delay).await;
    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    if payload == PING_PAYLOAD {
        "OK".to_string()
    } else {
        state.reply.clone()
    }
}

/// Serve `reply` to every job after `delay`; pings are answered with `OK`
pub async fn start_endpoint(delay: Duration, reply: &str) -> FakeEndpoint {
    let state = EndpointState {
        delay,
        reply: reply.to_string(),
        received: Arc::new(Mutex::new(Vec::new())),
        in_flight: Arc::new(AtomicUsize::new(0)),
        max_in_flight: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new()
        .route("/", post(render_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeEndpoint {
        port,
        received: state.received,
        max_in_flight: state.max_in_flight,
    }
}

/// Accept connections and drop them after `delay` without answering
pub async fn start_hangup_endpoint(delay: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                drop(socket);
            });
        }
    });

    port
}

/// Listening socket whose accept queue is full, so new connects hang
pub struct BackloggedEndpoint {
    pub port: u16,
    _listener: TcpListener,
    _clients: Vec<TcpStream>,
}

/// Listen with a backlog of one, never accept, and fill the queue until
/// further connection attempts stall
pub async fn start_backlogged_endpoint() -> BackloggedEndpoint {
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(1).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut clients = Vec::new();
    for _ in 0..16 {
        match tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => clients.push(stream),
            _ => break,
        }
    }

    BackloggedEndpoint {
        port: addr.port(),
        _listener: listener,
        _clients: clients,
    }
}

/// Records events emitted by this crate at info level and above
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CapturedLogs {
    pub fn events(&self) -> Vec<(Level, String)> {
        self.events.lock().unwrap().clone()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("chartexport_worker") || *metadata.level() > Level::INFO
        {
            return;
        }

        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.events
            .lock()
            .unwrap()
            .push((*metadata.level(), visitor.0));
    }
}

/// Install a thread-local subscriber that records this crate's events
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    use tracing_subscriber::layer::SubscriberExt;

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::registry().with(logs.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}
