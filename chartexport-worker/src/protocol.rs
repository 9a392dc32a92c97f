//! Wire-level conventions shared with the rendering worker script

use chartexport_config::WorkerConfig;
use std::ffi::OsString;

/// Substring the worker prints on its first stdout line once it listens
pub const READY_SENTINEL: &str = "ready";

/// Payload the worker script answers with [`PING_RESPONSE`] without rendering
pub const PING_PAYLOAD: &str = r#"{"status":"isok"}"#;

/// Body returned for a liveness ping
pub const PING_RESPONSE: &str = "OK";

const ERROR_PREFIX: &str = "ERROR";

/// How a response body is treated once received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Exactly `OK`: a liveness answer, not logged
    Ping,
    /// Starts with `ERROR` (any case): the worker reported a failure
    WorkerError,
    /// Anything else: a conversion result
    Message,
}

/// Classify a response body
pub fn classify(body: &str) -> ResponseKind {
    let reports_error = body
        .get(..ERROR_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(ERROR_PREFIX));

    if reports_error {
        ResponseKind::WorkerError
    } else if body == PING_RESPONSE {
        ResponseKind::Ping
    } else {
        ResponseKind::Message
    }
}

/// Whether the handshake line announces a ready worker
pub fn is_ready_line(line: &str) -> bool {
    line.contains(READY_SENTINEL)
}

/// Arguments passed to the worker executable:
/// `script -host <host> -port <port> -tmpdir <output dir>`
pub fn launch_args(config: &WorkerConfig) -> Vec<OsString> {
    vec![
        config.script_path().into_os_string(),
        "-host".into(),
        config.host.clone().into(),
        "-port".into(),
        config.port.to_string().into(),
        "-tmpdir".into(),
        config.output_dir().into_os_string(),
    ]
}
