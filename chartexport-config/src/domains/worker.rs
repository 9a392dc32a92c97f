//! Rendering worker process configuration

use crate::error::ConfigResult;
use crate::validation::{
    validate_duration, validate_port_range, validate_required_string, Validatable,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// File name of the conversion script shipped inside the temp directory
pub const BUNDLED_SCRIPT_NAME: &str = "highcharts-convert.js";

/// Configuration for one supervised rendering worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Executable that runs the conversion script (e.g. `phantomjs`)
    #[serde(default = "default_exec")]
    pub exec: PathBuf,

    /// Conversion script; falls back to the bundled script under `temp_dir`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,

    /// Host the worker listens on
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the worker listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bound on establishing the connection to the worker
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Bound on receiving the response once connected
    #[serde(with = "humantime_serde", default = "default_read_timeout")]
    pub read_timeout: Duration,

    /// Absolute budget for one job, enforced by the watchdog
    #[serde(with = "humantime_serde", default = "default_max_timeout")]
    pub max_timeout: Duration,

    /// Bound on the readiness handshake; unbounded when absent
    #[serde(
        with = "humantime_serde",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub startup_timeout: Option<Duration>,

    /// Root of the scratch area holding the bundled script and job output
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            exec: default_exec(),
            script: None,
            host: default_host(),
            port: default_port(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            max_timeout: default_max_timeout(),
            startup_timeout: None,
            temp_dir: default_temp_dir(),
        }
    }
}

impl WorkerConfig {
    /// Directory the bundled conversion script is unpacked into
    pub fn phantomjs_dir(&self) -> PathBuf {
        self.temp_dir.join("phantomjs")
    }

    /// Directory the worker writes rendered files to
    pub fn output_dir(&self) -> PathBuf {
        self.temp_dir.join("output")
    }

    /// Script passed to the executable, resolving the bundled default
    pub fn script_path(&self) -> PathBuf {
        match &self.script {
            Some(script) if !script.as_os_str().is_empty() => script.clone(),
            _ => self.phantomjs_dir().join(BUNDLED_SCRIPT_NAME),
        }
    }

    /// URL jobs are posted to
    pub fn endpoint_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

impl Validatable for WorkerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.exec.to_string_lossy(), "exec", self.domain_name())?;
        validate_required_string(&self.host, "host", self.domain_name())?;
        validate_port_range(self.port, "port", self.domain_name())?;

        validate_duration(self.connect_timeout, "connect_timeout", self.domain_name())?;
        validate_duration(self.read_timeout, "read_timeout", self.domain_name())?;
        validate_duration(self.max_timeout, "max_timeout", self.domain_name())?;

        if let Some(startup) = self.startup_timeout {
            validate_duration(startup, "startup_timeout", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "worker"
    }
}

// Default value functions
fn default_exec() -> PathBuf {
    PathBuf::from("phantomjs")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7777
}

fn default_connect_timeout() -> Duration {
    Duration::from_millis(500)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(6)
}

fn default_max_timeout() -> Duration {
    Duration::from_millis(6500)
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("export-server")
}
