//! Request monitor configuration

use crate::error::ConfigResult;
use crate::validation::{validate_duration, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Controls how often the request/error counters are reported
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Whether counters are collected and reported at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Minimum time between two periodic reports
    #[serde(with = "humantime_serde", default = "default_report_interval")]
    pub report_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            report_interval: default_report_interval(),
        }
    }
}

impl Validatable for MonitorConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_duration(self.report_interval, "report_interval", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "monitor"
    }
}

fn default_enabled() -> bool {
    true
}

fn default_report_interval() -> Duration {
    Duration::from_secs(60)
}
