//! Scheduler and exclusive-control configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::default_true;

/// Stream scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on simultaneously open AI windows.
    #[serde(default = "default_max_windows")]
    pub max_concurrent_windows: usize,

    /// Consecutive execution errors on one cell before it is abandoned.
    #[serde(default = "default_max_errors")]
    pub max_consecutive_errors: u32,

    /// Interval between content-script readiness checks.
    #[serde(default = "default_poll_interval")]
    pub ready_poll_interval_ms: u64,

    /// Readiness checks before the window is declared dead.
    #[serde(default = "default_poll_retries")]
    pub ready_poll_retries: u32,

    /// Write the failure text into abandoned answer cells.
    #[serde(default = "default_true")]
    pub write_failures: bool,

    #[serde(default = "default_failure_text")]
    pub failure_text: String,

    /// Claim log cells with an exclusive marker before a row starts.
    #[serde(default = "default_true")]
    pub exclusive_control: bool,

    /// Randomised per-task delay used in test mode.
    #[serde(default = "default_test_delay_min")]
    pub test_delay_min_ms: u64,

    #[serde(default = "default_test_delay_max")]
    pub test_delay_max_ms: u64,

    /// Screen size assumed when the window manager cannot report one.
    #[serde(default = "default_screen_width")]
    pub fallback_screen_width: u32,

    #[serde(default = "default_screen_height")]
    pub fallback_screen_height: u32,
}

fn default_max_windows() -> usize {
    4
}

fn default_max_errors() -> u32 {
    3
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_poll_retries() -> u32 {
    60
}

fn default_failure_text() -> String {
    "ERROR".to_string()
}

fn default_test_delay_min() -> u64 {
    500
}

fn default_test_delay_max() -> u64 {
    2000
}

fn default_screen_width() -> u32 {
    1920
}

fn default_screen_height() -> u32 {
    1080
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_windows: default_max_windows(),
            max_consecutive_errors: default_max_errors(),
            ready_poll_interval_ms: default_poll_interval(),
            ready_poll_retries: default_poll_retries(),
            write_failures: default_true(),
            failure_text: default_failure_text(),
            exclusive_control: default_true(),
            test_delay_min_ms: default_test_delay_min(),
            test_delay_max_ms: default_test_delay_max(),
            fallback_screen_width: default_screen_width(),
            fallback_screen_height: default_screen_height(),
        }
    }
}

/// Exclusive marker and timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusiveConfig {
    /// Leading token of every marker. Must not contain `_`.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Identity written into markers; generated per process when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,

    /// Offset applied to marker timestamps, independent of the host zone.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,

    /// Timeout for features missing from `timeouts`.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Timeout in seconds keyed by feature name.
    #[serde(default = "default_timeouts")]
    pub timeouts: HashMap<String, u64>,
}

fn default_prefix() -> String {
    "PROCESSING".to_string()
}

fn default_utc_offset() -> i32 {
    9
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_timeouts() -> HashMap<String, u64> {
    [
        ("web search", 480),
        ("canvas", 600),
        ("deep research", 2400),
        ("agent", 2400),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

impl Default for ExclusiveConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            worker_id: None,
            utc_offset_hours: default_utc_offset(),
            default_timeout_secs: default_timeout_secs(),
            timeouts: default_timeouts(),
        }
    }
}
