//! Tunables for the whole pipeline.
//!
//! Everything that used to be a magic number lives here and is handed to the detector, scanner and
//! grouper explicitly. Any subset can be overridden from a JSON file; missing keys keep their defaults.
use std::path::Path;

use anyhow::Context as _;
use scoreclip_detect::DetectConfig;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub detect: DetectConfig,
    pub scan: ScanConfig,
    pub group: GroupConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Loads `path` if given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}

/// Pass 1 settings.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Seconds of video between sampled frames.
    pub poll_seconds: f64,
    /// How long to wait for a recording that is still being written before reopening it.
    pub recovery_delay_secs: f64,
    /// Number of segments scanned in parallel. Defaults to the CPU count.
    pub threads: Option<usize>,
    /// Collect [`ScanDiagnostics`](crate::pass1::ScanDiagnostics).
    pub debug: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            poll_seconds: 1.0,
            recovery_delay_secs: 10.0,
            threads: None,
            debug: false,
        }
    }
}

impl ScanConfig {
    pub fn threads(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Sampling interval in frames for a video running at `fps`.
    pub fn poll_interval(&self, fps: f64) -> i64 {
        ((fps * self.poll_seconds).round() as i64).max(1)
    }
}

/// Pass 2 settings. All durations are in seconds.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Runs with fewer observations than this are treated as noise.
    pub min_group_count: usize,
    /// Padding added before the start of autonomous.
    pub pre_auto_margin: f64,
    /// Padding added after teleop ends.
    pub post_tele_margin: f64,
    pub auto_duration: u64,
    pub teleop_duration: u64,
    /// Time from the start of autonomous to the start of teleop.
    pub auto_tele_gap: f64,
    /// Time from the end of autonomous to the end of the match.
    pub full_match_remainder: f64,
    /// Autonomous timers at or below this are the auto/teleop switchover countdown, not autonomous.
    pub switchover_max: u64,
    /// Leave out runs with no usable timer reading instead of failing.
    pub skip_unbounded: bool,
    /// Collect [`GroupDiagnostics`](crate::pass2::GroupDiagnostics).
    pub debug: bool,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            min_group_count: 5,
            pre_auto_margin: 3.0,
            post_tele_margin: 5.0,
            auto_duration: 30,
            teleop_duration: 120,
            auto_tele_gap: 38.0,
            full_match_remainder: 128.0,
            switchover_max: 8,
            skip_unbounded: false,
            debug: false,
        }
    }
}
