use scoreclip_detect::{MatchDetection, MatchPhase};
use scoreclip_io::VideoInfo;

/// One sampled frame that showed a live match display.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawObservation {
    pub name: String,
    pub top: bool,
    pub frame_idx: i64,
    /// Video time of the frame, in seconds
    pub video_secs: f64,
    pub phase: MatchPhase,
    /// Displayed match timer, in seconds
    pub timer: u64,
    pub red_teams: Vec<String>,
    pub blue_teams: Vec<String>,
    /// Never filled in by the scanner; kept so downstream tooling can mark replays.
    pub is_replay: Option<bool>,
    pub colors_swapped: bool,
}

impl RawObservation {
    pub fn new(frame_idx: i64, video_secs: f64, detection: MatchDetection) -> Self {
        Self {
            name: detection.name,
            top: detection.top,
            frame_idx,
            video_secs,
            phase: detection.phase,
            timer: detection.time,
            red_teams: detection.red_teams,
            blue_teams: detection.blue_teams,
            is_replay: None,
            colors_swapped: detection.colors_swapped,
        }
    }

    pub fn is_teleop(&self) -> bool {
        self.phase == MatchPhase::Teleop
    }
}

/// Output of pass 1. Observations are in video order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EventScanResult {
    pub fps: f64,
    pub width: i32,
    pub height: i32,
    pub frame_count: i64,
    pub observations: Vec<RawObservation>,
}

impl EventScanResult {
    pub fn new(info: VideoInfo, observations: Vec<RawObservation>) -> Self {
        Self {
            fps: info.fps,
            width: info.width,
            height: info.height,
            frame_count: info.frame_count,
            observations,
        }
    }

    /// Length of the video in seconds, if the container reported a frame count.
    pub fn duration_secs(&self) -> Option<f64> {
        (self.fps > 0.0 && self.frame_count > 0).then(|| self.frame_count as f64 / self.fps)
    }
}

/// A timer value together with when it was seen.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimerReading {
    pub timer: u64,
    pub video_secs: f64,
}

impl From<&RawObservation> for TimerReading {
    fn from(obs: &RawObservation) -> Self {
        Self { timer: obs.timer, video_secs: obs.video_secs }
    }
}

/// Final time range of one match.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MatchSegment {
    pub name: String,
    /// Start, in seconds into the video
    pub start: f64,
    /// End, in seconds into the video
    pub end: f64,
    pub red_teams: Vec<String>,
    pub blue_teams: Vec<String>,
    pub is_replay: Option<bool>,
    pub top: bool,
    pub colors_swapped: bool,
}

impl MatchSegment {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

impl std::fmt::Display for MatchSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} - {} red {:?} blue {:?}",
            self.name,
            scoreclip_io::time::hms(self.start),
            scoreclip_io::time::hms(self.end),
            self.red_teams,
            self.blue_teams,
        )
    }
}
