//! Detectors
//!
//! ## Some conventions
//! - Always load images as RGB 3-channel U8 Mats (yes, OpenCV typically does BGR, but we think that's lame and it makes OCR loads more annoying)
//! - Regions are authored in reference-layout pixels and scaled per axis, see [`geometry`].
//!

pub mod color;
pub mod config;
pub mod extract;
pub mod geometry;
pub mod layout;
pub mod matchers;
pub mod ocr;
pub mod seasons;
pub mod utils;

pub use config::DetectConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum MatchPhase {
    /// Autonomous period, including the auto/teleop switchover
    Autonomous,
    /// Teleoperated (driver-controlled) period
    Teleop,
}

/// Everything read off one frame showing a live match display
#[derive(Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub struct MatchDetection {
    /// match name, e.g. Qualification X of Y
    pub name: String,
    /// whether the overlay is anchored to the top half of the frame
    pub top: bool,
    /// match phase
    pub phase: MatchPhase,
    /// displayed match timer, in seconds
    pub time: u64,
    /// Red alliance teams
    pub red_teams: Vec<String>,
    /// Blue alliance teams
    pub blue_teams: Vec<String>,
    /// Whether the alliance colors are swapped left/right
    pub colors_swapped: bool,
}

/// Why a frame did not produce a detection. None of these are errors.
#[derive(Clone, PartialEq, Eq, Debug, Hash, serde::Serialize, serde::Deserialize)]
pub enum Rejection {
    /// No overlay logo in the frame.
    NoOverlay,
    /// The overlay is showing the pre-match preview.
    Preview,
    /// The overlay is showing the placeholder match.
    PlaceholderName(String),
    /// The timer did not read as a whole number.
    BadTimer(String),
}

impl Rejection {
    /// Short label, for diagnostics tallies.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::NoOverlay => "no_overlay",
            Rejection::Preview => "preview",
            Rejection::PlaceholderName(_) => "placeholder_name",
            Rejection::BadTimer(_) => "bad_timer",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub enum FrameVerdict {
    Detected(MatchDetection),
    Rejected(Rejection),
}

/// Something that can read a scoreboard off a frame.
pub trait FrameDetector {
    /// - frame: full RGB frame
    fn detect(&self, frame: &opencv::core::Mat) -> anyhow::Result<FrameVerdict>;
}
