//! Detector configuration

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{ocr::OcrModels, utils::Size};

/// Assets and thresholds for reading the scoreboard overlay.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Overlay logo template, drawn at 1080p.
    pub logo_template: PathBuf,
    /// Endgame cap template, drawn at 1080p.
    pub endgame_template: PathBuf,
    pub ocr_models: OcrModels,
    /// Optional ROI layout file overriding the built-in regions.
    pub layout: Option<PathBuf>,
    /// Working resolution for template matching.
    pub match_size: Size,
    /// The logo gates all extraction, so this one is strict.
    pub overlay_threshold: f64,
    pub endgame_threshold: f64,
    /// Share of red + blue pixels at which the display counts as a match preview.
    pub preview_threshold: f64,
    /// Share of blue pixels in the left total score box below which colors count as swapped.
    pub score_color_threshold: f64,
    /// Match names containing this are the placeholder display.
    pub placeholder_token: String,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            logo_template: "templates/en.png".into(),
            endgame_template: "templates/cap_unscored.png".into(),
            ocr_models: OcrModels::default(),
            layout: None,
            match_size: Size::res_720p(),
            overlay_threshold: 0.8,
            endgame_threshold: 0.6,
            preview_threshold: 0.7,
            score_color_threshold: 0.7,
            placeholder_token: "Example".to_string(),
        }
    }
}

impl DetectConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detector config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse detector config {}", path.display()))
    }
}
