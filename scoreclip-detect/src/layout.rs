//! ROI layout files.
//!
//! These are produced by the region-of-interest authoring tool and look like
//! `{"img_w": 1920, "img_h": 1080, "roi": [{"name": "timer", "x": 915, "y": 6, "w": 90, "h": 44, ...}]}`.
//! We only ever read them.
use std::path::Path;

use anyhow::Context;

fn default_rtype() -> String {
    "Number".to_string()
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoiEntry {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    /// Kind of value the region holds. Informational only.
    #[serde(default = "default_rtype")]
    pub rtype: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoiLayout {
    /// Width of the image the layout was drawn on.
    pub img_w: i32,
    /// Height of the image the layout was drawn on.
    pub img_h: i32,
    pub roi: Vec<RoiEntry>,
}

impl RoiLayout {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("could not read ROI layout {}", path.display()))?;
        let layout: Self = serde_json::from_str(&data)
            .with_context(|| format!("could not parse ROI layout {}", path.display()))?;
        if layout.img_w <= 0 || layout.img_h <= 0 {
            anyhow::bail!("ROI layout {} has a non-positive image size", path.display());
        }
        Ok(layout)
    }

    pub fn get(&self, name: &str) -> Option<&RoiEntry> {
        self.roi.iter().find(|r| r.name == name)
    }
}
