//! Scoreboard geometry.
//!
//! All regions are authored in pixels against a reference frame size (1080p for the built-in layout)
//! and scaled per axis to the live video, so a capture with a different aspect ratio still lands on the
//! same parts of the overlay.
//!
//! Coordinate frames:
//! - `name` is relative to the top-left corner of the located overlay logo.
//! - `display` only contributes its height; the display crop is always full frame width.
//! - everything else is relative to the top-left corner of the display crop.
use opencv::core::Rect;

use crate::layout::RoiLayout;
use crate::utils::Size;

/// A region in reference-layout pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Region {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }
}

/// Named regions of the reference layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegionName {
    Name,
    Display,
    Timer,
    CapLeft,
    CapRight,
    AllianceLeft,
    AllianceRight,
    TotalScore,
}

impl RegionName {
    pub const ALL: [RegionName; 8] = [
        RegionName::Name,
        RegionName::Display,
        RegionName::Timer,
        RegionName::CapLeft,
        RegionName::CapRight,
        RegionName::AllianceLeft,
        RegionName::AllianceRight,
        RegionName::TotalScore,
    ];

    /// Name used in ROI layout files.
    pub const fn key(self) -> &'static str {
        match self {
            RegionName::Name => "name",
            RegionName::Display => "display",
            RegionName::Timer => "timer",
            RegionName::CapLeft => "cap_left",
            RegionName::CapRight => "cap_right",
            RegionName::AllianceLeft => "alliance_left",
            RegionName::AllianceRight => "alliance_right",
            RegionName::TotalScore => "total_score",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.key() == key)
    }
}

/// Region layout keyed to a reference frame size.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceLayout {
    pub width: i32,
    pub height: i32,
    pub name: Region,
    pub display: Region,
    pub timer: Region,
    pub cap_left: Region,
    pub cap_right: Region,
    pub alliance_left: Region,
    pub alliance_right: Region,
    pub total_score: Region,
    /// Set when the layout came from a calibration file.
    pub calibrated: bool,
}

// Display height, which most display-relative regions span fully.
const DISPLAY_HEIGHT: i32 = 180;

impl Default for ReferenceLayout {
    /// Built-in 1080p layout of the FIRST Energize scoreboard overlay.
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            // offset from the left side of the logo
            name: Region::new(340, 0, 460, 60),
            display: Region::new(0, 0, 1920, DISPLAY_HEIGHT),
            // y is the distance from the display's outer edge
            timer: Region::new(915, 6, 90, 44),
            cap_left: Region::new(960 - 470 - 100, 0, 100, DISPLAY_HEIGHT),
            cap_right: Region::new(960 + 470, 0, 100, DISPLAY_HEIGHT),
            // left/right rather than red/blue since the colors can be swapped
            alliance_left: Region::new(489, 0, 154, DISPLAY_HEIGHT),
            alliance_right: Region::new(1275, 0, 154, DISPLAY_HEIGHT),
            total_score: Region::new(647, 0, 212, 123),
            calibrated: false,
        }
    }
}

impl ReferenceLayout {
    pub fn region(&self, name: RegionName) -> Region {
        match name {
            RegionName::Name => self.name,
            RegionName::Display => self.display,
            RegionName::Timer => self.timer,
            RegionName::CapLeft => self.cap_left,
            RegionName::CapRight => self.cap_right,
            RegionName::AllianceLeft => self.alliance_left,
            RegionName::AllianceRight => self.alliance_right,
            RegionName::TotalScore => self.total_score,
        }
    }

    pub fn region_mut(&mut self, name: RegionName) -> &mut Region {
        match name {
            RegionName::Name => &mut self.name,
            RegionName::Display => &mut self.display,
            RegionName::Timer => &mut self.timer,
            RegionName::CapLeft => &mut self.cap_left,
            RegionName::CapRight => &mut self.cap_right,
            RegionName::AllianceLeft => &mut self.alliance_left,
            RegionName::AllianceRight => &mut self.alliance_right,
            RegionName::TotalScore => &mut self.total_score,
        }
    }

    /// Built-in layout with the regions of a calibration file applied on top.
    ///
    /// The file's image size becomes the reference size; built-in regions the file does not name are
    /// rescaled to it first.
    pub fn from_roi_layout(roi_layout: &RoiLayout) -> Self {
        let builtin = Self::default();
        let to_file = Scaler {
            width: roi_layout.img_w,
            height: roi_layout.img_h,
            ref_width: builtin.width,
            ref_height: builtin.height,
        };
        let mut layout = Self {
            width: roi_layout.img_w,
            height: roi_layout.img_h,
            calibrated: true,
            ..builtin.clone()
        };
        for name in RegionName::ALL {
            *layout.region_mut(name) = to_file.region(builtin.region(name));
        }
        for roi in &roi_layout.roi {
            match RegionName::from_key(&roi.name) {
                Some(name) => *layout.region_mut(name) = Region::new(roi.x, roi.y, roi.w, roi.h),
                None => tracing::warn!("Unknown region `{}` in ROI layout, ignoring", roi.name),
            }
        }
        layout
    }

    /// Scales the layout to a live frame size.
    pub fn scaled(&self, width: i32, height: i32) -> ScaledGeometry {
        if self.calibrated && (self.width, self.height) != (width, height) {
            tracing::warn!(
                "ROI layout was drawn at {}x{} but the video is {width}x{height}, regions will be rescaled",
                self.width, self.height
            );
        }
        let scaler = Scaler {
            width,
            height,
            ref_width: self.width,
            ref_height: self.height,
        };
        ScaledGeometry {
            width,
            height,
            name: scaler.rect(self.name),
            display_height: scaler.y(self.display.h),
            timer: scaler.rect(self.timer),
            cap_left: scaler.rect(self.cap_left),
            cap_right: scaler.rect(self.cap_right),
            alliance_left: scaler.rect(self.alliance_left),
            alliance_right: scaler.rect(self.alliance_right),
            total_score: scaler.rect(self.total_score),
            scaler,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Scaler {
    width: i32,
    height: i32,
    ref_width: i32,
    ref_height: i32,
}

impl Scaler {
    fn x(&self, v: i32) -> i32 {
        (v as f64 * self.width as f64 / self.ref_width as f64).round() as i32
    }

    fn y(&self, v: i32) -> i32 {
        (v as f64 * self.height as f64 / self.ref_height as f64).round() as i32
    }

    fn rect(&self, r: Region) -> Rect {
        Rect::new(self.x(r.x), self.y(r.y), self.x(r.w), self.y(r.h))
    }

    fn region(&self, r: Region) -> Region {
        Region::new(self.x(r.x), self.y(r.y), self.x(r.w), self.y(r.h))
    }
}

/// Overlay regions scaled to one video's resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledGeometry {
    pub width: i32,
    pub height: i32,
    /// Match name box, relative to the logo's top-left corner.
    pub name: Rect,
    /// Height of the scoring display band.
    pub display_height: i32,
    /// Timer box. `y` is the offset from the display's outer edge.
    pub timer: Rect,
    /// Endgame cap windows.
    pub cap_left: Rect,
    pub cap_right: Rect,
    /// Team roster columns.
    pub alliance_left: Rect,
    pub alliance_right: Rect,
    /// Left total-score area, used for color swap detection.
    pub total_score: Rect,
    scaler: Scaler,
}

impl ScaledGeometry {
    /// Geometry of the built-in layout at `width` x `height`.
    pub fn build(width: i32, height: i32) -> Self {
        ReferenceLayout::default().scaled(width, height)
    }

    pub fn scale_x(&self, v: i32) -> i32 {
        self.scaler.x(v)
    }

    pub fn scale_y(&self, v: i32) -> i32 {
        self.scaler.y(v)
    }

    /// Scales a 1080p asset (e.g. a template image) to this frame size.
    ///
    /// Template assets are always 1080p, independent of the layout's reference size.
    pub fn scale_size(&self, size: opencv::core::Size) -> opencv::core::Size {
        let assets = Scaler {
            width: self.width,
            height: self.height,
            ref_width: 1920,
            ref_height: 1080,
        };
        opencv::core::Size::new(assets.x(size.width).max(1), assets.y(size.height).max(1))
    }

    pub fn frame_size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    /// Every region with the name it is stored under.
    pub fn regions(&self) -> Vec<(RegionName, Rect)> {
        vec![
            (RegionName::Name, self.name),
            (RegionName::Display, Rect::new(0, 0, self.width, self.display_height)),
            (RegionName::Timer, self.timer),
            (RegionName::CapLeft, self.cap_left),
            (RegionName::CapRight, self.cap_right),
            (RegionName::AllianceLeft, self.alliance_left),
            (RegionName::AllianceRight, self.alliance_right),
            (RegionName::TotalScore, self.total_score),
        ]
    }
}
