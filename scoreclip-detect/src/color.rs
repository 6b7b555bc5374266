//! Hue thresholding, for finding blobs of overlay colors like those retroreflective tape finders.
//!
//! Hues are on OpenCV's full-range wheel (`COLOR_RGB2HSV_FULL`): 0..=255, wrapping from 255 back to 0.
//! Near-gray pixels (low saturation or value) have no meaningful hue and never match; otherwise white
//! text and black backgrounds would read as hue 0, i.e. red.
use opencv::{core as cvcore, imgproc, prelude::*};

use crate::utils;

/// Tolerance used when none is given.
pub const DEFAULT_TOLERANCE: i32 = 5;

/// Minimum saturation and value for a pixel to have a hue at all.
pub const MIN_CHROMA: f64 = 50.0;

pub type Contours = cvcore::Vector<cvcore::Vector<cvcore::Point>>;

/// Colors that commonly show up in the match display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HueColor {
    Red,
    Blue,
    /// UI background
    Tan,
}

impl HueColor {
    pub const fn hue(self) -> i32 {
        match self {
            HueColor::Red => 255,
            HueColor::Blue => 146,
            HueColor::Tan => 30,
        }
    }
}

/// Inclusive hue ranges covered by `center` +- `tolerance`, split at the wrap point.
pub fn hue_ranges(center: i32, tolerance: i32) -> Vec<(i32, i32)> {
    let lo = center - tolerance;
    let hi = center + tolerance;
    let mut ranges = vec![(lo.max(0), hi.min(255))];
    if lo < 0 {
        ranges.push(((256 + lo).rem_euclid(256), 255));
    }
    if hi > 255 {
        ranges.push((0, hi % 256));
    }
    ranges
}

/// Thresholds an RGB image by hue plus-minus the tolerance. Returns a same-size single channel mask.
pub fn hue_mask(rgb: &Mat, center: i32, tolerance: i32) -> opencv::Result<Mat> {
    if rgb.empty() {
        return Ok(Mat::default());
    }
    let hsv = utils::cvt_color(rgb, imgproc::COLOR_RGB2HSV_FULL)?;
    hue_mask_hsv(&hsv, center, tolerance)
}

/// [`hue_mask`] on an image that is already full-range HSV.
pub fn hue_mask_hsv(hsv: &Mat, center: i32, tolerance: i32) -> opencv::Result<Mat> {
    let mut mask = Mat::default();
    for (i, (lo, hi)) in hue_ranges(center, tolerance).into_iter().enumerate() {
        let mut part = Mat::default();
        cvcore::in_range(
            hsv,
            &cvcore::Scalar::new(lo as f64, MIN_CHROMA, MIN_CHROMA, 0.),
            &cvcore::Scalar::new(hi as f64, 255., 255., 0.),
            &mut part,
        )?;
        if i == 0 {
            mask = part;
        } else {
            let mut merged = Mat::default();
            cvcore::bitwise_or_def(&mask, &part, &mut merged)?;
            mask = merged;
        }
    }
    Ok(mask)
}

/// Share of an RGB image's pixels within any of `colors`.
pub fn color_fraction(rgb: &Mat, colors: &[HueColor]) -> opencv::Result<f64> {
    if rgb.empty() {
        return Ok(0.0);
    }
    let hsv = utils::cvt_color(rgb, imgproc::COLOR_RGB2HSV_FULL)?;
    let mut total = 0_f64;
    for color in colors {
        let mask = hue_mask_hsv(&hsv, color.hue(), DEFAULT_TOLERANCE)?;
        total += utils::mask_fraction(&mask)?;
    }
    Ok(total)
}

/// Outlines of the blobs of one hue.
pub fn find_contours(rgb: &Mat, center: i32, tolerance: i32) -> opencv::Result<Contours> {
    let mask = hue_mask(rgb, center, tolerance)?;
    let mut contours = Contours::new();
    if mask.empty() {
        return Ok(contours);
    }
    imgproc::find_contours_def(&mask, &mut contours, imgproc::RETR_LIST, imgproc::CHAIN_APPROX_SIMPLE)?;
    Ok(contours)
}
