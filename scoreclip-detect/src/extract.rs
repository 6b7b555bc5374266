//! Field extractors.
//!
//! These take the overlay rectangle found by the logo matcher and pull the individual scoreboard fields
//! out of the frame. The scoring display is the band of the scoreboard that holds team numbers, scores
//! and the timer; it sits above the logo when the overlay is anchored to the top of the screen and below
//! it otherwise.
use opencv::{core::{Mat, Rect}, prelude::*};

use crate::{color::{self, HueColor}, geometry::ScaledGeometry, ocr::TextRecognizer, utils};

/// Crops the scoring display next to the overlay logo.
///
/// Returns the crop and whether the overlay is in the top half of the frame.
pub fn match_display(frame: &Mat, overlay: Rect, geometry: &ScaledGeometry) -> opencv::Result<(Mat, bool)> {
    let height = geometry.display_height;
    let top = overlay.y < frame.rows() / 2;
    let band = if top {
        let y = (overlay.y - height).max(0);
        Rect::new(0, y, frame.cols(), overlay.y - y)
    } else {
        Rect::new(0, overlay.y + overlay.height, frame.cols(), height)
    };
    Ok((utils::crop(frame, band)?, top))
}

/// Checks whether the display is mostly red and blue, which means we are looking at a match preview.
pub fn is_preview(display: &Mat, threshold: f64) -> opencv::Result<bool> {
    Ok(color::color_fraction(display, &[HueColor::Red, HueColor::Blue])? >= threshold)
}

/// Reads the match name box next to the logo.
pub fn extract_name(frame: &Mat, overlay: Rect, geometry: &ScaledGeometry, ocr: &dyn TextRecognizer) -> anyhow::Result<String> {
    let rect = Rect::new(
        overlay.x + geometry.name.x,
        overlay.y + geometry.name.y,
        geometry.name.width,
        geometry.name.height,
    );
    let roi = utils::crop(frame, rect)?;
    Ok(ocr.extract_text(&roi)?.trim().to_string())
}

/// Placeholder matches (the "Example" display shown between matches) are not real matches.
pub fn is_placeholder_name(name: &str, token: &str) -> bool {
    !token.is_empty() && name.contains(token)
}

/// Timer box within the display crop. It hugs the display's outer edge.
pub fn timer_rect(display: &Mat, top: bool, geometry: &ScaledGeometry) -> Rect {
    let timer = geometry.timer;
    let y = if top {
        timer.y
    } else {
        display.rows() - timer.y - timer.height
    };
    Rect::new(timer.x, y, timer.width, timer.height)
}

/// Reads the raw timer text. The recognizer should be restricted to digits.
pub fn extract_timer(display: &Mat, top: bool, geometry: &ScaledGeometry, ocr: &dyn TextRecognizer) -> anyhow::Result<String> {
    let roi = utils::crop(display, timer_rect(display, top, geometry))?;
    Ok(ocr.extract_text(&roi)?.trim().to_string())
}

/// Timers are always whole seconds; anything else is a misread.
pub fn parse_timer(text: &str) -> Option<u64> {
    text.trim().parse::<u64>().ok()
}

/// Reads the left and right team roster columns.
pub fn extract_teams(display: &Mat, geometry: &ScaledGeometry, ocr: &dyn TextRecognizer) -> anyhow::Result<(Vec<String>, Vec<String>)> {
    let read_column = |column: Rect| -> anyhow::Result<Vec<String>> {
        let roi = utils::crop(display, Rect::new(column.x, 0, column.width, display.rows()))?;
        Ok(ocr
            .extract_text(&roi)?
            .split_whitespace()
            .map(str::to_string)
            .collect())
    };
    let left = read_column(geometry.alliance_left)?;
    let right = read_column(geometry.alliance_right)?;
    Ok((left, right))
}

/// The left total score box is normally blue; if it isn't, the alliances are drawn swapped.
pub fn colors_swapped(display: &Mat, geometry: &ScaledGeometry, threshold: f64) -> opencv::Result<bool> {
    let roi = utils::crop(display, geometry.total_score)?;
    Ok(color::color_fraction(&roi, &[HueColor::Blue])? < threshold)
}

/// Maps the left/right roster columns to (red, blue).
pub fn assign_alliances(left: Vec<String>, right: Vec<String>, swapped: bool) -> (Vec<String>, Vec<String>) {
    if swapped {
        (left, right)
    } else {
        (right, left)
    }
}
