use opencv::{core as cvcore, prelude::*, imgproc};
use crate::{geometry::ScaledGeometry, utils::*};

/// Template matcher over a downscaled grayscale copy of the frame.
#[derive(Debug)]
pub struct TemplateMatcher {
    /// template to match to, already scaled by `compare_ratio`
    template: Mat,
    /// Size of the template before the compare downscale, i.e. its size in frame pixels.
    template_size: cvcore::Size,
    /// Frame size the matcher was built for.
    frame_size: Size,
    /// Ratio frames get resized by before comparison (per axis, <= 1.0)
    compare_ratio: Size,
    /// Match template threshold
    threshold: f64,
}

impl TemplateMatcher {
    /// - `template_gray`: grayscale template, already scaled to the frame's resolution
    /// - `frame_size`: size of the frames that will be passed in
    /// - `match_size`: working resolution for the comparison (typically 1280x720), clamped to `frame_size`
    pub fn new(template_gray: &Mat, frame_size: Size, match_size: Size, threshold: f64) -> opencv::Result<Self> {
        let compare_size = match_size.min(frame_size);
        let compare_ratio = Size::new(
            compare_size.width() / frame_size.width(),
            compare_size.height() / frame_size.height(),
        );
        let template_size = template_gray.size()?;
        let scaled_size = cvcore::Size::new(
            ((template_size.width as f64 * compare_ratio.width()).round() as i32).max(1),
            ((template_size.height as f64 * compare_ratio.height()).round() as i32).max(1),
        );
        let template = if scaled_size == template_size {
            template_gray.try_clone()?
        } else {
            resize_to(template_gray, scaled_size)?
        };
        Ok(Self {
            template,
            template_size,
            frame_size,
            compare_ratio,
            threshold,
        })
    }

    /// Loads a 1080p template asset and scales it to `geometry`'s frame size.
    pub fn from_asset(path: &std::path::Path, geometry: &ScaledGeometry, match_size: Size, threshold: f64) -> anyhow::Result<Self> {
        let asset = imread_gray(path)?;
        let scaled = resize_to(&asset, geometry.scale_size(asset.size()?))?;
        Ok(Self::new(&scaled, geometry.frame_size(), match_size, threshold)?)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Finds the template in a full RGB frame.
    ///
    /// Returns the template's rectangle in frame pixels if the best correlation reaches the threshold.
    pub fn locate(&self, frame: &Mat) -> opencv::Result<Option<cvcore::Rect>> {
        let Some((max_val, max_loc)) = self.best_match(frame)? else {
            return Ok(None);
        };
        tracing::trace!("template best match {max_val:.3} at {max_loc:?}");
        if max_val < self.threshold {
            return Ok(None);
        }
        let x = (max_loc.x as f64 / self.compare_ratio.width()).round() as i32;
        let y = (max_loc.y as f64 / self.compare_ratio.height()).round() as i32;
        Ok(Some(cvcore::Rect::new(x, y, self.template_size.width, self.template_size.height)))
    }

    /// Best correlation anywhere in `frame`, or `None` if the frame is smaller than the template.
    pub fn best_score(&self, frame: &Mat) -> opencv::Result<Option<f64>> {
        Ok(self.best_match(frame)?.map(|(v, _)| v))
    }

    /// Checks if the template appears anywhere in `frame` per the threshold.
    pub fn present(&self, frame: &Mat) -> opencv::Result<bool> {
        Ok(self.best_score(frame)?.is_some_and(|v| v >= self.threshold))
    }

    fn best_match(&self, frame: &Mat) -> opencv::Result<Option<(f64, cvcore::Point)>> {
        let result = self.match_template_raw(frame)?;
        if result.empty() {
            return Ok(None);
        }
        let mut max_val = 0_f64;
        let mut max_loc = cvcore::Point::new(-1, -1);
        cvcore::min_max_loc(&result, None, Some(&mut max_val), None, Some(&mut max_loc), &Mat::default())?;
        Ok(Some((max_val, max_loc)))
    }

    /// Raw runs [`imgproc::match_template`] with the template.
    /// - frame: Mat of a color (RGB) frame or a crop of one
    ///
    /// Returns an empty mat if the downscaled frame is smaller than the template.
    pub fn match_template_raw(&self, frame: &Mat) -> opencv::Result<Mat> {
        let frame_gray = cvt_color(frame, imgproc::COLOR_RGB2GRAY)?;
        let frame_resize = resize(&frame_gray, self.compare_ratio.width(), self.compare_ratio.height())?;

        let mut result = Mat::default();
        if frame_resize.cols() < self.template.cols() || frame_resize.rows() < self.template.rows() {
            return Ok(result);
        }
        imgproc::match_template_def(&frame_resize, &self.template, &mut result, imgproc::TM_CCOEFF_NORMED)?;
        Ok(result)
    }

    pub fn frame_size(&self) -> Size {
        self.frame_size
    }
}

/// Looks for the endgame cap sprites on either side of the timer.
///
/// The caps only show up once the driver-controlled period starts, so their presence separates teleop
/// from autonomous and the auto/teleop switchover. Scored caps are colored differently but still match.
#[derive(Debug)]
pub struct EndgameMarkerDetector {
    matcher: TemplateMatcher,
}

impl EndgameMarkerDetector {
    pub fn new(matcher: TemplateMatcher) -> Self {
        Self { matcher }
    }

    pub fn from_asset(path: &std::path::Path, geometry: &ScaledGeometry, match_size: Size, threshold: f64) -> anyhow::Result<Self> {
        Ok(Self::new(TemplateMatcher::from_asset(path, geometry, match_size, threshold)?))
    }

    /// Checks both cap windows of a match display crop.
    pub fn present(&self, display: &Mat, geometry: &ScaledGeometry) -> opencv::Result<bool> {
        for window in [geometry.cap_left, geometry.cap_right] {
            // the windows span the full display height, whatever height the crop ended up with
            let window = cvcore::Rect::new(window.x, 0, window.width, display.rows());
            let roi = crop(display, window)?;
            if roi.empty() {
                continue;
            }
            if self.matcher.present(&roi)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
