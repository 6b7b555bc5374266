
use std::ops::Mul;

use opencv::{imgproc, core as cvcore, prelude::*};

#[derive(Debug, PartialEq, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Size {
    pub x: f64,
    pub y: f64
}

impl Size {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub const fn res_1080p() -> Self {
        Self::new(1920.0, 1080.0)
    }

    pub const fn res_720p() -> Self {
        Self::new(1280.0, 720.0)
    }

    pub const fn width(&self) -> f64 {
        self.x
    }

    pub const fn height(&self) -> f64 {
        self.y
    }

    /// Per-axis minimum of two sizes.
    pub fn min(self, other: Size) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }
}

impl From<Size> for cvcore::Size {
    fn from(value: Size) -> Self {
        cvcore::Size_ { width: value.width().round() as i32, height: value.height().round() as i32 }
    }
}

impl From<cvcore::Size> for Size {
    fn from(value: cvcore::Size) -> Self {
        Self::new(value.width as f64, value.height as f64)
    }
}

impl Mul<f64> for Size {
    type Output = Size;

    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}


pub fn cvt_color(src: &Mat, code: i32) -> opencv::Result<Mat> {
    let mut out = Mat::default();
    imgproc::cvt_color_def(src, &mut out, code)?;
    Ok(out)
}

pub fn resize(src: &Mat, fx: f64, fy: f64) -> opencv::Result<Mat> {
    let mut out = Mat::default();
    if fx == 1.0 && fy == 1.0 {
        src.copy_to(&mut out)?;
        return Ok(out);
    }
    imgproc::resize(src, &mut out, cvcore::Size { width: 0, height: 0 }, fx, fy, imgproc::INTER_AREA)?;
    Ok(out)
}

/// Resizes to an exact pixel size.
pub fn resize_to(src: &Mat, size: cvcore::Size) -> opencv::Result<Mat> {
    let mut out = Mat::default();
    imgproc::resize(src, &mut out, size, 0., 0., imgproc::INTER_AREA)?;
    Ok(out)
}

/// Copies `rect` out of `src`, clipped to the image bounds.
///
/// The result is always continuous (and may be empty if `rect` lies outside `src`),
/// which is what the OCR engine wants.
pub fn crop(src: &Mat, rect: cvcore::Rect) -> opencv::Result<Mat> {
    let Some(clipped) = clip_rect(rect, src.cols(), src.rows()) else {
        return Ok(Mat::default());
    };
    Mat::roi(src, clipped)?.try_clone()
}

/// Intersects `rect` with `[0, width) x [0, height)`.
pub fn clip_rect(rect: cvcore::Rect, width: i32, height: i32) -> Option<cvcore::Rect> {
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = (rect.x + rect.width).min(width);
    let y1 = (rect.y + rect.height).min(height);
    (x1 > x0 && y1 > y0).then(|| cvcore::Rect::new(x0, y0, x1 - x0, y1 - y0))
}

/// Fraction of non-zero pixels in a single channel mask. Empty masks count as 0.
pub fn mask_fraction(mask: &Mat) -> opencv::Result<f64> {
    let area = mask.rows() as f64 * mask.cols() as f64;
    if area == 0.0 {
        return Ok(0.0);
    }
    Ok(cvcore::count_non_zero(mask)? as f64 / area)
}

/// Loads a template asset as a grayscale mat.
pub fn imread_gray(path: &std::path::Path) -> anyhow::Result<Mat> {
    let mat = opencv::imgcodecs::imread(
        &path.to_string_lossy(),
        opencv::imgcodecs::IMREAD_GRAYSCALE
    )?;
    if mat.empty() {
        anyhow::bail!("could not read image {}", path.display());
    }
    Ok(mat)
}

/// Loads a still frame, RGB ordered like everything else in this crate.
pub fn imread_rgb(path: &std::path::Path) -> anyhow::Result<Mat> {
    let bgr = opencv::imgcodecs::imread(
        &path.to_string_lossy(),
        opencv::imgcodecs::IMREAD_COLOR
    )?;
    if bgr.empty() {
        anyhow::bail!("could not read image {}", path.display());
    }
    Ok(cvt_color(&bgr, imgproc::COLOR_BGR2RGB)?)
}

#[cfg(test)]
pub(crate) mod test_util {
    use opencv::{core as cvcore, prelude::*};

    /// Small deterministic LCG so synthetic images are reproducible.
    pub struct Lcg(pub u64);

    impl Lcg {
        pub fn next_u8(&mut self) -> u8 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 56) as u8
        }
    }

    pub fn blank_rgb(width: i32, height: i32) -> Mat {
        Mat::new_rows_cols_with_default(height, width, cvcore::CV_8UC3, cvcore::Scalar::all(0.)).unwrap()
    }

    /// Fills `rect` of an RGB mat with a single color.
    pub fn fill(mat: &mut Mat, rect: cvcore::Rect, rgb: [u8; 3]) {
        let cols = mat.cols();
        let data = mat.data_bytes_mut().unwrap();
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                let i = ((y * cols + x) * 3) as usize;
                data[i..i + 3].copy_from_slice(&rgb);
            }
        }
    }

    /// Grayscale blocky noise pattern, good for template matching.
    pub fn noise_gray(width: i32, height: i32, block: i32, seed: u64) -> Mat {
        let mut rng = Lcg(seed);
        let bw = (width + block - 1) / block;
        let bh = (height + block - 1) / block;
        let cells = (0..bw * bh).map(|_| rng.next_u8()).collect::<Vec<u8>>();
        let mut mat = Mat::new_rows_cols_with_default(height, width, cvcore::CV_8UC1, cvcore::Scalar::all(0.)).unwrap();
        let data = mat.data_bytes_mut().unwrap();
        for y in 0..height {
            for x in 0..width {
                data[(y * width + x) as usize] = cells[((y / block) * bw + x / block) as usize];
            }
        }
        mat
    }

    /// Pastes a grayscale patch into all three channels of an RGB frame.
    pub fn paste_gray(frame: &mut Mat, patch: &Mat, x: i32, y: i32) {
        let cols = frame.cols();
        let (pw, ph) = (patch.cols(), patch.rows());
        let src = patch.data_bytes().unwrap().to_vec();
        let data = frame.data_bytes_mut().unwrap();
        for py in 0..ph {
            for px in 0..pw {
                let v = src[(py * pw + px) as usize];
                let i = (((y + py) * cols + x + px) * 3) as usize;
                data[i..i + 3].copy_from_slice(&[v, v, v]);
            }
        }
    }
}
