//! Image normalization: decoded raster → fixed-size canonical matrix.
//!
//! Every extracted image goes through the same five steps so that two images
//! can be compared pixel-for-pixel regardless of their source resolution or
//! colour model:
//!
//! ```text
//! RGB(A) ──▶ gray ──▶ 5×5 gaussian ──▶ equalize ──▶ 100×100 ──▶ [0,1] f64
//! ```
//!
//! The resize uses the triangle (bilinear) filter and is never changed, so a
//! given input byte stream always yields the same matrix.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};

/// Width and height of every canonical image.
pub const CANONICAL_SIZE: u32 = 100;

/// Binomial approximation of a 5-tap gaussian with the default sigma.
const GAUSSIAN_5: [u32; 5] = [1, 4, 6, 4, 1];
const GAUSSIAN_5_SUM: u32 = 16;

/// A grayscale image in canonical form: row-major `f64` samples in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalImage {
    width: u32,
    height: u32,
    pixels: Vec<f64>,
}

impl CanonicalImage {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major samples.
    pub fn pixels(&self) -> &[f64] {
        &self.pixels
    }

    /// Smallest and largest sample.
    pub fn min_max(&self) -> (f64, f64) {
        self.pixels
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| {
                (lo.min(p), hi.max(p))
            })
    }

    #[cfg(test)]
    pub(crate) fn from_raw(width: u32, height: u32, pixels: Vec<f64>) -> Self {
        assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// Bring a decoded raster into canonical form.
///
/// A zero-sized raster yields an all-zero canonical image.
pub fn canonicalize(img: &DynamicImage) -> CanonicalImage {
    let side = CANONICAL_SIZE as usize;
    if img.width() == 0 || img.height() == 0 {
        return CanonicalImage {
            width: CANONICAL_SIZE,
            height: CANONICAL_SIZE,
            pixels: vec![0.0; side * side],
        };
    }

    let gray = to_gray(img);
    let blurred = gaussian_blur_5x5(&gray);
    let equalized = equalize_histogram(&blurred);
    let resized = imageops::resize(&equalized, CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Triangle);

    CanonicalImage {
        width: CANONICAL_SIZE,
        height: CANONICAL_SIZE,
        pixels: resized.pixels().map(|p| f64::from(p[0]) / 255.0).collect(),
    }
}

/// ITU-R 601 luma, alpha ignored.
fn to_gray(img: &DynamicImage) -> GrayImage {
    let rgb = img.to_rgb8();
    let mut out = GrayImage::new(rgb.width(), rgb.height());
    for (x, y, p) in rgb.enumerate_pixels() {
        let [r, g, b] = p.0;
        let y_val = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
        out.put_pixel(x, y, Luma([y_val.round().clamp(0.0, 255.0) as u8]));
    }
    out
}

/// Mirror an out-of-range index back into `0..len` without repeating the
/// edge sample (`dcb|abcd|cba`).
fn reflect_101(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as isize;
    let mut i = i;
    while i < 0 || i >= len {
        if i < 0 {
            i = -i;
        }
        if i >= len {
            i = 2 * (len - 1) - i;
        }
    }
    i as usize
}

/// Separable 5×5 gaussian with reflect-101 borders, rounded back to 8-bit.
fn gaussian_blur_5x5(src: &GrayImage) -> GrayImage {
    let (w, h) = (src.width() as usize, src.height() as usize);
    let raw = src.as_raw();

    let mut horizontal = vec![0u32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u32;
            for (t, weight) in GAUSSIAN_5.iter().enumerate() {
                let sx = reflect_101(x as isize + t as isize - 2, w);
                acc += weight * u32::from(raw[y * w + sx]);
            }
            horizontal[y * w + x] = acc;
        }
    }

    let denom = GAUSSIAN_5_SUM * GAUSSIAN_5_SUM;
    let mut out = GrayImage::new(w as u32, h as u32);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u32;
            for (t, weight) in GAUSSIAN_5.iter().enumerate() {
                let sy = reflect_101(y as isize + t as isize - 2, h);
                acc += weight * horizontal[sy * w + x];
            }
            // round half up
            let v = (acc + denom / 2) / denom;
            out.put_pixel(x as u32, y as u32, Luma([v.min(255) as u8]));
        }
    }
    out
}

/// Global histogram equalization.
///
/// The darkest occupied level maps to 0 and the cumulative distribution of
/// the remaining levels is stretched over `1..=255`. A flat image keeps its
/// single level.
fn equalize_histogram(src: &GrayImage) -> GrayImage {
    let mut hist = [0u64; 256];
    for p in src.pixels() {
        hist[p[0] as usize] += 1;
    }
    let total: u64 = hist.iter().sum();

    let first = hist.iter().position(|&c| c > 0).unwrap_or(0);
    if hist[first] == total {
        return src.clone();
    }

    let scale = 255.0 / (total - hist[first]) as f64;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u64;
    for level in (first + 1)..256 {
        cumulative += hist[level];
        lut[level] = (cumulative as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }

    let mut out = src.clone();
    for p in out.pixels_mut() {
        p[0] = lut[p[0] as usize];
    }
    out
}
