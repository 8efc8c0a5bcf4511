//! Image similarity functions over canonical images.
//!
//! Callers check shapes first; both functions assume `a` and `b` have the
//! same width and height.

use crate::pipeline::canonical::CanonicalImage;

/// Side of the square SSIM window.
const SSIM_WINDOW: usize = 7;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;

/// Mean structural similarity of `a` against `b`.
///
/// Uniform 7×7 window, sample covariance, averaged over every window that
/// lies fully inside the image. The dynamic range is taken from `b`'s
/// observed min/max; a flat `b` falls back to a range of `1.0`. Images
/// smaller than the window are compared as identical only when equal.
pub fn ssim(a: &CanonicalImage, b: &CanonicalImage) -> f64 {
    let (w, h) = (a.width() as usize, a.height() as usize);
    if w < SSIM_WINDOW || h < SSIM_WINDOW {
        return if a.pixels() == b.pixels() { 1.0 } else { 0.0 };
    }

    let (lo, hi) = b.min_max();
    let data_range = if hi - lo > 0.0 { hi - lo } else { 1.0 };
    let c1 = (SSIM_K1 * data_range).powi(2);
    let c2 = (SSIM_K2 * data_range).powi(2);

    let pa = a.pixels();
    let pb = b.pixels();
    let sum_a = SummedArea::new(w, h, |i| pa[i]);
    let sum_b = SummedArea::new(w, h, |i| pb[i]);
    let sum_aa = SummedArea::new(w, h, |i| pa[i] * pa[i]);
    let sum_bb = SummedArea::new(w, h, |i| pb[i] * pb[i]);
    let sum_ab = SummedArea::new(w, h, |i| pa[i] * pb[i]);

    let np = (SSIM_WINDOW * SSIM_WINDOW) as f64;
    let cov_norm = np / (np - 1.0);

    let mut total = 0.0;
    let mut windows = 0usize;
    for y in 0..=(h - SSIM_WINDOW) {
        for x in 0..=(w - SSIM_WINDOW) {
            let ux = sum_a.window(x, y, SSIM_WINDOW) / np;
            let uy = sum_b.window(x, y, SSIM_WINDOW) / np;
            let uxx = sum_aa.window(x, y, SSIM_WINDOW) / np;
            let uyy = sum_bb.window(x, y, SSIM_WINDOW) / np;
            let uxy = sum_ab.window(x, y, SSIM_WINDOW) / np;

            let vx = cov_norm * (uxx - ux * ux);
            let vy = cov_norm * (uyy - uy * uy);
            let vxy = cov_norm * (uxy - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            windows += 1;
        }
    }
    total / windows as f64
}

/// Negated mean squared error. Identical images give exactly `0.0`.
pub fn mse(a: &CanonicalImage, b: &CanonicalImage) -> f64 {
    let n = a.pixels().len();
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = a
        .pixels()
        .iter()
        .zip(b.pixels())
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    let mse = sum / n as f64;
    if mse == 0.0 {
        0.0
    } else {
        -mse
    }
}

/// Inclusive prefix sums with a zero border row and column.
struct SummedArea {
    stride: usize,
    table: Vec<f64>,
}

impl SummedArea {
    fn new(w: usize, h: usize, value: impl Fn(usize) -> f64) -> Self {
        let stride = w + 1;
        let mut table = vec![0.0; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0.0;
            for x in 0..w {
                row += value(y * w + x);
                table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row;
            }
        }
        Self { stride, table }
    }

    /// Sum over the `size`×`size` window with top-left corner `(x, y)`.
    fn window(&self, x: usize, y: usize, size: usize) -> f64 {
        let s = self.stride;
        let (x1, y1) = (x + size, y + size);
        self.table[y1 * s + x1] - self.table[y * s + x1] - self.table[y1 * s + x]
            + self.table[y * s + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(side: u32, f: impl Fn(u32, u32) -> f64) -> CanonicalImage {
        let mut px = Vec::with_capacity((side * side) as usize);
        for y in 0..side {
            for x in 0..side {
                px.push(f(x, y));
            }
        }
        CanonicalImage::from_raw(side, side, px)
    }

    fn checker(side: u32) -> CanonicalImage {
        pattern(side, |x, y| if (x / 5 + y / 5) % 2 == 0 { 1.0 } else { 0.0 })
    }

    #[test]
    fn identical_images_ssim_one_mse_zero() {
        let a = pattern(100, |x, y| ((x * 13 + y * 7) % 97) as f64 / 96.0);
        assert!((ssim(&a, &a) - 1.0).abs() < 1e-9);
        let m = mse(&a, &a);
        assert_eq!(m, 0.0);
        assert!(m.is_sign_positive());
    }

    #[test]
    fn flat_identical_images_use_unit_range() {
        let a = pattern(20, |_, _| 0.5);
        assert!((ssim(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inverted_image_scores_low() {
        let a = checker(40);
        let inv = pattern(40, |x, y| 1.0 - a.pixels()[(y * 40 + x) as usize]);
        assert!(ssim(&a, &inv) < 0.0);
        assert_eq!(mse(&a, &inv), -1.0);
    }

    #[test]
    fn mse_known_value() {
        let a = pattern(10, |_, _| 0.0);
        let b = pattern(10, |_, _| 0.5);
        assert!((mse(&a, &b) + 0.25).abs() < 1e-12);
    }

    #[test]
    fn ssim_matches_brute_force_window_means() {
        let a = pattern(12, |x, y| ((x * 3 + y * 5) % 11) as f64 / 10.0);
        let b = pattern(12, |x, y| ((x * 7 + y * 2) % 13) as f64 / 12.0);

        let (lo, hi) = b.min_max();
        let range = hi - lo;
        let (c1, c2) = ((0.01 * range).powi(2), (0.03 * range).powi(2));
        let mut total = 0.0;
        let mut count = 0.0;
        for y0 in 0..=5 {
            for x0 in 0..=5 {
                let mut xs = Vec::new();
                let mut ys = Vec::new();
                for y in y0..y0 + 7 {
                    for x in x0..x0 + 7 {
                        xs.push(a.pixels()[y * 12 + x]);
                        ys.push(b.pixels()[y * 12 + x]);
                    }
                }
                let mx = xs.iter().sum::<f64>() / 49.0;
                let my = ys.iter().sum::<f64>() / 49.0;
                let vx = xs.iter().map(|v| (v - mx).powi(2)).sum::<f64>() / 48.0;
                let vy = ys.iter().map(|v| (v - my).powi(2)).sum::<f64>() / 48.0;
                let cxy = xs
                    .iter()
                    .zip(&ys)
                    .map(|(p, q)| (p - mx) * (q - my))
                    .sum::<f64>()
                    / 48.0;
                total += (2.0 * mx * my + c1) * (2.0 * cxy + c2)
                    / ((mx * mx + my * my + c1) * (vx + vy + c2));
                count += 1.0;
            }
        }
        assert!((ssim(&a, &b) - total / count).abs() < 1e-9);
    }

    #[test]
    fn summed_area_window_sum() {
        let sat = SummedArea::new(3, 3, |i| i as f64);
        // full 3x3 = 0+1+...+8
        assert_eq!(sat.window(0, 0, 3), 36.0);
        // bottom-right 2x2 = 4+5+7+8
        assert_eq!(sat.window(1, 1, 2), 24.0);
    }
}
