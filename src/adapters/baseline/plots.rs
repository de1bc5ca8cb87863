//! PNG evaluation plots rendered from the diagnostics kept in an artifact.
//!
//! Only shapes are drawn (no text); the dashboard and CLI label the image.

use std::path::Path;

use image::{Rgb, RgbImage};

use crate::error::{PortError, PortResult};

const W: u32 = 640;
const H: u32 = 480;
const MARGIN: u32 = 40;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const GUIDE: Rgb<u8> = Rgb([200, 200, 200]);
const PRIMARY: Rgb<u8> = Rgb([31, 119, 180]);
const GOOD: Rgb<u8> = Rgb([44, 160, 44]);
const BAD: Rgb<u8> = Rgb([214, 39, 40]);

struct Canvas {
    img: RgbImage,
}

impl Canvas {
    fn new() -> Self {
        Self {
            img: RgbImage::from_pixel(W, H, BACKGROUND),
        }
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < W && (y as u32) < H {
            self.img.put_pixel(x as u32, y as u32, color);
        }
    }

    fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
        for y in y0.min(y1)..=y0.max(y1) {
            for x in x0.min(x1)..=x0.max(x1) {
                self.put(x, y, color);
            }
        }
    }

    fn line(&mut self, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
        // Bresenham.
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put(x, y, color);
            if (x, y) == to {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn dot(&mut self, (x, y): (i64, i64), color: Rgb<u8>) {
        self.fill_rect(x - 2, y - 2, x + 2, y + 2, color);
    }

    fn axes(&mut self) {
        let (l, b) = (MARGIN as i64, (H - MARGIN) as i64);
        self.line((l, b), ((W - MARGIN) as i64, b), AXIS);
        self.line((l, b), (l, MARGIN as i64), AXIS);
    }

    fn save(self, path: &Path) -> PortResult<()> {
        self.img
            .save(path)
            .map_err(|e| PortError::Evaluation(format!("writing {}: {e}", path.display())))
    }
}

/// Maps data coordinates into the plotting area.
struct Scale {
    min: (f64, f64),
    max: (f64, f64),
}

impl Scale {
    fn fit(points: impl Iterator<Item = (f64, f64)>) -> Self {
        let mut min = (f64::INFINITY, f64::INFINITY);
        let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in points {
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
        if !min.0.is_finite() {
            return Self { min: (0.0, 0.0), max: (1.0, 1.0) };
        }
        // Avoid a zero span on either axis.
        if max.0 - min.0 < f64::EPSILON {
            max.0 = min.0 + 1.0;
        }
        if max.1 - min.1 < f64::EPSILON {
            max.1 = min.1 + 1.0;
        }
        Self { min, max }
    }

    fn to_px(&self, (x, y): (f64, f64)) -> (i64, i64) {
        let w = (W - 2 * MARGIN) as f64;
        let h = (H - 2 * MARGIN) as f64;
        let px = MARGIN as f64 + (x - self.min.0) / (self.max.0 - self.min.0) * w;
        let py = (H - MARGIN) as f64 - (y - self.min.1) / (self.max.1 - self.min.1) * h;
        (px.round() as i64, py.round() as i64)
    }
}

fn require_data(has_data: bool, plot: &str) -> PortResult<()> {
    if has_data {
        Ok(())
    } else {
        Err(PortError::Evaluation(format!("no holdout data recorded for '{plot}'")))
    }
}

/// Heatmap with `matrix[actual][predicted]`.
pub fn confusion_matrix(matrix: &[Vec<usize>], path: &Path) -> PortResult<()> {
    require_data(!matrix.is_empty(), "confusion_matrix")?;
    let n = matrix.len() as i64;
    let max = matrix.iter().flatten().copied().max().unwrap_or(0).max(1) as f64;
    let cell_w = (W - 2 * MARGIN) as i64 / n;
    let cell_h = (H - 2 * MARGIN) as i64 / n;

    let mut canvas = Canvas::new();
    for (i, row) in matrix.iter().enumerate() {
        for (j, &count) in row.iter().enumerate() {
            let shade = 255 - (200.0 * count as f64 / max) as u8;
            let x0 = MARGIN as i64 + j as i64 * cell_w;
            let y0 = MARGIN as i64 + i as i64 * cell_h;
            canvas.fill_rect(x0, y0, x0 + cell_w - 2, y0 + cell_h - 2, Rgb([shade, shade, 255]));
        }
    }
    canvas.save(path)
}

/// Per actual class: correct (green) stacked under misclassified (red).
pub fn class_prediction_error(matrix: &[Vec<usize>], path: &Path) -> PortResult<()> {
    require_data(!matrix.is_empty(), "error")?;
    let totals: Vec<usize> = matrix.iter().map(|r| r.iter().sum()).collect();
    let max = totals.iter().copied().max().unwrap_or(0).max(1) as f64;
    let slot = (W - 2 * MARGIN) as i64 / matrix.len() as i64;
    let base = (H - MARGIN) as i64;
    let height = (H - 2 * MARGIN) as f64;

    let mut canvas = Canvas::new();
    canvas.axes();
    for (i, row) in matrix.iter().enumerate() {
        let correct = row.get(i).copied().unwrap_or(0) as f64;
        let wrong = totals[i] as f64 - correct;
        let x0 = MARGIN as i64 + i as i64 * slot + slot / 5;
        let x1 = x0 + slot * 3 / 5;
        let top_correct = base - (correct / max * height) as i64;
        let top_wrong = top_correct - (wrong / max * height) as i64;
        if correct > 0.0 {
            canvas.fill_rect(x0, top_correct, x1, base - 1, GOOD);
        }
        if wrong > 0.0 {
            canvas.fill_rect(x0, top_wrong, x1, top_correct, BAD);
        }
    }
    canvas.save(path)
}

/// Residual (actual - predicted) against predicted, with the zero line.
pub fn residuals(pairs: &[(f64, f64)], path: &Path) -> PortResult<()> {
    require_data(!pairs.is_empty(), "residuals")?;
    let points: Vec<(f64, f64)> = pairs.iter().map(|&(a, p)| (p, a - p)).collect();
    let scale = Scale::fit(points.iter().copied().chain([(points[0].0, 0.0)]));

    let mut canvas = Canvas::new();
    canvas.axes();
    let zero_l = scale.to_px((scale.min.0, 0.0));
    let zero_r = scale.to_px((scale.max.0, 0.0));
    canvas.line(zero_l, zero_r, GUIDE);
    for &p in &points {
        canvas.dot(scale.to_px(p), PRIMARY);
    }
    canvas.save(path)
}

/// Predicted against actual, with the identity line.
pub fn prediction_error(pairs: &[(f64, f64)], path: &Path) -> PortResult<()> {
    require_data(!pairs.is_empty(), "error")?;
    let lo = pairs.iter().flat_map(|&(a, p)| [a, p]).fold(f64::INFINITY, f64::min);
    let hi = pairs.iter().flat_map(|&(a, p)| [a, p]).fold(f64::NEG_INFINITY, f64::max);
    let scale = Scale::fit([(lo, lo), (hi, hi)].into_iter());

    let mut canvas = Canvas::new();
    canvas.axes();
    canvas.line(scale.to_px((lo, lo)), scale.to_px((hi, hi)), GUIDE);
    for &pair in pairs {
        canvas.dot(scale.to_px(pair), PRIMARY);
    }
    canvas.save(path)
}

/// Inertia per cluster count; the fitted count is highlighted.
pub fn elbow(curve: &[(usize, f64)], chosen: usize, path: &Path) -> PortResult<()> {
    require_data(!curve.is_empty(), "elbow")?;
    let points: Vec<(f64, f64)> = curve.iter().map(|&(k, i)| (k as f64, i)).collect();
    let scale = Scale::fit(points.iter().copied().chain([(points[0].0, 0.0)]));

    let mut canvas = Canvas::new();
    canvas.axes();
    for pair in points.windows(2) {
        canvas.line(scale.to_px(pair[0]), scale.to_px(pair[1]), PRIMARY);
    }
    for (&(k, _), &p) in curve.iter().zip(&points) {
        canvas.dot(scale.to_px(p), if k == chosen { BAD } else { PRIMARY });
    }
    canvas.save(path)
}

/// Bar per cluster, height = member count.
pub fn distribution(sizes: &[usize], path: &Path) -> PortResult<()> {
    require_data(!sizes.is_empty(), "distribution")?;
    let max = sizes.iter().copied().max().unwrap_or(0).max(1) as f64;
    let slot = (W - 2 * MARGIN) as i64 / sizes.len() as i64;
    let base = (H - MARGIN) as i64;
    let height = (H - 2 * MARGIN) as f64;

    let mut canvas = Canvas::new();
    canvas.axes();
    for (i, &n) in sizes.iter().enumerate() {
        let x0 = MARGIN as i64 + i as i64 * slot + slot / 5;
        let top = base - (n as f64 / max * height) as i64;
        canvas.fill_rect(x0, top, x0 + slot * 3 / 5, base - 1, PRIMARY);
    }
    canvas.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("tabflow-plots-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn renders_png_files() {
        let cm = out("cm.png");
        confusion_matrix(&[vec![3, 1], vec![0, 4]], &cm).unwrap();
        let img = image::open(&cm).unwrap();
        assert_eq!((img.width(), img.height()), (W, H));

        let res = out("res.png");
        residuals(&[(1.0, 1.5), (2.0, 1.8), (3.0, 3.0)], &res).unwrap();
        assert!(res.is_file());

        let el = out("elbow.png");
        elbow(&[(2, 10.0), (3, 4.0), (4, 3.5)], 3, &el).unwrap();
        assert!(el.is_file());
    }

    #[test]
    fn empty_diagnostics_are_evaluation_errors() {
        assert!(matches!(
            distribution(&[], &out("none.png")),
            Err(PortError::Evaluation(_))
        ));
    }
}
