//! Structural similarity over a sliding window.
//!
//! Follows the common Wang et al. formulation used by scikit-image: a 7x7
//! uniform window, K1 = 0.01, K2 = 0.03, an 8-bit data range, unbiased
//! (sample) variances and mirror padding at the borders. The global score is
//! the mean of the map with a half-window border cropped away, so results
//! stay comparable with reports produced by that tooling.

use image::{GrayImage, ImageBuffer, Luma};

use crate::error::CompareError;

/// Side length of the square averaging window.
pub const WINDOW: u32 = 7;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Per-pixel similarity, same geometry as the compared images.
pub type SimilarityMap = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(Debug, Clone)]
pub struct Similarity {
    /// Mean similarity, nominally in [-1, 1]; 1.0 for identical inputs.
    pub score: f64,
    pub map: SimilarityMap,
}

impl Similarity {
    /// Score as a percentage, the unit reports use.
    pub fn percent(&self) -> f64 {
        self.score * 100.0
    }
}

pub fn structural_similarity(
    reference: &GrayImage,
    built: &GrayImage,
) -> Result<Similarity, CompareError> {
    if reference.dimensions() != built.dimensions() {
        return Err(CompareError::DimensionMismatch {
            reference: reference.dimensions(),
            built: built.dimensions(),
        });
    }

    let (width, height) = reference.dimensions();
    if width < WINDOW || height < WINDOW {
        return Err(CompareError::TooSmall {
            width,
            height,
            window: WINDOW,
        });
    }

    let (w, h) = (width as usize, height as usize);

    let x: Vec<f64> = reference.as_raw().iter().map(|&v| v as f64).collect();
    let y: Vec<f64> = built.as_raw().iter().map(|&v| v as f64).collect();
    let xx: Vec<f64> = x.iter().map(|v| v * v).collect();
    let yy: Vec<f64> = y.iter().map(|v| v * v).collect();
    let xy: Vec<f64> = x.iter().zip(&y).map(|(a, b)| a * b).collect();

    let ux = box_mean(&x, w, h);
    let uy = box_mean(&y, w, h);
    let uxx = box_mean(&xx, w, h);
    let uyy = box_mean(&yy, w, h);
    let uxy = box_mean(&xy, w, h);

    let np = (WINDOW * WINDOW) as f64;
    let cov_norm = np / (np - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let values: Vec<f64> = (0..w * h)
        .map(|i| {
            let vx = cov_norm * (uxx[i] - ux[i] * ux[i]);
            let vy = cov_norm * (uyy[i] - uy[i] * uy[i]);
            let vxy = cov_norm * (uxy[i] - ux[i] * uy[i]);

            let a1 = 2.0 * ux[i] * uy[i] + c1;
            let a2 = 2.0 * vxy + c2;
            let b1 = ux[i] * ux[i] + uy[i] * uy[i] + c1;
            let b2 = vx + vy + c2;
            (a1 * a2) / (b1 * b2)
        })
        .collect();

    // Border pixels see mirrored data; leave them out of the mean.
    let pad = (WINDOW / 2) as usize;
    let mut sum = 0.0;
    let mut count = 0usize;
    for row in pad..h - pad {
        for col in pad..w - pad {
            sum += values[row * w + col];
            count += 1;
        }
    }
    let score = sum / count as f64;

    let map = SimilarityMap::from_fn(width, height, |col, row| {
        Luma([values[row as usize * w + col as usize] as f32])
    });

    tracing::debug!("ssim {width}x{height}: mean={score:.6}");

    Ok(Similarity { score, map })
}

/// Separable WINDOW x WINDOW mean with half-sample mirror padding
/// (`d c b a | a b c d`).
fn box_mean(src: &[f64], width: usize, height: usize) -> Vec<f64> {
    let radius = (WINDOW / 2) as isize;
    let norm = WINDOW as f64;

    let mut rows = vec![0.0; src.len()];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let acc: f64 = (-radius..=radius)
                .map(|k| row[mirror(x as isize + k, width)])
                .sum();
            rows[y * width + x] = acc / norm;
        }
    }

    let mut out = vec![0.0; src.len()];
    for y in 0..height {
        for x in 0..width {
            let acc: f64 = (-radius..=radius)
                .map(|k| rows[mirror(y as isize + k, height) * width + x])
                .sum();
            out[y * width + x] = acc / norm;
        }
    }
    out
}

fn mirror(index: isize, len: usize) -> usize {
    let len = len as isize;
    let mut i = index;
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= len {
            i = 2 * len - i - 1;
        } else {
            return i as usize;
        }
    }
}
