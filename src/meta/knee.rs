//! Kneedle knee detection for a convex, increasing curve.
//!
//! Input is a score sequence already sorted ascending; x is the rank.
//! The curve is normalised to the unit square, flipped so the knee becomes
//! a maximum of the difference curve `y_norm - x_norm`, and the first local
//! maximum followed by a drop below its threshold is reported.

use serde::{Deserialize, Serialize};

/// Knee detection tuning, the `[cutoff]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KneeConfig {
    /// Kneedle `S`: how many "flat" steps the detector waits for.
    pub sensitivity: f64,
    /// Keep scanning after the first knee and report the last one found.
    pub online: bool,
}

impl Default for KneeConfig {
    fn default() -> Self {
        Self { sensitivity: 1.0, online: true }
    }
}

/// Knee position in the input sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KneePoint {
    pub index: usize,
    pub y: f64,
}

/// Locate the knee of `sorted_y`. `None` when the curve has no knee: fewer
/// than three points, a flat curve, or a straight line.
pub fn find_knee(sorted_y: &[f64], config: &KneeConfig) -> Option<KneePoint> {
    let n = sorted_y.len();
    if n < 3 || sorted_y.iter().any(|y| !y.is_finite()) {
        return None;
    }
    let (y_min, y_max) = sorted_y.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &y| (lo.min(y), hi.max(y)));
    if y_max <= y_min {
        return None;
    }

    let last = (n - 1) as f64;
    let x_norm: Vec<f64> = (0..n).map(|i| i as f64 / last).collect();
    // Flipped complement of the normalised curve turns convex-increasing into concave.
    let y_flip: Vec<f64> = sorted_y.iter().rev()
        .map(|y| 1.0 - (y - y_min) / (y_max - y_min))
        .collect();
    let diff: Vec<f64> = y_flip.iter().zip(&x_norm).map(|(y, x)| y - x).collect();

    let maxima = extrema(&diff, |a, b| a >= b);
    let minima = extrema(&diff, |a, b| a <= b);
    let first_max = *maxima.first()?;

    // x_norm is evenly spaced, so the mean step is 1 / (n - 1).
    let step = config.sensitivity / last;

    let mut threshold = 0.0;
    let mut threshold_index = 0;
    let mut knee: Option<usize> = None;
    for i in first_max..n - 1 {
        if maxima.contains(&i) {
            threshold = diff[i] - step;
            threshold_index = i;
        }
        if minima.contains(&i) {
            threshold = 0.0;
        }
        if diff[i + 1] < threshold {
            // Undo the flip.
            knee = Some(n - 1 - threshold_index);
            if !config.online {
                break;
            }
        }
    }

    knee.map(|index| KneePoint { index, y: sorted_y[index] })
}

/// Indices where `cmp(v[i], neighbour)` holds for both neighbours. Edges
/// compare against themselves on the missing side.
fn extrema(values: &[f64], cmp: impl Fn(f64, f64) -> bool) -> Vec<usize> {
    let last = values.len() - 1;
    (0..values.len())
        .filter(|&i| {
            let prev = values[i.saturating_sub(1)];
            let next = values[(i + 1).min(last)];
            cmp(values[i], prev) && cmp(values[i], next)
        })
        .collect()
}
