//! Pattern Identification Codes and grid similarity
//!
//! A price window of N closes is drawn onto an M x N grid: each column gets the
//! row its normalised price falls in, highest price on row 0. The resulting row
//! sequence is the PIC; its one-hot matrix is the weight matrix.

use crate::{Error, Result};

/// Weight matrix, row-major
pub type Weights = Vec<Vec<f64>>;

/// Map a window onto a `(rows, cols)` grid.
///
/// The window must hold exactly `cols` prices. A flat window maps every column
/// to the middle row.
pub fn prices_to_pic(window: &[f64], grid_size: (usize, usize)) -> Result<Vec<usize>> {
    let (rows, cols) = grid_size;
    if window.len() != cols {
        return Err(Error::DimensionMismatch {
            expected: cols,
            got: window.len(),
        });
    }
    if rows == 0 {
        return Err(Error::InvalidValue("grid must have at least one row"));
    }

    let (min, max) = window
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    if max == min {
        return Ok(vec![rows / 2; cols]);
    }

    let range = max - min;
    let top = (rows - 1) as f64;
    Ok(window
        .iter()
        .map(|&p| {
            let normalized = (p - min) / range;
            ((1.0 - normalized) * top).round().clamp(0.0, top) as usize
        })
        .collect())
}

/// One-hot matrix of `(max(pic) + 1) x len(pic)`
pub fn weights_from_pic(pic: &[usize]) -> Weights {
    let Some(&max_row) = pic.iter().max() else {
        return Vec::new();
    };
    let mut weights = vec![vec![0.0; pic.len()]; max_row + 1];
    for (col, &row) in pic.iter().enumerate() {
        weights[row][col] = 1.0;
    }
    weights
}

/// Cosine similarity of two weight matrices as a percentage in [0, 100].
///
/// Matrices of different shapes are compared as if the smaller one were
/// padded with zeros.
pub fn weight_similarity(a: &Weights, b: &Weights) -> f64 {
    let sum = |w: &Weights| w.iter().flatten().sum::<f64>();
    let norm = |w: &Weights| w.iter().flatten().map(|v| v * v).sum::<f64>().sqrt();

    let (na, nb) = (norm(a), norm(b));
    if sum(a) == 0.0 || sum(b) == 0.0 || na == 0.0 || nb == 0.0 {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b)
        .flat_map(|(ra, rb)| ra.iter().zip(rb).map(|(x, y)| x * y))
        .sum();
    (dot / (na * nb) * 100.0).clamp(0.0, 100.0)
}

/// Similarity of a stored pattern (PIC plus weights) to a freshly computed PIC.
///
/// PICs of different length never match.
pub fn similarity(pattern_pic: &[usize], pattern_weights: &Weights, current_pic: &[usize]) -> f64 {
    if pattern_pic.len() != current_pic.len() {
        return 0.0;
    }
    weight_similarity(pattern_weights, &weights_from_pic(current_pic))
}

/// Symmetric similarity between two PICs
pub fn pic_similarity(a: &[usize], b: &[usize]) -> f64 {
    similarity(a, &weights_from_pic(a), b)
}
