//! Numeric helpers shared by the chart-pattern detectors and signal context

use crate::OHLCV;

// ============================================================
// EXTREMA
// ============================================================

/// Indices of strict local maxima and minima of `order`.
///
/// Index `i` is a maximum when `values[i]` is strictly greater than every
/// neighbour up to `order` positions away, with out-of-range neighbours
/// clipped to the nearest edge. An edge index is compared with itself and so
/// never qualifies.
pub fn local_extrema(values: &[f64], order: usize) -> (Vec<usize>, Vec<usize>) {
    let n = values.len();
    let mut maxima = Vec::new();
    let mut minima = Vec::new();
    if n == 0 || order == 0 {
        return (maxima, minima);
    }

    let last = n - 1;
    for (i, &v) in values.iter().enumerate() {
        let neighbours = (1..=order).flat_map(|j| [i.saturating_sub(j), (i + j).min(last)]);
        let (mut is_max, mut is_min) = (true, true);
        for k in neighbours {
            is_max &= v > values[k];
            is_min &= v < values[k];
            if !is_max && !is_min {
                break;
            }
        }
        if is_max {
            maxima.push(i);
        }
        if is_min {
            minima.push(i);
        }
    }
    (maxima, minima)
}

// ============================================================
// REGRESSION
// ============================================================

/// Least-squares line with Pearson correlation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Correlation coefficient; 0.0 when `y` has no variance
    pub r: f64,
}

/// Fit `y = slope * x + intercept`. `None` for fewer than two points or when
/// all `x` are equal.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = mean(x);
    let my = mean(y);

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&xi, &yi) in x.iter().zip(y) {
        let (dx, dy) = (xi - mx, yi - my);
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let r = if syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    };
    Some(LinearFit {
        slope,
        intercept: my - slope * mx,
        r,
    })
}

/// Fit against positions `0..values.len()`
pub fn linear_regression_indexed(values: &[f64]) -> Option<LinearFit> {
    let x: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    linear_regression(&x, values)
}

/// R-squared of a straight line through `values` against their index.
///
/// 0.0 for fewer than two values or a flat series.
pub fn trend_strength(values: &[f64]) -> f64 {
    linear_regression_indexed(values).map_or(0.0, |fit| fit.r * fit.r)
}

// ============================================================
// SCORING
// ============================================================

/// Confidence in `actual` given an `expected` value and relative `tolerance`.
///
/// Inside the tolerance band the score falls linearly from 100 to 0; outside
/// it the plain relative deviation is used.
pub fn calc_confidence(actual: f64, expected: f64, tolerance: f64) -> f64 {
    if expected == 0.0 {
        return 0.0;
    }
    let deviation = (actual - expected).abs() / expected.abs();
    if deviation <= tolerance {
        100.0 * (1.0 - deviation / tolerance)
    } else {
        (100.0 * (1.0 - deviation)).max(0.0)
    }
}

#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

// ============================================================
// SERIES EXTRACTION
// ============================================================

pub fn highs<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter().map(OHLCV::high).collect()
}

pub fn lows<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter().map(OHLCV::low).collect()
}

pub fn closes<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter().map(OHLCV::close).collect()
}

pub fn volumes<T: OHLCV>(bars: &[T]) -> Vec<f64> {
    bars.iter().map(OHLCV::volume).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extrema_skip_edges() {
        let v = [5.0, 1.0, 3.0, 1.0, 0.5, 2.0, 9.0];
        let (maxima, minima) = local_extrema(&v, 1);
        assert_eq!(maxima, vec![2]);
        assert_eq!(minima, vec![1, 4]);
    }

    #[test]
    fn test_extrema_plateau_is_not_extremum() {
        let v = [1.0, 2.0, 3.0, 3.0, 2.0, 1.0];
        let (maxima, _) = local_extrema(&v, 1);
        assert!(maxima.is_empty());
    }

    #[test]
    fn test_extrema_order_two_near_edge() {
        // index 1 compares with clipped index 0 and with 2, 3
        let v = [1.0, 4.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0];
        let (maxima, minima) = local_extrema(&v, 2);
        assert_eq!(maxima, vec![1, 5]);
        assert_eq!(minima, vec![3]);
    }

    #[test]
    fn test_regression_perfect_line() {
        let fit = linear_regression(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_regression_flat_y_has_zero_r() {
        let fit = linear_regression(&[0.0, 1.0, 2.0], &[4.0, 4.0, 4.0]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r, 0.0);
        assert!(linear_regression(&[1.0], &[1.0]).is_none());
    }

    #[test]
    fn test_trend_strength() {
        assert!((trend_strength(&[1.0, 2.0, 3.0, 4.0, 5.0]) - 1.0).abs() < 1e-12);
        assert_eq!(trend_strength(&[2.0, 2.0, 2.0]), 0.0);
        assert!(trend_strength(&[1.0, 3.0, 1.0, 3.0, 1.0]) < 0.1);
    }

    #[test]
    fn test_calc_confidence_curve() {
        assert_eq!(calc_confidence(1.0, 1.0, 0.05), 100.0);
        assert!((calc_confidence(0.99, 1.0, 0.02) - 50.0).abs() < 1e-9);
        assert!((calc_confidence(3.0, 2.0, 0.5) - 0.0).abs() < 1e-9);
        assert!((calc_confidence(1.5, 1.0, 0.2) - 50.0).abs() < 1e-9);
        assert_eq!(calc_confidence(5.0, 0.0, 0.1), 0.0);
    }
}
