//! Chart-pattern detectors built on local extrema and line fits
//!
//! - **Head and Shoulders** (and its inverse): three pivots, middle one
//!   beyond both shoulders, neckline from the troughs between them
//! - **Double Top / Double Bottom**: two adjacent pivots at nearly the same level
//! - **Triangle**: trend lines through the most recent pivots
//! - **Flag**: a strong 5-bar pole followed by a short counter-trend drift

use std::collections::HashMap;

use super::helpers::{
    calc_confidence, closes, highs, linear_regression, linear_regression_indexed, local_extrema,
    lows, mean, trend_strength, volumes,
};
use crate::params::{get_factor, get_period, get_ratio, ParamMeta, ParameterizedDetector};
use crate::{
    DetectContext, DetectorCategory, Direction, Error, PatternDetector, PatternKind, PatternResult,
    Period, Ratio, Result, OHLCV,
};

use super::candlestick::DEFAULT_MIN_CONFIDENCE;

impl_with_defaults!(
    HeadAndShouldersDetector,
    DoubleTopDetector,
    DoubleBottomDetector,
    TriangleDetector,
    FlagDetector,
);

// ============================================================
// HEAD AND SHOULDERS
// ============================================================

/// Head and Shoulders (bearish) plus the inverse form (bullish)
#[derive(Debug, Clone, Copy)]
pub struct HeadAndShouldersDetector {
    pub order: Period,
    /// Minimum `1 - |left - right| / avg` between shoulders
    pub min_symmetry: Ratio,
    /// Head must extend this multiple of the shoulders beyond the neckline
    pub head_factor: f64,
    /// Also look for the inverted shape on lows
    pub detect_inverse: bool,
    pub min_confidence: f64,
}

impl Default for HeadAndShouldersDetector {
    fn default() -> Self {
        Self {
            order: Period::new_const(3),
            min_symmetry: Ratio::new_const(0.95),
            head_factor: 1.1,
            detect_inverse: true,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl HeadAndShouldersDetector {
    /// Pivots come from `pivot_src`, the neckline from `neck_src` sampled at
    /// the opposite extrema of `pivot_src`.
    fn scan(&self, pivot_src: &[f64], neck_src: &[f64], inverse: bool) -> Vec<PatternResult> {
        let (maxima, minima) = local_extrema(pivot_src, self.order.get());
        let (pivots, troughs) = if inverse { (minima, maxima) } else { (maxima, minima) };
        if pivots.len() < 3 || troughs.len() < 2 {
            return Vec::new();
        }

        let sign = if inverse { -1.0 } else { 1.0 };
        let (kind, direction) = if inverse {
            (PatternKind::InverseHeadAndShoulders, Direction::Bullish)
        } else {
            (PatternKind::HeadAndShoulders, Direction::Bearish)
        };

        let mut out = Vec::new();
        for w in pivots.windows(3) {
            let (li, hi, ri) = (w[0], w[1], w[2]);
            let (left, head, right) = (pivot_src[li], pivot_src[hi], pivot_src[ri]);

            if !(sign * (head - left) > 0.0 && sign * (head - right) > 0.0) {
                continue;
            }

            let avg_shoulder = (left + right) / 2.0;
            if avg_shoulder == 0.0 {
                continue;
            }
            let symmetry = 1.0 - (left - right).abs() / avg_shoulder;
            if symmetry <= self.min_symmetry.get() {
                continue;
            }

            let neck: Vec<f64> = troughs
                .iter()
                .filter(|&&j| li < j && j < ri)
                .map(|&j| neck_src[j])
                .collect();
            if neck.len() < 2 {
                continue;
            }
            let neckline = mean(&neck);

            let head_extent = sign * (head - neckline);
            let shoulder_extent = sign * (avg_shoulder - neckline);
            if head_extent <= shoulder_extent * self.head_factor {
                continue;
            }

            let confidence = calc_confidence(symmetry, 1.0, 0.05).min(95.0);
            out.push(
                PatternResult::new(kind, li, ri, confidence, direction)
                    .with_meta("neckline", neckline)
                    .with_meta("head_price", head)
                    .with_meta("left_shoulder", left)
                    .with_meta("right_shoulder", right)
                    .with_meta("target", neckline - sign * head_extent),
            );
        }
        out
    }
}

impl PatternDetector for HeadAndShouldersDetector {
    fn name(&self) -> &'static str {
        "HEAD_AND_SHOULDERS"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Chart
    }

    fn min_bars(&self) -> usize {
        10
    }

    fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    fn detect<T: OHLCV>(&self, bars: &[T], _ctx: &DetectContext<'_>) -> Result<Vec<PatternResult>> {
        if bars.len() < self.min_bars() {
            return Ok(Vec::new());
        }
        let (h, l) = (highs(bars), lows(bars));
        let mut out = self.scan(&h, &l, false);
        if self.detect_inverse {
            out.extend(self.scan(&l, &h, true));
        }
        Ok(out)
    }

    fn validate_config(&self) -> Result<()> {
        if !(self.head_factor >= 1.0) {
            return Err(Error::InvalidValue("head_factor must be >= 1"));
        }
        Ok(())
    }
}

// ============================================================
// DOUBLE TOP / DOUBLE BOTTOM
// ============================================================

#[derive(Debug, Clone, Copy)]
struct TwinPivots {
    order: Period,
    min_similarity: Ratio,
    min_height: Ratio,
}

impl TwinPivots {
    /// `top` pairs maxima of highs around a valley of lows; otherwise minima
    /// of lows around a peak of highs
    fn scan(&self, h: &[f64], l: &[f64], top: bool) -> Vec<PatternResult> {
        let src = if top { h } else { l };
        let (maxima, minima) = local_extrema(src, self.order.get());
        let (pivots, between) = if top { (maxima, minima) } else { (minima, maxima) };
        if pivots.len() < 2 {
            return Vec::new();
        }

        let mut out = Vec::new();
        for w in pivots.windows(2) {
            let (fi, si) = (w[0], w[1]);
            let (first, second) = (src[fi], src[si]);

            let avg = (first + second) / 2.0;
            if avg == 0.0 {
                continue;
            }
            let similarity = 1.0 - (first - second).abs() / avg;
            if similarity <= self.min_similarity.get() {
                continue;
            }

            let inner = between.iter().filter(|&&j| fi < j && j < si);
            let (extreme, height) = if top {
                let Some(valley) = inner.map(|&j| l[j]).reduce(f64::min) else {
                    continue;
                };
                (valley, avg - valley)
            } else {
                let Some(peak) = inner.map(|&j| h[j]).reduce(f64::max) else {
                    continue;
                };
                (peak, peak - avg)
            };

            if height / avg <= self.min_height.get() {
                continue;
            }

            let confidence = calc_confidence(similarity, 1.0, 0.02).min(95.0);
            let result = if top {
                PatternResult::new(PatternKind::DoubleTop, fi, si, confidence, Direction::Bearish)
                    .with_meta("first_peak", first)
                    .with_meta("second_peak", second)
                    .with_meta("valley", extreme)
                    .with_meta("target", extreme - height)
            } else {
                PatternResult::new(PatternKind::DoubleBottom, fi, si, confidence, Direction::Bullish)
                    .with_meta("first_bottom", first)
                    .with_meta("second_bottom", second)
                    .with_meta("peak", extreme)
                    .with_meta("target", extreme + height)
            };
            out.push(result);
        }
        out
    }
}

macro_rules! twin_detector {
    ($(#[$doc:meta])* $name:ident, $id:literal, $top:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name {
            pub order: Period,
            /// Minimum `1 - |first - second| / avg` between the pivots
            pub min_similarity: Ratio,
            /// Minimum pattern height relative to the pivot level
            pub min_height: Ratio,
            pub min_confidence: f64,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    order: Period::new_const(2),
                    min_similarity: Ratio::new_const(0.98),
                    min_height: Ratio::new_const(0.02),
                    min_confidence: DEFAULT_MIN_CONFIDENCE,
                }
            }
        }

        impl PatternDetector for $name {
            fn name(&self) -> &'static str {
                $id
            }

            fn category(&self) -> DetectorCategory {
                DetectorCategory::Chart
            }

            fn min_bars(&self) -> usize {
                5
            }

            fn min_confidence(&self) -> f64 {
                self.min_confidence
            }

            fn detect<T: OHLCV>(&self, bars: &[T], _ctx: &DetectContext<'_>) -> Result<Vec<PatternResult>> {
                if bars.len() < self.min_bars() {
                    return Ok(Vec::new());
                }
                let twins = TwinPivots {
                    order: self.order,
                    min_similarity: self.min_similarity,
                    min_height: self.min_height,
                };
                Ok(twins.scan(&highs(bars), &lows(bars), $top))
            }
        }

        impl ParameterizedDetector for $name {
            fn param_meta() -> &'static [ParamMeta] {
                TWIN_PARAMS
            }

            fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
                Ok(Self {
                    order: get_period(params, "order", 2)?,
                    min_similarity: get_ratio(params, "min_similarity", 0.98)?,
                    min_height: get_ratio(params, "min_height", 0.02)?,
                    min_confidence: DEFAULT_MIN_CONFIDENCE,
                })
            }

            fn pattern_id_str() -> &'static str {
                $id
            }
        }
    };
}

twin_detector!(
    /// Two peaks within 2% of each other over a valley (bearish)
    DoubleTopDetector, "DOUBLE_TOP", true
);

twin_detector!(
    /// Two troughs within 2% of each other under a peak (bullish)
    DoubleBottomDetector, "DOUBLE_BOTTOM", false
);

// ============================================================
// TRIANGLE
// ============================================================

/// Ascending, descending or symmetrical triangle from fitted trend lines
#[derive(Debug, Clone, Copy)]
pub struct TriangleDetector {
    pub order: Period,
    /// Most recent pivots used per trend line
    pub recent_pivots: Period,
    /// Minimum |r| of both trend lines
    pub min_fit: Ratio,
    /// Slopes below this magnitude count as flat
    pub flat_slope: f64,
    pub min_confidence: f64,
}

impl Default for TriangleDetector {
    fn default() -> Self {
        Self {
            order: Period::new_const(2),
            recent_pivots: Period::new_const(5),
            min_fit: Ratio::new_const(0.7),
            flat_slope: 0.0001,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl PatternDetector for TriangleDetector {
    fn name(&self) -> &'static str {
        "TRIANGLE"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Chart
    }

    fn min_bars(&self) -> usize {
        10
    }

    fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    fn detect<T: OHLCV>(&self, bars: &[T], _ctx: &DetectContext<'_>) -> Result<Vec<PatternResult>> {
        if bars.len() < self.min_bars() {
            return Ok(Vec::new());
        }
        let (h, l) = (highs(bars), lows(bars));
        let (maxima, minima) = local_extrema(&h, self.order.get());

        let keep = self.recent_pivots.get();
        let upper_idx = &maxima[maxima.len().saturating_sub(keep)..];
        let lower_idx = &minima[minima.len().saturating_sub(keep)..];
        if upper_idx.len() < 3 || lower_idx.len() < 3 {
            return Ok(Vec::new());
        }

        let fit = |idx: &[usize], src: &[f64]| {
            let x: Vec<f64> = idx.iter().map(|&i| i as f64).collect();
            let y: Vec<f64> = idx.iter().map(|&i| src[i]).collect();
            linear_regression(&x, &y)
        };
        let (Some(upper), Some(lower)) = (fit(upper_idx, &h), fit(lower_idx, &l)) else {
            return Ok(Vec::new());
        };

        let min_fit = self.min_fit.get();
        if upper.r.abs() < min_fit || lower.r.abs() < min_fit {
            return Ok(Vec::new());
        }

        let flat = |slope: f64| slope.abs() < self.flat_slope;
        let (kind, direction) = if flat(upper.slope) && lower.slope > 0.0 {
            (PatternKind::AscendingTriangle, Direction::Bullish)
        } else if flat(lower.slope) && upper.slope < 0.0 {
            (PatternKind::DescendingTriangle, Direction::Bearish)
        } else if upper.slope < 0.0 && lower.slope > 0.0 {
            (PatternKind::SymmetricalTriangle, Direction::Neutral)
        } else {
            return Ok(Vec::new());
        };

        let start = upper_idx[0].min(lower_idx[0]);
        let end = upper_idx[upper_idx.len() - 1].max(lower_idx[lower_idx.len() - 1]);
        let confidence = ((upper.r.abs() + lower.r.abs()) * 50.0).min(100.0);

        Ok(vec![PatternResult::new(kind, start, end, confidence, direction)
            .with_meta("upper_slope", upper.slope)
            .with_meta("lower_slope", lower.slope)
            .with_meta("upper_r_squared", upper.r * upper.r)
            .with_meta("lower_r_squared", lower.r * lower.r)])
    }

    fn validate_config(&self) -> Result<()> {
        if self.recent_pivots.get() < 3 {
            return Err(Error::InvalidValue("recent_pivots must be >= 3"));
        }
        if !(self.flat_slope >= 0.0) {
            return Err(Error::InvalidValue("flat_slope must be >= 0"));
        }
        Ok(())
    }
}

// ============================================================
// FLAG
// ============================================================

/// Bars a flag needs after the pole
const MIN_FLAG_BARS: usize = 3;

/// Bull and bear flags (continuation)
#[derive(Debug, Clone, Copy)]
pub struct FlagDetector {
    pub pole_bars: Period,
    /// Upper bound on flag length
    pub flag_bars: Period,
    /// Minimum R-squared of the pole closes
    pub min_pole_strength: Ratio,
    /// Flag move must stay within this fraction of the pole move
    pub max_flag_ratio: Ratio,
    /// Minimum |r| of the flag closes
    pub min_flag_fit: Ratio,
    pub min_confidence: f64,
}

impl Default for FlagDetector {
    fn default() -> Self {
        Self {
            pole_bars: Period::new_const(5),
            flag_bars: Period::new_const(5),
            min_pole_strength: Ratio::new_const(0.8),
            max_flag_ratio: Ratio::new_const(0.5),
            min_flag_fit: Ratio::new_const(0.6),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl PatternDetector for FlagDetector {
    fn name(&self) -> &'static str {
        "FLAG"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Chart
    }

    fn min_bars(&self) -> usize {
        8
    }

    fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    fn detect<T: OHLCV>(&self, bars: &[T], _ctx: &DetectContext<'_>) -> Result<Vec<PatternResult>> {
        let n = bars.len();
        if n < self.min_bars() {
            return Ok(Vec::new());
        }
        let (c, v) = (closes(bars), volumes(bars));
        let last_close = c[n - 1];
        let pole_len = self.pole_bars.get();
        let mut out = Vec::new();

        for i in pole_len..n.saturating_sub(MIN_FLAG_BARS) {
            let pole = &c[i - pole_len..i];
            let strength = trend_strength(pole);
            if strength < self.min_pole_strength.get() {
                continue;
            }

            let rising = pole[pole_len - 1] > pole[0];
            let pole_size = (pole[pole_len - 1] - pole[0]).abs();

            let flag_end = (i + self.flag_bars.get()).min(n);
            let flag = &c[i..flag_end];
            let Some(fit) = linear_regression_indexed(flag) else {
                continue;
            };
            let flag_size = (flag[flag.len() - 1] - flag[0]).abs();
            if flag_size > pole_size * self.max_flag_ratio.get() {
                continue;
            }

            let counter_trend = if rising { fit.slope <= 0.0 } else { fit.slope >= 0.0 };
            if !counter_trend || fit.r.abs() <= self.min_flag_fit.get() {
                continue;
            }

            let mut confidence = (strength * 100.0).min(95.0);
            if mean(&v[i..flag_end]) < mean(&v[i - pole_len..i]) {
                confidence += 10.0;
            }

            let (kind, direction, target) = if rising {
                (PatternKind::BullFlag, Direction::Bullish, last_close + pole_size)
            } else {
                (PatternKind::BearFlag, Direction::Bearish, last_close - pole_size)
            };
            out.push(
                PatternResult::new(kind, i - pole_len, flag_end - 1, confidence.min(95.0), direction)
                    .with_meta("pole_size", pole_size)
                    .with_meta("flag_size", flag_size)
                    .with_meta("target", target),
            );
        }
        Ok(out)
    }

    fn validate_config(&self) -> Result<()> {
        if self.pole_bars.get() < 2 {
            return Err(Error::InvalidValue("pole_bars must be >= 2"));
        }
        if self.flag_bars.get() < MIN_FLAG_BARS {
            return Err(Error::InvalidValue("flag_bars must be >= 3"));
        }
        Ok(())
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static HEAD_AND_SHOULDERS_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("order", 3.0, (2.0, 5.0, 1.0), "Extrema window on each side"),
    ParamMeta::ratio("min_symmetry", 0.95, (0.9, 0.99, 0.01), "Minimum shoulder symmetry"),
    ParamMeta::factor("head_factor", 1.1, (1.0, 1.5, 0.1), "Head extent over shoulder extent"),
];

static TWIN_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("order", 2.0, (1.0, 4.0, 1.0), "Extrema window on each side"),
    ParamMeta::ratio("min_similarity", 0.98, (0.95, 0.99, 0.01), "Minimum pivot similarity"),
    ParamMeta::ratio("min_height", 0.02, (0.01, 0.05, 0.01), "Minimum relative pattern height"),
];

static TRIANGLE_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("order", 2.0, (1.0, 4.0, 1.0), "Extrema window on each side"),
    ParamMeta::period("recent_pivots", 5.0, (3.0, 7.0, 1.0), "Pivots per trend line"),
    ParamMeta::ratio("min_fit", 0.7, (0.5, 0.9, 0.1), "Minimum |r| of each trend line"),
];

static FLAG_PARAMS: &[ParamMeta] = &[
    ParamMeta::period("pole_bars", 5.0, (3.0, 8.0, 1.0), "Pole length"),
    ParamMeta::period("flag_bars", 5.0, (3.0, 8.0, 1.0), "Maximum flag length"),
    ParamMeta::ratio("min_pole_strength", 0.8, (0.6, 0.95, 0.05), "Minimum pole R-squared"),
    ParamMeta::ratio("max_flag_ratio", 0.5, (0.3, 0.7, 0.1), "Flag move relative to pole"),
    ParamMeta::ratio("min_flag_fit", 0.6, (0.4, 0.8, 0.1), "Minimum |r| of flag closes"),
];

impl ParameterizedDetector for HeadAndShouldersDetector {
    fn param_meta() -> &'static [ParamMeta] {
        HEAD_AND_SHOULDERS_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            order: get_period(params, "order", 3)?,
            min_symmetry: get_ratio(params, "min_symmetry", 0.95)?,
            head_factor: get_factor(params, "head_factor", 1.1)?,
            ..Self::default()
        })
    }

    fn pattern_id_str() -> &'static str {
        "HEAD_AND_SHOULDERS"
    }
}

impl ParameterizedDetector for TriangleDetector {
    fn param_meta() -> &'static [ParamMeta] {
        TRIANGLE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            order: get_period(params, "order", 2)?,
            recent_pivots: get_period(params, "recent_pivots", 5)?,
            min_fit: get_ratio(params, "min_fit", 0.7)?,
            ..Self::default()
        })
    }

    fn pattern_id_str() -> &'static str {
        "TRIANGLE"
    }
}

impl ParameterizedDetector for FlagDetector {
    fn param_meta() -> &'static [ParamMeta] {
        FLAG_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            pole_bars: get_period(params, "pole_bars", 5)?,
            flag_bars: get_period(params, "flag_bars", 5)?,
            min_pole_strength: get_ratio(params, "min_pole_strength", 0.8)?,
            max_flag_ratio: get_ratio(params, "max_flag_ratio", 0.5)?,
            min_flag_fit: get_ratio(params, "min_flag_fit", 0.6)?,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        })
    }

    fn pattern_id_str() -> &'static str {
        "FLAG"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeframe::Timeframe;

    #[derive(Debug, Clone, Copy)]
    struct B {
        h: f64,
        l: f64,
        c: f64,
        v: f64,
    }

    impl OHLCV for B {
        fn open(&self) -> f64 {
            self.c
        }
        fn high(&self) -> f64 {
            self.h
        }
        fn low(&self) -> f64 {
            self.l
        }
        fn close(&self) -> f64 {
            self.c
        }
        fn volume(&self) -> f64 {
            self.v
        }
    }

    fn ctx() -> DetectContext<'static> {
        DetectContext::new("TEST", Timeframe::H1)
    }

    /// Bars whose high follows `highs` with a fixed 1.0 spread to the low
    fn from_highs(highs: &[f64]) -> Vec<B> {
        highs.iter().map(|&h| B { h, l: h - 1.0, c: h - 0.5, v: 100.0 }).collect()
    }

    #[test]
    fn test_head_and_shoulders() {
        let highs = [
            100.0, 101.0, 102.0, 105.0, 102.0, 101.0, 100.0, 101.0, 103.0, 110.0, 103.0, 101.0,
            100.0, 101.0, 102.0, 105.0, 102.0, 101.0, 100.0,
        ];
        let bars = from_highs(&highs);
        let found = HeadAndShouldersDetector::with_defaults().detect(&bars, &ctx()).unwrap();
        let hs: Vec<_> = found.iter().filter(|p| p.kind == PatternKind::HeadAndShoulders).collect();
        assert_eq!(hs.len(), 1);
        let p = hs[0];
        assert_eq!((p.start_index, p.end_index), (3, 15));
        assert_eq!(p.direction, Direction::Bearish);
        // neckline = mean(lows at 6 and 12) = 99.0, head height 11
        assert!((p.meta("neckline").unwrap() - 99.0).abs() < 1e-9);
        assert!((p.meta("target").unwrap() - 88.0).abs() < 1e-9);
        assert!((p.confidence - 95.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_head_and_shoulders() {
        let lows = [
            100.0, 99.0, 98.0, 95.0, 98.0, 99.0, 100.0, 99.0, 97.0, 90.0, 97.0, 99.0, 100.0,
            99.0, 98.0, 95.0, 98.0, 99.0, 100.0,
        ];
        let bars: Vec<B> = lows.iter().map(|&l| B { h: l + 1.0, l, c: l + 0.5, v: 100.0 }).collect();
        let found = HeadAndShouldersDetector::with_defaults().detect(&bars, &ctx()).unwrap();
        let inv: Vec<_> = found
            .iter()
            .filter(|p| p.kind == PatternKind::InverseHeadAndShoulders)
            .collect();
        assert_eq!(inv.len(), 1);
        assert_eq!(inv[0].direction, Direction::Bullish);
        // neckline = mean(highs at 6 and 12) = 101.0, head depth 11
        assert!((inv[0].meta("target").unwrap() - 112.0).abs() < 1e-9);
    }

    #[test]
    fn test_double_top() {
        let highs = [100.0, 102.0, 106.0, 102.0, 99.0, 97.0, 99.0, 102.0, 106.0, 102.0, 100.0];
        let bars = from_highs(&highs);
        let found = DoubleTopDetector::with_defaults().detect(&bars, &ctx()).unwrap();
        assert_eq!(found.len(), 1);
        let p = &found[0];
        assert_eq!((p.start_index, p.end_index), (2, 8));
        assert_eq!(p.meta("valley"), Some(96.0));
        assert_eq!(p.meta("target"), Some(86.0));
        assert!((p.confidence - 95.0).abs() < 1e-9);
    }

    #[test]
    fn test_double_bottom() {
        let lows = [100.0, 98.0, 94.0, 98.0, 101.0, 103.0, 101.0, 98.0, 94.0, 98.0, 100.0];
        let bars: Vec<B> = lows.iter().map(|&l| B { h: l + 1.0, l, c: l + 0.5, v: 100.0 }).collect();
        let found = DoubleBottomDetector::with_defaults().detect(&bars, &ctx()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, PatternKind::DoubleBottom);
        assert_eq!(found[0].meta("peak"), Some(104.0));
        assert_eq!(found[0].meta("target"), Some(114.0));
    }

    #[test]
    fn test_symmetrical_triangle() {
        // converging swings: highs fall, troughs of highs rise
        let highs = [
            100.0, 110.0, 100.0, 91.0, 100.0, 108.0, 100.0, 93.0, 100.0, 106.0, 100.0, 95.0,
            100.0, 104.0, 100.0, 97.0, 100.0,
        ];
        let bars = from_highs(&highs);
        let found = TriangleDetector::with_defaults().detect(&bars, &ctx()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, PatternKind::SymmetricalTriangle);
        assert_eq!(found[0].direction, Direction::Neutral);
        assert!(found[0].confidence > 95.0);
    }

    #[test]
    fn test_bull_flag() {
        let closes = [100.0, 101.0, 102.0, 103.0, 104.0, 103.8, 103.6, 103.4, 103.2, 103.0];
        let bars: Vec<B> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| B { h: c + 0.5, l: c - 0.5, c, v: if i < 5 { 200.0 } else { 100.0 } })
            .collect();
        let found = FlagDetector::with_defaults().detect(&bars, &ctx()).unwrap();
        let first = found.iter().find(|p| p.start_index == 0).unwrap();
        assert_eq!(first.kind, PatternKind::BullFlag);
        assert_eq!(first.end_index, 9);
        assert!((first.confidence - 95.0).abs() < 1e-9);
        assert!((first.meta("target").unwrap() - 107.0).abs() < 1e-9);
    }

    #[test]
    fn test_chart_detectors_empty_input() {
        let bars: Vec<B> = Vec::new();
        assert!(HeadAndShouldersDetector::with_defaults().detect(&bars, &ctx()).unwrap().is_empty());
        assert!(DoubleTopDetector::with_defaults().detect(&bars, &ctx()).unwrap().is_empty());
        assert!(DoubleBottomDetector::with_defaults().detect(&bars, &ctx()).unwrap().is_empty());
        assert!(TriangleDetector::with_defaults().detect(&bars, &ctx()).unwrap().is_empty());
        assert!(FlagDetector::with_defaults().detect(&bars, &ctx()).unwrap().is_empty());
    }
}
