//! Candlestick detectors: Doji, Hammer, Shooting Star, Engulfing
//!
//! Each scans every position of the supplied sequence and reports one result
//! per qualifying bar (or bar pair for Engulfing).

use std::collections::HashMap;

use super::helpers::calc_confidence;
use crate::params::{get_factor, get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector};
use crate::{
    DetectContext, DetectorCategory, Direction, Error, OHLCVExt, PatternDetector, PatternKind,
    PatternResult, Period, Ratio, Result, OHLCV,
};

/// Detector-side confidence floor reported to callers
pub const DEFAULT_MIN_CONFIDENCE: f64 = 70.0;

impl_with_defaults!(DojiDetector, HammerDetector, ShootingStarDetector, EngulfingDetector);

// ============================================================
// DOJI
// ============================================================

/// Body under 10% of the bar range
#[derive(Debug, Clone, Copy)]
pub struct DojiDetector {
    pub max_body_ratio: Ratio,
    pub min_confidence: f64,
}

impl Default for DojiDetector {
    fn default() -> Self {
        Self {
            max_body_ratio: Ratio::new_const(0.1),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl PatternDetector for DojiDetector {
    fn name(&self) -> &'static str {
        "DOJI"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Candlestick
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    fn detect<T: OHLCV>(&self, bars: &[T], _ctx: &DetectContext<'_>) -> Result<Vec<PatternResult>> {
        let limit = self.max_body_ratio.get();
        let mut out = Vec::new();

        for (i, bar) in bars.iter().enumerate() {
            let Some(ratio) = bar.body_ratio() else {
                continue;
            };
            if ratio >= limit {
                continue;
            }
            let confidence = 100.0 * (1.0 - ratio / limit);
            out.push(
                PatternResult::new(PatternKind::Doji, i, i, confidence, Direction::Neutral)
                    .with_meta("body_ratio", ratio)
                    .with_meta("price", bar.close()),
            );
        }
        Ok(out)
    }

    fn validate_config(&self) -> Result<()> {
        if self.max_body_ratio.get() <= 0.0 {
            return Err(Error::InvalidValue("max_body_ratio must be > 0"));
        }
        Ok(())
    }
}

// ============================================================
// HAMMER / SHOOTING STAR
// ============================================================

/// Shape thresholds shared by the single-shadow reversal candles
#[derive(Debug, Clone, Copy)]
struct ShadowShape {
    shadow_body_factor: f64,
    opposite_shadow_factor: Ratio,
    shadow_range_ratio: Ratio,
    trend_bars: Period,
}

impl ShadowShape {
    /// Ratio of dominant shadow to body when the shape qualifies
    fn dominant_ratio(&self, dominant: f64, opposite: f64, body: f64, range: f64) -> Option<f64> {
        let qualifies = dominant > self.shadow_body_factor * body
            && opposite < self.opposite_shadow_factor.get() * body
            && dominant > self.shadow_range_ratio.get() * range;
        qualifies.then(|| dominant / body)
    }

    /// The `trend_bars` closes before `i` move strictly in one direction
    fn prior_trend<T: OHLCV>(&self, bars: &[T], i: usize, falling: bool) -> bool {
        let n = self.trend_bars.get();
        if i < n {
            return false;
        }
        bars[i - n..i].windows(2).all(|w| {
            if falling {
                w[0].close() > w[1].close()
            } else {
                w[0].close() < w[1].close()
            }
        })
    }

    fn validate(&self) -> Result<()> {
        if !(self.shadow_body_factor > 0.0) {
            return Err(Error::InvalidValue("shadow_body_factor must be > 0"));
        }
        Ok(())
    }

    /// Shared scan; `bullish` selects the lower shadow and a prior downtrend
    fn scan<T: OHLCV>(&self, bars: &[T], bullish: bool) -> Vec<(usize, f64, f64)> {
        let mut hits = Vec::new();
        for (i, bar) in bars.iter().enumerate().skip(1) {
            let body = bar.body();
            let range = bar.range();
            if range == 0.0 || body == 0.0 {
                continue;
            }
            let (dominant, opposite) = if bullish {
                (bar.lower_shadow(), bar.upper_shadow())
            } else {
                (bar.upper_shadow(), bar.lower_shadow())
            };
            let Some(ratio) = self.dominant_ratio(dominant, opposite, body, range) else {
                continue;
            };
            if !self.prior_trend(bars, i, bullish) {
                continue;
            }
            let confidence = calc_confidence(ratio, 2.0, 0.5).min(95.0);
            hits.push((i, ratio, confidence));
        }
        hits
    }
}

macro_rules! shadow_detector {
    (
        $(#[$doc:meta])*
        $name:ident, $id:literal, $kind:expr, $direction:expr, $bullish:literal, $meta_key:literal
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name {
            /// Dominant shadow must exceed this multiple of the body
            pub shadow_body_factor: f64,
            /// Opposite shadow must stay under this fraction of the body
            pub opposite_shadow_factor: Ratio,
            /// Dominant shadow must exceed this fraction of the range
            pub shadow_range_ratio: Ratio,
            /// Prior closes that must trend against the reversal
            pub trend_bars: Period,
            pub min_confidence: f64,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    shadow_body_factor: 2.0,
                    opposite_shadow_factor: Ratio::new_const(0.3),
                    shadow_range_ratio: Ratio::new_const(0.6),
                    trend_bars: Period::new_const(3),
                    min_confidence: DEFAULT_MIN_CONFIDENCE,
                }
            }
        }

        impl $name {
            fn shape(&self) -> ShadowShape {
                ShadowShape {
                    shadow_body_factor: self.shadow_body_factor,
                    opposite_shadow_factor: self.opposite_shadow_factor,
                    shadow_range_ratio: self.shadow_range_ratio,
                    trend_bars: self.trend_bars,
                }
            }
        }

        impl PatternDetector for $name {
            fn name(&self) -> &'static str {
                $id
            }

            fn category(&self) -> DetectorCategory {
                DetectorCategory::Candlestick
            }

            fn min_bars(&self) -> usize {
                self.trend_bars.get() + 1
            }

            fn min_confidence(&self) -> f64 {
                self.min_confidence
            }

            fn detect<T: OHLCV>(&self, bars: &[T], _ctx: &DetectContext<'_>) -> Result<Vec<PatternResult>> {
                Ok(self
                    .shape()
                    .scan(bars, $bullish)
                    .into_iter()
                    .map(|(i, ratio, confidence)| {
                        PatternResult::new($kind, i, i, confidence, $direction)
                            .with_meta($meta_key, ratio)
                            .with_meta("price", bars[i].close())
                    })
                    .collect())
            }

            fn validate_config(&self) -> Result<()> {
                self.shape().validate()
            }
        }

        impl ParameterizedDetector for $name {
            fn param_meta() -> &'static [ParamMeta] {
                SHADOW_PARAMS
            }

            fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
                Ok(Self {
                    shadow_body_factor: get_factor(params, "shadow_body_factor", 2.0)?,
                    opposite_shadow_factor: get_ratio(params, "opposite_shadow_factor", 0.3)?,
                    shadow_range_ratio: get_ratio(params, "shadow_range_ratio", 0.6)?,
                    trend_bars: get_period(params, "trend_bars", 3)?,
                    min_confidence: DEFAULT_MIN_CONFIDENCE,
                })
            }

            fn pattern_id_str() -> &'static str {
                $id
            }
        }
    };
}

shadow_detector!(
    /// Long lower shadow after a run of falling closes (bullish reversal)
    HammerDetector, "HAMMER", PatternKind::Hammer, Direction::Bullish, true, "lower_shadow_ratio"
);

shadow_detector!(
    /// Long upper shadow after a run of rising closes (bearish reversal)
    ShootingStarDetector, "SHOOTING_STAR", PatternKind::ShootingStar, Direction::Bearish, false, "upper_shadow_ratio"
);

// ============================================================
// ENGULFING
// ============================================================

/// Opposite-coloured candle whose body swallows the prior body
#[derive(Debug, Clone, Copy)]
pub struct EngulfingDetector {
    pub min_confidence: f64,
}

impl Default for EngulfingDetector {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl PatternDetector for EngulfingDetector {
    fn name(&self) -> &'static str {
        "ENGULFING"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::Candlestick
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    fn detect<T: OHLCV>(&self, bars: &[T], _ctx: &DetectContext<'_>) -> Result<Vec<PatternResult>> {
        let mut out = Vec::new();

        for (i, pair) in bars.windows(2).enumerate() {
            let (prev, curr) = (&pair[0], &pair[1]);
            let (prev_body, curr_body) = (prev.body(), curr.body());
            if prev_body == 0.0 || curr_body == 0.0 {
                continue;
            }

            let bullish = prev.is_bearish()
                && curr.is_bullish()
                && curr.open() < prev.close()
                && curr.close() > prev.open();
            let bearish = prev.is_bullish()
                && curr.is_bearish()
                && curr.open() > prev.close()
                && curr.close() < prev.open();

            let (kind, direction) = match (bullish, bearish) {
                (true, _) => (PatternKind::BullishEngulfing, Direction::Bullish),
                (_, true) => (PatternKind::BearishEngulfing, Direction::Bearish),
                _ => continue,
            };

            let ratio = curr_body / prev_body;
            out.push(
                PatternResult::new(kind, i, i + 1, (ratio * 50.0).min(100.0), direction)
                    .with_meta("engulfing_ratio", ratio)
                    .with_meta("price", curr.close()),
            );
        }
        Ok(out)
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

static DOJI_PARAMS: &[ParamMeta] = &[ParamMeta {
    name: "max_body_ratio",
    param_type: ParamType::Ratio,
    default: 0.1,
    range: (0.05, 0.2, 0.05),
    description: "Maximum body/range ratio",
}];

static SHADOW_PARAMS: &[ParamMeta] = &[
    ParamMeta {
        name: "shadow_body_factor",
        param_type: ParamType::Factor,
        default: 2.0,
        range: (1.5, 3.0, 0.5),
        description: "Dominant shadow as multiple of body",
    },
    ParamMeta {
        name: "opposite_shadow_factor",
        param_type: ParamType::Ratio,
        default: 0.3,
        range: (0.1, 0.5, 0.1),
        description: "Maximum opposite shadow as fraction of body",
    },
    ParamMeta {
        name: "shadow_range_ratio",
        param_type: ParamType::Ratio,
        default: 0.6,
        range: (0.5, 0.8, 0.1),
        description: "Minimum dominant shadow as fraction of range",
    },
    ParamMeta {
        name: "trend_bars",
        param_type: ParamType::Period,
        default: 3.0,
        range: (2.0, 5.0, 1.0),
        description: "Prior closes that must trend against the reversal",
    },
];

impl ParameterizedDetector for DojiDetector {
    fn param_meta() -> &'static [ParamMeta] {
        DOJI_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            max_body_ratio: get_ratio(params, "max_body_ratio", 0.1)?,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        })
    }

    fn pattern_id_str() -> &'static str {
        "DOJI"
    }
}
