//! Trend behavior, trading decision and window filters

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::GridConfig;
use crate::timeframe::Timeframe;
use crate::{Direction, Ratio};

/// Number of directional predicates tracked per library pattern
pub const PREDICATE_COUNT: usize = 10;

/// Accuracy a predicate must beat to count as better than chance
pub const FORECASTING_THRESHOLD: f64 = 50.0;

// ============================================================
// TYPES
// ============================================================

/// Trading decision attached to a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Prediction {
    EnterLong,
    EnterShort,
    NotTrade,
    Conflict,
}

impl Prediction {
    pub fn as_str(self) -> &'static str {
        match self {
            Prediction::EnterLong => "ENTER_LONG",
            Prediction::EnterShort => "ENTER_SHORT",
            Prediction::NotTrade => "NOT_TRADE",
            Prediction::Conflict => "CONFLICT",
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Prediction::EnterLong => Direction::Bullish,
            Prediction::EnterShort => Direction::Bearish,
            Prediction::NotTrade | Prediction::Conflict => Direction::Neutral,
        }
    }

    /// ENTER_LONG or ENTER_SHORT
    pub fn is_actionable(self) -> bool {
        matches!(self, Prediction::EnterLong | Prediction::EnterShort)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TB classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendClass {
    Bullish,
    Bearish,
    NoTrend,
}

// ============================================================
// TREND BEHAVIOR
// ============================================================

/// `TB = (r2 + r4 + r6 + r8 + r10) - (r1 + r3 + r5 + r7 + r9)`
///
/// Predicates are 1-based in that formula, so the bullish group sits at odd
/// 0-based indices.
pub fn trend_behavior(predicates: &[f64]) -> f64 {
    predicates
        .iter()
        .enumerate()
        .map(|(i, &r)| if i % 2 == 1 { r } else { -r })
        .sum()
}

pub fn classify_trend(tb: f64, threshold: f64) -> TrendClass {
    if tb > threshold {
        TrendClass::Bullish
    } else if tb < -threshold {
        TrendClass::Bearish
    } else {
        TrendClass::NoTrend
    }
}

fn group_max(predicates: &[f64], bullish: bool) -> f64 {
    let offset = usize::from(bullish);
    predicates
        .iter()
        .skip(offset)
        .step_by(2)
        .copied()
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Decide from the stored predicate accuracies.
///
/// Anything but exactly ten predicates is NOT_TRADE.
pub fn make_trading_decision(predicates: &[f64], threshold: f64) -> Prediction {
    if predicates.len() != PREDICATE_COUNT {
        return Prediction::NotTrade;
    }

    let trend = classify_trend(trend_behavior(predicates), threshold);
    if trend == TrendClass::NoTrend {
        return Prediction::NotTrade;
    }

    let bull_max = group_max(predicates, true);
    let bear_max = group_max(predicates, false);
    let all_max = bull_max.max(bear_max);

    if all_max == bull_max && trend == TrendClass::Bullish {
        Prediction::EnterLong
    } else if all_max == bear_max && trend == TrendClass::Bearish {
        Prediction::EnterShort
    } else {
        Prediction::Conflict
    }
}

/// At least one predicate beats `threshold`
pub fn has_forecasting_power(predicates: &[f64], threshold: f64) -> bool {
    predicates.iter().any(|&r| r > threshold)
}

// ============================================================
// WINDOW FILTERS
// ============================================================

/// Window range in pips meets the timeframe minimum
pub fn passes_pip_filter(window: &[f64], timeframe: Timeframe, config: &GridConfig) -> bool {
    if window.is_empty() || config.pip_size <= 0.0 {
        return false;
    }
    let (min, max) = window
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| (lo.min(p), hi.max(p)));
    (max - min) / config.pip_size >= config.min_pips(timeframe)
}

/// `current_price` lies within the window mean +/- `band` of the mean
pub fn passes_price_band(window: &[f64], current_price: f64, band: Ratio) -> bool {
    if window.is_empty() {
        return true;
    }
    let apl = window.iter().sum::<f64>() / window.len() as f64;
    if apl == 0.0 {
        return true;
    }
    let width = (apl * band.get()).abs();
    (apl - width..=apl + width).contains(&current_price)
}
