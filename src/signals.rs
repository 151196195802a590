//! Trading signals from detected patterns
//!
//! Each pattern kind maps to a fixed signal type and weight; Template Grid
//! matches map through their prediction instead. The weighted confidence is
//! then adjusted for trend alignment, volume and agreement between patterns.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bar::Bar;
use crate::config::SignalConfig;
use crate::detectors::helpers::{linear_regression_indexed, trend_strength, volumes};
use crate::grid::Prediction;
use crate::scanner::{DetectedPattern, PatternScanner};
use crate::store::SignalRecord;
use crate::timeframe::Timeframe;
use crate::{PatternKind, Result, Trend, OHLCV};

// ============================================================
// SIGNAL TABLES
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
    Neutral,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
            SignalType::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal type and confidence weight for a classic pattern kind.
///
/// Template Grid kinds have no fixed entry; see [`prediction_signal`].
pub fn pattern_signal(kind: PatternKind) -> Option<(SignalType, f64)> {
    use PatternKind::*;
    use SignalType::*;

    Some(match kind {
        Hammer => (Buy, 0.8),
        BullishEngulfing => (Buy, 0.85),
        DoubleBottom => (Buy, 0.9),
        BullFlag => (Buy, 0.85),
        AscendingTriangle => (Buy, 0.8),
        InverseHeadAndShoulders => (Buy, 0.9),

        ShootingStar => (Sell, 0.8),
        BearishEngulfing => (Sell, 0.85),
        DoubleTop => (Sell, 0.9),
        BearFlag => (Sell, 0.85),
        DescendingTriangle => (Sell, 0.8),
        HeadAndShoulders => (Sell, 0.9),

        Doji => (Neutral, 0.5),
        SymmetricalTriangle => (Neutral, 0.6),

        TemplateGrid(_) => return None,
    })
}

pub fn prediction_signal(prediction: Prediction) -> (SignalType, f64) {
    match prediction {
        Prediction::EnterLong => (SignalType::Buy, 0.95),
        Prediction::EnterShort => (SignalType::Sell, 0.95),
        Prediction::NotTrade => (SignalType::Neutral, 0.3),
        Prediction::Conflict => (SignalType::Neutral, 0.4),
    }
}

/// Table entry for a detected pattern, if it has one
fn signal_rule(pattern: &DetectedPattern) -> Option<(SignalType, f64)> {
    match pattern.kind() {
        PatternKind::TemplateGrid(_) => pattern
            .result
            .template_match
            .as_ref()
            .map(|m| prediction_signal(m.prediction)),
        kind => pattern_signal(kind),
    }
}

// ============================================================
// SIGNALS
// ============================================================

/// Market conditions around a pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalContext {
    pub trend: Option<Trend>,
    pub volume_confirmed: bool,
    /// Distinct pattern kinds (this one included) pointing the same way over
    /// an overlapping span
    pub pattern_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub signal_time: DateTime<Utc>,
    pub signal_type: SignalType,
    pub pattern_type: String,
    pub price: f64,
    pub confidence: f64,
    pub pattern_confidence: f64,
    pub context: SignalContext,
}

impl Signal {
    pub fn to_record(&self) -> SignalRecord {
        SignalRecord {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            pattern_type: self.pattern_type.clone(),
            signal_type: self.signal_type,
            confidence: self.confidence,
            price: self.price,
            signal_time: self.signal_time,
            metadata: serde_json::json!({
                "pattern_confidence": self.pattern_confidence,
                "trend": self.context.trend,
                "volume_confirmed": self.context.volume_confirmed,
                "pattern_count": self.context.pattern_count,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub patterns_detected: usize,
    pub signals_generated: usize,
    pub signals: Vec<Signal>,
}

// ============================================================
// GENERATOR
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct SignalGenerator {
    config: SignalConfig,
}

impl SignalGenerator {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// `pattern_confidence x weight`, then x1.1 with the trend, x0.8 against
    /// it, x1.05 on volume, x1.1 on agreement; capped at 100
    pub fn signal_confidence(
        pattern_confidence: f64,
        signal_type: SignalType,
        weight: f64,
        context: &SignalContext,
    ) -> f64 {
        let mut confidence = pattern_confidence * weight;

        if let Some(trend) = context.trend {
            let aligned = (trend.is_up() && signal_type == SignalType::Buy)
                || (trend.is_down() && signal_type == SignalType::Sell);
            let opposed = (trend.is_up() && signal_type == SignalType::Sell)
                || (trend.is_down() && signal_type == SignalType::Buy);
            if aligned {
                confidence *= 1.1;
            } else if opposed {
                confidence *= 0.8;
            }
        }
        if context.volume_confirmed {
            confidence *= 1.05;
        }
        if context.pattern_count > 1 {
            confidence *= 1.1;
        }

        confidence.min(100.0)
    }

    /// Context for `pattern` from the bars it was detected on and the other
    /// patterns of the same scan
    pub fn derive_context(&self, bars: &[Bar], pattern: &DetectedPattern, all: &[DetectedPattern]) -> SignalContext {
        let (start, end) = (pattern.result.start_index, pattern.result.end_index);
        let trend = Trend::classify(bars, end, self.config.trend_period.get());

        let volume_confirmed = bars.get(start..=end).is_some_and(|span| {
            let v = volumes(span);
            trend_strength(&v) > 0.5 && linear_regression_indexed(&v).is_some_and(|fit| fit.slope > 0.0)
        });

        let pattern_count = match signal_rule(pattern) {
            Some((signal_type, _)) => {
                let mut kinds: Vec<PatternKind> = all
                    .iter()
                    .filter(|other| {
                        other.result.start_index <= end
                            && start <= other.result.end_index
                            && signal_rule(other).is_some_and(|(t, _)| t == signal_type)
                    })
                    .map(DetectedPattern::kind)
                    .collect();
                kinds.push(pattern.kind());
                kinds.sort();
                kinds.dedup();
                kinds.len()
            },
            None => 1,
        };

        SignalContext { trend: Some(trend), volume_confirmed, pattern_count }
    }

    /// Entry price: the live price for Template Grid, otherwise the pattern's
    /// target, price or neckline, then the close of its last bar
    fn signal_price(bars: &[Bar], pattern: &DetectedPattern) -> Option<f64> {
        if let Some(m) = &pattern.result.template_match {
            return Some(m.current_price);
        }
        ["target", "price", "neckline"]
            .iter()
            .find_map(|key| pattern.result.meta(key))
            .or_else(|| bars.get(pattern.result.end_index).map(OHLCV::close))
    }

    /// Turn detected patterns into signals.
    ///
    /// `bars` must be the sequence the patterns were detected on.
    pub fn signals_from_patterns(&self, bars: &[Bar], patterns: &[DetectedPattern]) -> Vec<Signal> {
        let mut signals = Vec::new();

        for pattern in patterns {
            if pattern.confidence() < self.config.min_pattern_confidence {
                continue;
            }
            let Some((signal_type, weight)) = signal_rule(pattern) else {
                continue;
            };
            if signal_type == SignalType::Neutral {
                continue;
            }

            let context = self.derive_context(bars, pattern, patterns);
            let confidence = Self::signal_confidence(pattern.confidence(), signal_type, weight, &context);
            if confidence < self.config.min_signal_confidence {
                debug!(pattern = %pattern.kind(), confidence, "Signal below threshold");
                continue;
            }

            let Some(price) = Self::signal_price(bars, pattern).filter(|p| *p > 0.0) else {
                warn!(pattern = %pattern.kind(), "No usable signal price");
                continue;
            };

            signals.push(Signal {
                symbol: pattern.symbol.clone(),
                timeframe: pattern.timeframe,
                signal_time: pattern.end_time,
                signal_type,
                pattern_type: pattern.kind().to_string(),
                price,
                confidence,
                pattern_confidence: pattern.confidence(),
                context,
            });
        }
        signals
    }

    /// Scan `[start, end]` and derive signals without persisting anything
    pub fn generate_signals(
        &self,
        scanner: &PatternScanner,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SignalReport> {
        info!(symbol, %timeframe, "Generating signals");
        let bars = scanner.fetch_bars(symbol, timeframe, start, end)?;
        let patterns = scanner.scan_bars(symbol, timeframe, &bars);
        let signals = self.signals_from_patterns(&bars, &patterns);
        info!(symbol, %timeframe, patterns = patterns.len(), signals = signals.len(), "Signals generated");

        Ok(SignalReport {
            patterns_detected: patterns.len(),
            signals_generated: signals.len(),
            signals,
        })
    }

    /// As [`generate_signals`](Self::generate_signals), saving the patterns
    /// and signals through the scanner's sink in a single write
    pub fn scan_and_generate(
        &self,
        scanner: &PatternScanner,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SignalReport> {
        let bars = scanner.fetch_bars(symbol, timeframe, start, end)?;
        let patterns = scanner.scan_bars(symbol, timeframe, &bars);
        let signals = self.signals_from_patterns(&bars, &patterns);

        let records: Vec<SignalRecord> = signals.iter().map(Signal::to_record).collect();
        scanner.save_scan(&patterns, &records)?;
        info!(symbol, %timeframe, patterns = patterns.len(), signals = signals.len(), "Signals saved");

        Ok(SignalReport {
            patterns_detected: patterns.len(),
            signals_generated: signals.len(),
            signals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, PatternResult};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn flat_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| Bar::new(t0() + Duration::hours(i as i64), 1.1, 1.101, 1.099, 1.1, 100.0))
            .collect()
    }

    fn detected(kind: PatternKind, start: usize, end: usize, confidence: f64) -> DetectedPattern {
        DetectedPattern {
            symbol: "EURUSD".into(),
            timeframe: Timeframe::H1,
            start_time: t0() + Duration::hours(start as i64),
            end_time: t0() + Duration::hours(end as i64),
            result: PatternResult::new(kind, start, end, confidence, Direction::Neutral),
        }
    }

    #[test]
    fn test_tables() {
        assert_eq!(pattern_signal(PatternKind::DoubleBottom), Some((SignalType::Buy, 0.9)));
        assert_eq!(pattern_signal(PatternKind::HeadAndShoulders), Some((SignalType::Sell, 0.9)));
        assert_eq!(pattern_signal(PatternKind::TemplateGrid(3)), None);
        assert_eq!(prediction_signal(Prediction::Conflict), (SignalType::Neutral, 0.4));
    }

    #[test]
    fn test_confidence_adjustments() {
        let none = SignalContext::default();
        assert!((SignalGenerator::signal_confidence(80.0, SignalType::Buy, 0.9, &none) - 72.0).abs() < 1e-9);

        let aligned = SignalContext { trend: Some(Trend::StrongUp), ..none };
        assert!((SignalGenerator::signal_confidence(80.0, SignalType::Buy, 0.9, &aligned) - 79.2).abs() < 1e-9);

        let opposed = SignalContext { trend: Some(Trend::WeakDown), ..none };
        assert!((SignalGenerator::signal_confidence(80.0, SignalType::Buy, 0.9, &opposed) - 57.6).abs() < 1e-9);

        let all = SignalContext { trend: Some(Trend::StrongDown), volume_confirmed: true, pattern_count: 2 };
        let expected: f64 = 100.0 * 0.9 * 1.1 * 1.05 * 1.1;
        assert_eq!(SignalGenerator::signal_confidence(100.0, SignalType::Sell, 0.9, &all), expected.min(100.0));
    }

    #[test]
    fn test_neutral_and_weak_patterns_dropped() {
        let generator = SignalGenerator::default();
        let bars = flat_bars(10);
        let patterns = vec![
            detected(PatternKind::Doji, 5, 5, 100.0),
            detected(PatternKind::Hammer, 5, 5, 65.0),
        ];
        assert!(generator.signals_from_patterns(&bars, &patterns).is_empty());
    }

    #[test]
    fn test_signal_price_preference() {
        let generator = SignalGenerator::default();
        let bars = flat_bars(10);
        let mut top = detected(PatternKind::DoubleTop, 2, 6, 90.0);
        top.result = top.result.with_meta("neckline", 1.05).with_meta("target", 1.02);
        let hammer = detected(PatternKind::Hammer, 8, 8, 90.0);

        let signals = generator.signals_from_patterns(&bars, &[top, hammer]);
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].signal_type, SignalType::Sell);
        assert_eq!(signals[0].price, 1.02);
        assert_eq!(signals[0].signal_time, t0() + Duration::hours(6));
        assert_eq!(signals[1].price, 1.1);
        assert_eq!(signals[1].context.trend, Some(Trend::Sideways));
    }

    #[test]
    fn test_agreement_counts_distinct_overlapping_kinds() {
        let generator = SignalGenerator::default();
        let bars = flat_bars(20);
        let patterns = vec![
            detected(PatternKind::DoubleBottom, 2, 8, 80.0),
            detected(PatternKind::BullFlag, 6, 12, 80.0),
            detected(PatternKind::Hammer, 15, 15, 80.0),
            detected(PatternKind::HeadAndShoulders, 3, 7, 80.0),
        ];
        assert_eq!(generator.derive_context(&bars, &patterns[0], &patterns).pattern_count, 2);
        assert_eq!(generator.derive_context(&bars, &patterns[2], &patterns).pattern_count, 1);
        assert_eq!(generator.derive_context(&bars, &patterns[3], &patterns).pattern_count, 1);
    }

    #[test]
    fn test_volume_confirmation() {
        let generator = SignalGenerator::default();
        let mut bars = flat_bars(10);
        for (i, bar) in bars.iter_mut().enumerate() {
            bar.volume = 100.0 + i as f64 * 10.0;
        }
        let rising = detected(PatternKind::BullFlag, 2, 7, 80.0);
        assert!(generator.derive_context(&bars, &rising, &[]).volume_confirmed);

        bars.reverse();
        assert!(!generator.derive_context(&bars, &rising, &[]).volume_confirmed);
    }
}
