//! Template Grid adapter
//!
//! Runs the engine over the closes of the supplied bars so library matches
//! flow through the scanner like any other detector result.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use super::candlestick::DEFAULT_MIN_CONFIDENCE;
use super::helpers::closes;
use crate::grid::TemplateGridEngine;
use crate::{DetectContext, DetectorCategory, PatternDetector, PatternKind, PatternResult, Result, OHLCV};

/// Fewer bars than this and the adapter reports nothing
pub const TEMPLATE_MIN_BARS: usize = 10;

/// Exposes a shared [`TemplateGridEngine`] as a detector
#[derive(Debug, Clone)]
pub struct TemplateGridDetector {
    engine: Arc<TemplateGridEngine>,
    pub min_confidence: f64,
}

impl TemplateGridDetector {
    pub fn with_engine(engine: Arc<TemplateGridEngine>) -> Self {
        Self { engine, min_confidence: DEFAULT_MIN_CONFIDENCE }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn engine(&self) -> &Arc<TemplateGridEngine> {
        &self.engine
    }
}

impl PatternDetector for TemplateGridDetector {
    fn name(&self) -> &'static str {
        "TEMPLATE_GRID"
    }

    fn category(&self) -> DetectorCategory {
        DetectorCategory::TemplateGrid
    }

    fn min_bars(&self) -> usize {
        TEMPLATE_MIN_BARS
    }

    fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &DetectContext<'_>) -> Result<Vec<PatternResult>> {
        let Some(last) = bars.last() else {
            return Ok(Vec::new());
        };
        if bars.len() < self.min_bars() {
            return Ok(Vec::new());
        }

        let window = closes(bars);
        let detected_at = last
            .timestamp()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);
        let matches =
            self.engine
                .detect_patterns_at(&window, ctx.symbol, ctx.timeframe, last.close(), detected_at);

        let len = bars.len();
        Ok(matches
            .into_iter()
            .map(|m| {
                let mut result = PatternResult::new(
                    PatternKind::TemplateGrid(m.pattern_id),
                    len - m.grid_size.1,
                    len - 1,
                    m.confidence,
                    m.prediction.direction(),
                )
                .with_meta("similarity", m.similarity)
                .with_meta("trend_behavior", m.trend_behavior)
                .with_meta("total_pnl", m.total_pnl)
                .with_meta("trades_taken", m.trades_taken as f64)
                .with_meta("successful_trades", m.successful_trades as f64)
                .with_meta("price", m.current_price);
                result.template_match = Some(Box::new(m));
                result
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bar::Bar;
    use crate::config::GridConfig;
    use crate::grid::{prices_to_pic, Prediction, TemplateGridPattern};
    use crate::timeframe::Timeframe;
    use crate::Direction;
    use chrono::Duration;

    const LONG: [f64; 10] = [40.0, 80.0, 40.0, 70.0, 40.0, 60.0, 40.0, 60.0, 40.0, 60.0];

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(t0 + Duration::hours(i as i64), c, c + 0.0005, c - 0.0005, c, 100.0))
            .collect()
    }

    fn detector_for(window: &[f64]) -> TemplateGridDetector {
        let pic = prices_to_pic(window, (5, 10)).unwrap();
        let pattern =
            TemplateGridPattern::from_pic(42, pic, (5, 10), Timeframe::H1, LONG.to_vec(), 80.0).unwrap();
        let engine = TemplateGridEngine::new(GridConfig::default());
        engine.set_patterns(vec![pattern]);
        TemplateGridDetector::with_engine(Arc::new(engine))
    }

    #[test]
    fn test_match_becomes_result() {
        let window: Vec<f64> = (0..10).map(|i| 1.2000 + i as f64 * 0.0010).collect();
        let mut closes = vec![1.2000; 4];
        closes.extend_from_slice(&window);
        let input = bars(&closes);

        let detector = detector_for(&window);
        let results = detector.detect(&input, &DetectContext::new("EURUSD", Timeframe::H1)).unwrap();

        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.kind, PatternKind::TemplateGrid(42));
        assert_eq!((r.start_index, r.end_index), (4, 13));
        assert_eq!(r.direction, Direction::Bullish);
        assert!((r.meta("similarity").unwrap() - 100.0).abs() < 1e-9);

        let m = r.template_match.as_ref().unwrap();
        assert_eq!(m.prediction, Prediction::EnterLong);
        assert_eq!(m.detected_at, input[13].time);
        assert_eq!(m.symbol, "EURUSD");
    }

    #[test]
    fn test_short_input_is_empty() {
        let window: Vec<f64> = (0..10).map(|i| 1.2000 + i as f64 * 0.0010).collect();
        let detector = detector_for(&window);
        let ctx = DetectContext::new("EURUSD", Timeframe::H1);
        assert!(detector.detect(&bars(&window[..9]), &ctx).unwrap().is_empty());
        assert!(detector.detect::<Bar>(&[], &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_other_timeframe_is_empty() {
        let window: Vec<f64> = (0..10).map(|i| 1.2000 + i as f64 * 0.0010).collect();
        let detector = detector_for(&window);
        let ctx = DetectContext::new("EURUSD", Timeframe::M5);
        assert!(detector.detect(&bars(&window), &ctx).unwrap().is_empty());
    }
}
