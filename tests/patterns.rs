//! Integration tests for the classic detector set.
//!
//! These run the builtin detectors over a local bar type through the public
//! prelude, the same way a caller with its own bar records would.

use std::collections::HashMap;

use gridpat::prelude::*;

/// Simple test bar structure
#[derive(Debug, Clone, Copy)]
struct TestBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl TestBar {
    fn new(o: f64, h: f64, l: f64, c: f64) -> Self {
        Self { o, h, l, c, v: 1000.0 }
    }
}

impl OHLCV for TestBar {
    fn open(&self) -> f64 {
        self.o
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
    DetectContext::new("EURUSD", Timeframe::H1)
}

/// Bars whose highs follow `highs` and lows sit `gap` below
fn from_highs(highs: &[f64], gap: f64) -> Vec<TestBar> {
    highs
        .iter()
        .map(|&h| TestBar::new(h - gap / 2.0, h, h - gap, h - gap / 2.0))
        .collect()
}

fn make_downtrend(n: usize) -> Vec<TestBar> {
    (0..n)
        .map(|i| {
            let base = 100.0 - (i as f64) * 2.0;
            TestBar::new(base + 1.0, base + 2.0, base - 1.0, base - 0.5)
        })
        .collect()
}

// ============================================================
// CANDLESTICK PATTERN TESTS
// ============================================================

#[test]
fn test_doji_confidence_scales_with_body() {
    let bars = [TestBar::new(1.1000, 1.1010, 1.0990, 1.1001)];
    let results = DojiDetector::with_defaults().detect(&bars, &ctx()).unwrap();

    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.kind, PatternKind::Doji);
    assert_eq!(r.direction, Direction::Neutral);
    assert!((r.confidence - 50.0).abs() < 1e-6, "confidence {}", r.confidence);
    assert!((r.meta("body_ratio").unwrap() - 0.05).abs() < 1e-9);
}

#[test]
fn test_wide_body_is_not_doji() {
    let bars = [TestBar::new(1.1000, 1.1010, 1.0990, 1.1008)];
    assert!(DojiDetector::with_defaults().detect(&bars, &ctx()).unwrap().is_empty());
}

#[test]
fn test_bullish_engulfing() {
    let bars = [
        TestBar::new(1.1010, 1.1015, 1.0995, 1.1000),
        TestBar::new(1.0995, 1.1025, 1.0990, 1.1020),
    ];
    let results = EngulfingDetector::with_defaults().detect(&bars, &ctx()).unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].kind, PatternKind::BullishEngulfing);
    assert_eq!(results[0].direction, Direction::Bullish);
    assert_eq!((results[0].start_index, results[0].end_index), (0, 1));
    // body ratio 2.5 caps at 100
    assert_eq!(results[0].confidence, 100.0);
}

#[test]
fn test_bearish_engulfing() {
    let bars = [
        TestBar::new(1.1000, 1.1012, 1.0998, 1.1010),
        TestBar::new(1.1012, 1.1015, 1.0990, 1.0995),
    ];
    let results = EngulfingDetector::with_defaults().detect(&bars, &ctx()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].kind, PatternKind::BearishEngulfing);
    assert_eq!(results[0].direction, Direction::Bearish);
}

#[test]
fn test_hammer_after_decline() {
    let mut bars = make_downtrend(5);
    // small body at the top, lower shadow 8x the body
    bars.push(TestBar::new(90.0, 90.6, 86.0, 90.5));

    let results = HammerDetector::with_defaults().detect(&bars, &ctx()).unwrap();
    let hammer = results.iter().find(|r| r.end_index == 5).expect("hammer on last bar");
    assert_eq!(hammer.kind, PatternKind::Hammer);
    assert_eq!(hammer.direction, Direction::Bullish);
    assert!(hammer.confidence <= 95.0);
}

// ============================================================
// CHART PATTERN TESTS
// ============================================================

#[test]
fn test_chart_detectors_accept_empty_input() {
    let bars: Vec<TestBar> = Vec::new();
    assert!(HeadAndShouldersDetector::with_defaults().detect(&bars, &ctx()).unwrap().is_empty());
    assert!(DoubleTopDetector::with_defaults().detect(&bars, &ctx()).unwrap().is_empty());
    assert!(DoubleBottomDetector::with_defaults().detect(&bars, &ctx()).unwrap().is_empty());
    assert!(TriangleDetector::with_defaults().detect(&bars, &ctx()).unwrap().is_empty());
    assert!(FlagDetector::with_defaults().detect(&bars, &ctx()).unwrap().is_empty());
}

#[test]
fn test_double_top() {
    let highs = [1.00, 1.02, 1.05, 1.10, 1.05, 1.02, 1.00, 1.02, 1.05, 1.10, 1.05, 1.02, 1.00];
    let bars = from_highs(&highs, 0.01);

    let results = DoubleTopDetector::with_defaults().detect(&bars, &ctx()).unwrap();
    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.kind, PatternKind::DoubleTop);
    assert_eq!((r.start_index, r.end_index), (3, 9));
    assert_eq!(r.confidence, 95.0);
    assert!((r.meta("valley").unwrap() - 0.99).abs() < 1e-9);
    assert!((r.meta("target").unwrap() - 0.88).abs() < 1e-9);

    assert!(DoubleBottomDetector::with_defaults().detect(&bars, &ctx()).unwrap().is_empty());
}

#[test]
fn test_head_and_shoulders() {
    let highs = [1.00, 1.05, 1.10, 1.05, 1.00, 1.08, 1.15, 1.08, 1.00, 1.05, 1.10, 1.05, 1.00];
    let bars = from_highs(&highs, 0.02);

    let results = HeadAndShouldersDetector::with_defaults().detect(&bars, &ctx()).unwrap();
    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.kind, PatternKind::HeadAndShoulders);
    assert_eq!(r.direction, Direction::Bearish);
    assert_eq!((r.start_index, r.end_index), (2, 10));
    assert!((r.meta("neckline").unwrap() - 0.98).abs() < 1e-9);
    assert!((r.meta("target").unwrap() - 0.81).abs() < 1e-9);
}

#[test]
fn test_inverse_head_and_shoulders() {
    let highs = [1.00, 1.05, 1.10, 1.05, 1.00, 1.08, 1.15, 1.08, 1.00, 1.05, 1.10, 1.05, 1.00];
    // mirror around 2.0 so the troughs become the pivots
    let mirrored: Vec<f64> = highs.iter().map(|h| 2.0 - h + 0.02).collect();
    let bars = from_highs(&mirrored, 0.02);

    let results = HeadAndShouldersDetector::with_defaults().detect(&bars, &ctx()).unwrap();
    let inverse: Vec<_> = results
        .iter()
        .filter(|r| r.kind == PatternKind::InverseHeadAndShoulders)
        .collect();
    assert_eq!(inverse.len(), 1);
    assert_eq!(inverse[0].direction, Direction::Bullish);
    assert!(inverse[0].meta("target").unwrap() > inverse[0].meta("neckline").unwrap());
}

#[test]
fn test_too_few_bars_is_empty_not_error() {
    let bars = from_highs(&[1.0, 1.1, 1.0, 1.1], 0.01);
    for detector in [
        BuiltinDetector::HeadAndShoulders(HeadAndShouldersDetector::default()),
        BuiltinDetector::DoubleTop(DoubleTopDetector::default()),
        BuiltinDetector::Triangle(TriangleDetector::default()),
        BuiltinDetector::Flag(FlagDetector::default()),
    ] {
        assert!(detector.detect(&bars, &ctx()).unwrap().is_empty(), "{}", detector.name());
    }
}

// ============================================================
// DETECTOR FAMILY
// ============================================================

#[test]
fn test_detectors_are_deterministic() {
    let highs = [1.00, 1.02, 1.05, 1.10, 1.05, 1.02, 1.00, 1.02, 1.05, 1.10, 1.05, 1.02, 1.00];
    let bars = from_highs(&highs, 0.01);
    let detector = BuiltinDetector::DoubleTop(DoubleTopDetector::default());

    let first = detector.detect(&bars, &ctx()).unwrap();
    let second = detector.detect(&bars, &ctx()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_with_params_validates_ranges() {
    let mut params = HashMap::new();
    params.insert("max_body_ratio", 0.05);
    let doji = DojiDetector::with_params(&params).unwrap();
    assert_eq!(doji.max_body_ratio.get(), 0.05);

    params.insert("max_body_ratio", 1.5);
    assert!(DojiDetector::with_params(&params).is_err());

    assert!(!DojiDetector::param_meta().is_empty());
    assert_eq!(DoubleTopDetector::pattern_id_str(), "DOUBLE_TOP");
}
