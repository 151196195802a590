//! # gridpat - pattern detection and signal generation for OHLCV data
//!
//! Rolls ticks and bars up into a timeframe cascade, runs a family of
//! candlestick and chart-pattern detectors plus the Template Grid similarity
//! matcher over them, and turns what it finds into BUY/SELL signals.
//!
//! ## Quick Start
//!
//! ```rust
//! use gridpat::prelude::*;
//! use std::sync::Arc;
//!
//! // Collaborators (bars, template library, pattern/signal persistence)
//! let store = Arc::new(MemoryStore::new());
//!
//! // Template Grid engine shared by the scanner and the live detector
//! let engine = Arc::new(TemplateGridEngine::new(GridConfig::default()));
//!
//! // Scanner with every builtin detector
//! let scanner = ScannerBuilder::new(store.clone(), store.clone())
//!     .with_all_defaults(engine)
//!     .build()
//!     .unwrap();
//!
//! let bars: Vec<Bar> = vec![];
//! let patterns = scanner.scan_bars("EURUSD", Timeframe::H1, &bars);
//! assert!(patterns.is_empty());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod aggregator;
pub mod bar;
pub mod config;
pub mod detectors;
pub mod grid;
pub mod live;
pub mod logging;
pub mod params;
pub mod scanner;
pub mod signals;
pub mod store;
pub mod timeframe;

pub mod prelude {
    pub use crate::{
        // Aggregation
        aggregator::TimeframeAggregator,
        bar::{Bar, Tick},
        // Configuration
        config::{Config, GridConfig, LiveConfig, ScannerConfig, SignalConfig},
        // Detectors
        detectors::*,
        // Template Grid
        grid::{
            LibraryStats, PatternMatch, Prediction, TemplateGridEngine, TemplateGridPattern,
            TrendClass,
        },
        // Live detection
        live::{Alert, CandleReport, DataBuffer, DetectionStats, LiveCandle, LivePatternDetector, LiveState},
        // Parameters
        params::{get_factor, get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
        // Scanning
        scanner::{
            DetectedPattern, DetectorOutcome, PatternScanner, ScanError, ScanResult,
            ScannerBuilder, ScanUnit,
        },
        // Signals
        signals::{Signal, SignalContext, SignalGenerator, SignalReport, SignalType},
        // Storage collaborators
        store::{BarStore, MemoryStore, PatternRecord, PatternSink, SignalRecord, TemplateRecord, TemplateStore},
        timeframe::Timeframe,
        // Core
        BuiltinDetector,
        DetectContext,
        DetectorCategory,
        Direction,
        Error,
        OHLCVExt,
        PatternDetector,
        PatternKind,
        PatternResult,
        Period,
        Ratio,
        Result,
        Trend,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised across aggregation, detection and live processing
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unsupported timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Price window length {got} doesn't match grid width {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Malformed library pattern {id}: {reason}")]
    MalformedLibraryEntry { id: i64, reason: String },

    #[error("Insufficient data: need {need}, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cannot {operation} while live detector is {state}")]
    InvalidState {
        state: &'static str,
        operation: &'static str,
    },

    #[error("Scan cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(Error::InvalidValue("Ratio cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(Error::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Count or length that must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(Error::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    /// Bar open time in Unix milliseconds, when known
    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Body as ratio of range. Returns None if range is zero
    #[inline]
    fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > 0.0).then(|| self.body() / range)
    }

    /// Validate OHLCV data consistency (`low <= {open, close} <= high`, finite values)
    fn validate(&self) -> Result<()> {
        let values = [self.open(), self.high(), self.low(), self.close()];
        if values.iter().any(|v| v.is_nan()) {
            return Err(Error::InvalidValue("NaN in OHLCV"));
        }
        if values.iter().any(|v| v.is_infinite()) {
            return Err(Error::InvalidValue("Infinite value in OHLCV"));
        }
        if self.high() < self.low() {
            return Err(Error::InvalidValue("high < low"));
        }
        let (lo, hi) = (self.open().min(self.close()), self.open().max(self.close()));
        if lo < self.low() || hi > self.high() {
            return Err(Error::InvalidValue("open/close outside high-low range"));
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// DIRECTION / TREND
// ============================================================

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Bullish => "BULLISH",
            Direction::Neutral => "NEUTRAL",
            Direction::Bearish => "BEARISH",
        }
    }
}

/// Market trend classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Trend {
    StrongUp,
    WeakUp,
    #[default]
    Sideways,
    WeakDown,
    StrongDown,
}

impl Trend {
    #[inline]
    pub fn is_down(self) -> bool {
        matches!(self, Trend::WeakDown | Trend::StrongDown)
    }

    #[inline]
    pub fn is_up(self) -> bool {
        matches!(self, Trend::WeakUp | Trend::StrongUp)
    }

    /// Classify the close-to-close change over `period` bars ending at `index`.
    ///
    /// Returns `Sideways` when fewer than `period` bars precede `index`.
    pub fn classify<T: OHLCV>(bars: &[T], index: usize, period: usize) -> Trend {
        if index < period || index >= bars.len() {
            return Trend::Sideways;
        }

        let first_close = bars[index - period].close();
        let last_close = bars[index].close();

        if first_close <= f64::EPSILON {
            return Trend::Sideways;
        }

        let change = (last_close - first_close) / first_close;

        match change {
            c if c > 0.05 => Trend::StrongUp,
            c if c > 0.02 => Trend::WeakUp,
            c if c < -0.05 => Trend::StrongDown,
            c if c < -0.02 => Trend::WeakDown,
            _ => Trend::Sideways,
        }
    }
}

// ============================================================
// PATTERN RESULT
// ============================================================

/// Every shape the detector family can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PatternKind {
    Doji,
    Hammer,
    ShootingStar,
    BullishEngulfing,
    BearishEngulfing,
    HeadAndShoulders,
    InverseHeadAndShoulders,
    DoubleTop,
    DoubleBottom,
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
    BullFlag,
    BearFlag,
    /// Library pattern id of a Template Grid match
    TemplateGrid(i64),
}

const TEMPLATE_GRID_PREFIX: &str = "TEMPLATE_GRID_";

impl PatternKind {
    /// Returns the typical/expected direction of this pattern.
    ///
    /// Template Grid matches carry their direction in the prediction, so
    /// they return `None`.
    pub fn typical_direction(&self) -> Option<Direction> {
        match self {
            PatternKind::Hammer
            | PatternKind::BullishEngulfing
            | PatternKind::InverseHeadAndShoulders
            | PatternKind::DoubleBottom
            | PatternKind::AscendingTriangle
            | PatternKind::BullFlag => Some(Direction::Bullish),
            PatternKind::ShootingStar
            | PatternKind::BearishEngulfing
            | PatternKind::HeadAndShoulders
            | PatternKind::DoubleTop
            | PatternKind::DescendingTriangle
            | PatternKind::BearFlag => Some(Direction::Bearish),
            PatternKind::Doji | PatternKind::SymmetricalTriangle => Some(Direction::Neutral),
            PatternKind::TemplateGrid(_) => None,
        }
    }

    #[inline]
    pub fn is_template_grid(&self) -> bool {
        matches!(self, PatternKind::TemplateGrid(_))
    }

    fn static_name(&self) -> Option<&'static str> {
        Some(match self {
            PatternKind::Doji => "DOJI",
            PatternKind::Hammer => "HAMMER",
            PatternKind::ShootingStar => "SHOOTING_STAR",
            PatternKind::BullishEngulfing => "BULLISH_ENGULFING",
            PatternKind::BearishEngulfing => "BEARISH_ENGULFING",
            PatternKind::HeadAndShoulders => "HEAD_AND_SHOULDERS",
            PatternKind::InverseHeadAndShoulders => "INVERSE_HEAD_AND_SHOULDERS",
            PatternKind::DoubleTop => "DOUBLE_TOP",
            PatternKind::DoubleBottom => "DOUBLE_BOTTOM",
            PatternKind::AscendingTriangle => "ASCENDING_TRIANGLE",
            PatternKind::DescendingTriangle => "DESCENDING_TRIANGLE",
            PatternKind::SymmetricalTriangle => "SYMMETRICAL_TRIANGLE",
            PatternKind::BullFlag => "BULL_FLAG",
            PatternKind::BearFlag => "BEAR_FLAG",
            PatternKind::TemplateGrid(_) => return None,
        })
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.static_name()) {
            (_, Some(name)) => f.write_str(name),
            (PatternKind::TemplateGrid(id), None) => write!(f, "{TEMPLATE_GRID_PREFIX}{id}"),
            _ => unreachable!("only template grid kinds lack a static name"),
        }
    }
}

impl FromStr for PatternKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(id) = s.strip_prefix(TEMPLATE_GRID_PREFIX) {
            return id
                .parse()
                .map(PatternKind::TemplateGrid)
                .map_err(|_| Error::InvalidValue("template grid pattern id must be an integer"));
        }
        Ok(match s {
            "DOJI" => PatternKind::Doji,
            "HAMMER" => PatternKind::Hammer,
            "SHOOTING_STAR" => PatternKind::ShootingStar,
            "BULLISH_ENGULFING" => PatternKind::BullishEngulfing,
            "BEARISH_ENGULFING" => PatternKind::BearishEngulfing,
            "HEAD_AND_SHOULDERS" => PatternKind::HeadAndShoulders,
            "INVERSE_HEAD_AND_SHOULDERS" => PatternKind::InverseHeadAndShoulders,
            "DOUBLE_TOP" => PatternKind::DoubleTop,
            "DOUBLE_BOTTOM" => PatternKind::DoubleBottom,
            "ASCENDING_TRIANGLE" => PatternKind::AscendingTriangle,
            "DESCENDING_TRIANGLE" => PatternKind::DescendingTriangle,
            "SYMMETRICAL_TRIANGLE" => PatternKind::SymmetricalTriangle,
            "BULL_FLAG" => PatternKind::BullFlag,
            "BEAR_FLAG" => PatternKind::BearFlag,
            _ => return Err(Error::InvalidValue("unknown pattern kind")),
        })
    }
}

impl From<PatternKind> for String {
    fn from(kind: PatternKind) -> Self {
        kind.to_string()
    }
}

impl TryFrom<String> for PatternKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Result of pattern detection over a finite bar sequence.
///
/// Indices are 0-based positions in the sequence handed to the detector;
/// the scanner resolves them to timestamps.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternResult {
    pub kind: PatternKind,
    pub start_index: usize,
    pub end_index: usize,
    /// Confidence score 0.0..=100.0
    pub confidence: f64,
    pub direction: Direction,
    /// Named measurements (prices, ratios, targets)
    pub metadata: BTreeMap<String, f64>,
    /// Full match record for Template Grid results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_match: Option<Box<grid::PatternMatch>>,
}

impl PatternResult {
    pub fn new(
        kind: PatternKind,
        start_index: usize,
        end_index: usize,
        confidence: f64,
        direction: Direction,
    ) -> Self {
        Self {
            kind,
            start_index,
            end_index,
            confidence,
            direction,
            metadata: BTreeMap::new(),
            template_match: None,
        }
    }

    /// Attach a named measurement
    pub fn with_meta(mut self, key: &str, value: f64) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    #[inline]
    pub fn meta(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).copied()
    }
}

// ============================================================
// PATTERN DETECTOR TRAIT
// ============================================================

/// Which family a detector belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorCategory {
    Candlestick,
    Chart,
    TemplateGrid,
}

/// Where the bars handed to a detector came from
#[derive(Debug, Clone, Copy)]
pub struct DetectContext<'a> {
    pub symbol: &'a str,
    pub timeframe: timeframe::Timeframe,
}

impl<'a> DetectContext<'a> {
    pub fn new(symbol: &'a str, timeframe: timeframe::Timeframe) -> Self {
        Self { symbol, timeframe }
    }
}

/// Pattern detector over a whole bar sequence.
///
/// Implementations are pure: identical input gives identical output and no
/// state survives between calls. `min_confidence` is reported for callers
/// that want to filter; detectors never filter by it themselves.
pub trait PatternDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn category(&self) -> DetectorCategory;
    fn min_bars(&self) -> usize;
    fn min_confidence(&self) -> f64;
    fn detect<T: OHLCV>(&self, bars: &[T], ctx: &DetectContext<'_>) -> Result<Vec<PatternResult>>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - enum dispatch, no vtable
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: OHLCV>(
                &self,
                bars: &[T],
                ctx: &DetectContext<'_>,
            ) -> Result<Vec<PatternResult>> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, bars, ctx)),*
                }
            }

            #[inline]
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(d) => PatternDetector::name(d)),*
                }
            }

            #[inline]
            pub fn category(&self) -> DetectorCategory {
                match self {
                    $(Self::$variant(d) => PatternDetector::category(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            #[inline]
            pub fn min_confidence(&self) -> f64 {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_confidence(d)),*
                }
            }

            /// Override the confidence floor reported to callers
            pub fn set_min_confidence(&mut self, value: f64) {
                match self {
                    $(Self::$variant(d) => d.min_confidence = value),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    // Candlestick (4)
    Doji(DojiDetector),
    Hammer(HammerDetector),
    ShootingStar(ShootingStarDetector),
    Engulfing(EngulfingDetector),

    // Chart patterns (5)
    HeadAndShoulders(HeadAndShouldersDetector),
    DoubleTop(DoubleTopDetector),
    DoubleBottom(DoubleBottomDetector),
    Triangle(TriangleDetector),
    Flag(FlagDetector),

    // Template Grid
    TemplateGrid(TemplateGridDetector),
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Bar {
        o: f64,
        h: f64,
        l: f64,
        c: f64,
    }

    impl OHLCV for Bar {
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
            1000.0
        }
    }

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar { o, h, l, c }
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(0).is_err());
        let p: std::result::Result<Period, _> = serde_json::from_str("0");
        assert!(p.is_err());
    }

    #[test]
    fn test_ohlcv_ext() {
        let b = bar(100.0, 110.0, 90.0, 105.0);
        assert_eq!(b.body(), 5.0);
        assert_eq!(b.range(), 20.0);
        assert_eq!(b.upper_shadow(), 5.0);
        assert_eq!(b.lower_shadow(), 10.0);
        assert!(b.is_bullish());
        assert!((b.body_ratio().unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_close_above_high() {
        assert!(bar(100.0, 110.0, 90.0, 105.0).validate().is_ok());
        assert!(bar(100.0, 110.0, 90.0, 111.0).validate().is_err());
        assert!(bar(100.0, 90.0, 110.0, 100.0).validate().is_err());
    }

    #[test]
    fn test_trend_classify() {
        let up: Vec<Bar> = (0..20)
            .map(|i| {
                let c = 100.0 + i as f64;
                bar(c, c + 1.0, c - 1.0, c)
            })
            .collect();
        assert_eq!(Trend::classify(&up, 19, 14), Trend::StrongUp);
        assert_eq!(Trend::classify(&up, 5, 14), Trend::Sideways);
        assert!(Trend::classify(&up, 19, 14).is_up());
    }

    #[test]
    fn test_pattern_kind_names_round_trip() {
        for kind in [
            PatternKind::Doji,
            PatternKind::InverseHeadAndShoulders,
            PatternKind::BearFlag,
            PatternKind::TemplateGrid(1001),
        ] {
            let parsed: PatternKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert_eq!(PatternKind::TemplateGrid(7).to_string(), "TEMPLATE_GRID_7");
        assert!("NOT_A_PATTERN".parse::<PatternKind>().is_err());
    }

    #[test]
    fn test_pattern_kind_serializes_as_name() {
        let json = serde_json::to_string(&PatternKind::DoubleTop).unwrap();
        assert_eq!(json, "\"DOUBLE_TOP\"");
    }

    #[test]
    fn test_typical_direction() {
        assert_eq!(PatternKind::Hammer.typical_direction(), Some(Direction::Bullish));
        assert_eq!(PatternKind::DoubleTop.typical_direction(), Some(Direction::Bearish));
        assert_eq!(PatternKind::Doji.typical_direction(), Some(Direction::Neutral));
        assert_eq!(PatternKind::TemplateGrid(1).typical_direction(), None);
    }
}
