//! Historical pattern scanning
//!
//! The scanner fetches bars through the aggregator, runs every enabled
//! detector over them and resolves result indices to bar times. One failing
//! detector is logged and recorded; the others still run.
//!
//! # Example
//!
//! ```rust
//! use gridpat::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let scanner = ScannerBuilder::new(store.clone(), store)
//!     .with_candlestick_defaults()
//!     .with_chart_defaults()
//!     .build()
//!     .unwrap();
//! assert_eq!(scanner.detector_names().len(), 9);
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::aggregator::TimeframeAggregator;
use crate::bar::Bar;
use crate::config::ScannerConfig;
use crate::detectors::TemplateGridDetector;
use crate::grid::TemplateGridEngine;
use crate::store::{BarStore, PatternRecord, PatternSink, SignalRecord};
use crate::timeframe::Timeframe;
use crate::{
    BuiltinDetector, DetectContext, DetectorCategory, Direction, Error, PatternKind, PatternResult,
    Result,
};

// ============================================================
// RESULTS
// ============================================================

/// A detector result placed in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(flatten)]
    pub result: PatternResult,
}

impl DetectedPattern {
    #[inline]
    pub fn kind(&self) -> PatternKind {
        self.result.kind
    }

    #[inline]
    pub fn confidence(&self) -> f64 {
        self.result.confidence
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.result.direction
    }

    /// Storage shape; metadata becomes a JSON object
    pub fn to_record(&self) -> Result<PatternRecord> {
        let mut data = serde_json::Map::new();
        for (key, value) in &self.result.metadata {
            data.insert(key.clone(), serde_json::to_value(value)?);
        }
        if let Some(m) = &self.result.template_match {
            data.insert("template_grid_match".to_string(), serde_json::to_value(m)?);
        }
        Ok(PatternRecord {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            pattern_type: self.result.kind.to_string(),
            start_time: self.start_time,
            end_time: self.end_time,
            confidence: self.result.confidence,
            direction: self.result.direction,
            metadata: serde_json::Value::Object(data),
        })
    }
}

/// What happened to one detector during a scan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectorOutcome {
    Found { detector: &'static str, count: usize },
    Failed { detector: &'static str, error: String },
}

impl DetectorOutcome {
    pub fn detector(&self) -> &'static str {
        match self {
            DetectorOutcome::Found { detector, .. } | DetectorOutcome::Failed { detector, .. } => {
                detector
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DetectorOutcome::Failed { .. })
    }
}

/// One (symbol, timeframe, range) scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanUnit {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScanUnit {
    pub fn new(symbol: &str, timeframe: Timeframe, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { symbol: symbol.to_string(), timeframe, start, end }
    }
}

/// Result of scanning a single unit
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bars_scanned: usize,
    pub patterns: Vec<DetectedPattern>,
    pub outcomes: Vec<DetectorOutcome>,
    /// Rows written by `scan_and_save`; zero for read-only scans
    pub saved: usize,
}

impl ScanResult {
    fn empty(symbol: &str, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            bars_scanned: 0,
            patterns: Vec::new(),
            outcomes: Vec::new(),
            saved: 0,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &DetectorOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }
}

/// Error from scanning a single unit
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub error: Error,
}

// ============================================================
// SCANNER
// ============================================================

/// Runs the detector family over stored bars
pub struct PatternScanner {
    aggregator: TimeframeAggregator,
    sink: Arc<dyn PatternSink>,
    detectors: Vec<BuiltinDetector>,
    config: ScannerConfig,
}

impl PatternScanner {
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn sink(&self) -> &Arc<dyn PatternSink> {
        &self.sink
    }

    pub fn aggregator(&self) -> &TimeframeAggregator {
        &self.aggregator
    }

    /// Enabled detector names in run order
    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(BuiltinDetector::name).collect()
    }

    /// Enabled detector names grouped by family
    pub fn pattern_types(&self) -> BTreeMap<&'static str, Vec<&'static str>> {
        let mut catalogue: BTreeMap<&'static str, Vec<&'static str>> = BTreeMap::new();
        for d in &self.detectors {
            let family = match d.category() {
                DetectorCategory::Candlestick => "candlestick",
                DetectorCategory::Chart => "chart",
                DetectorCategory::TemplateGrid => "template_grid",
            };
            catalogue.entry(family).or_default().push(d.name());
        }
        catalogue
    }

    pub fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        self.aggregator.bars(symbol, timeframe, start, end, None)
    }

    /// Run every enabled detector over `bars`
    pub fn scan_bars(&self, symbol: &str, timeframe: Timeframe, bars: &[Bar]) -> Vec<DetectedPattern> {
        self.run(symbol, timeframe, bars, None).patterns
    }

    /// Fetch `[start, end]` and scan it.
    ///
    /// `pattern_types` restricts the run to detectors with those names,
    /// compared case-insensitively.
    pub fn scan(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        pattern_types: Option<&[&str]>,
    ) -> Result<Vec<DetectedPattern>> {
        Ok(self.scan_detailed(symbol, timeframe, start, end, pattern_types)?.patterns)
    }

    /// As [`scan`](Self::scan), keeping per-detector outcomes
    pub fn scan_detailed(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        pattern_types: Option<&[&str]>,
    ) -> Result<ScanResult> {
        info!(symbol, %timeframe, %start, %end, "Scanning for patterns");
        let bars = self.fetch_bars(symbol, timeframe, start, end)?;
        Ok(self.run(symbol, timeframe, &bars, pattern_types))
    }

    /// Scan, then persist every pattern found in one write
    pub fn scan_and_save(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        pattern_types: Option<&[&str]>,
    ) -> Result<ScanResult> {
        let mut result = self.scan_detailed(symbol, timeframe, start, end, pattern_types)?;
        result.saved = self.save_patterns(&result.patterns)?;
        Ok(result)
    }

    /// Persist patterns in one sink call. Nothing is written for an empty slice.
    pub fn save_patterns(&self, patterns: &[DetectedPattern]) -> Result<usize> {
        if patterns.is_empty() {
            return Ok(0);
        }
        let records = patterns
            .iter()
            .map(DetectedPattern::to_record)
            .collect::<Result<Vec<_>>>()?;
        let saved = self.sink.save_patterns(&records)?;
        info!(saved, "Patterns saved");
        Ok(saved)
    }

    /// Persist one unit's patterns and their signals in one sink call
    pub fn save_scan(&self, patterns: &[DetectedPattern], signals: &[SignalRecord]) -> Result<usize> {
        if patterns.is_empty() && signals.is_empty() {
            return Ok(0);
        }
        let records = patterns
            .iter()
            .map(DetectedPattern::to_record)
            .collect::<Result<Vec<_>>>()?;
        let saved = self.sink.save_scan(&records, signals)?;
        info!(saved, "Scan saved");
        Ok(saved)
    }

    /// Scan and save the most recent `lookback_bars` bars
    pub fn continuous_scan(&self, symbol: &str, timeframe: Timeframe) -> Result<ScanResult> {
        let Some(latest) = self.aggregator.latest_bar(symbol, timeframe)? else {
            warn!(symbol, %timeframe, "No data available for continuous scan");
            return Ok(ScanResult::empty(symbol, timeframe));
        };
        let lookback = i32::try_from(self.config.lookback_bars.get()).unwrap_or(i32::MAX);
        let end = latest.time;
        let start = end - timeframe.nominal_duration() * lookback;

        let result = self.scan_and_save(symbol, timeframe, start, end, None)?;
        info!(symbol, %timeframe, patterns = result.patterns.len(), "Continuous scan completed");
        Ok(result)
    }

    /// Scan and save many units in parallel.
    ///
    /// `cancel` is checked before each unit starts; units skipped after it
    /// is raised report [`Error::Cancelled`]. A unit that started always
    /// finishes its write.
    pub fn scan_many(&self, units: &[ScanUnit], cancel: &AtomicBool) -> (Vec<ScanResult>, Vec<ScanError>) {
        let outcomes: Vec<_> = units
            .par_iter()
            .map(|unit| {
                let scanned = if cancel.load(Ordering::Relaxed) {
                    Err(Error::Cancelled)
                } else {
                    self.scan_and_save(&unit.symbol, unit.timeframe, unit.start, unit.end, None)
                };
                scanned.map_err(|error| ScanError {
                    symbol: unit.symbol.clone(),
                    timeframe: unit.timeframe,
                    error,
                })
            })
            .collect();

        let mut successes = Vec::new();
        let mut errors = Vec::new();

        for outcome in outcomes {
            match outcome {
                Ok(r) => successes.push(r),
                Err(e) => errors.push(e),
            }
        }

        info!(units = units.len(), succeeded = successes.len(), failed = errors.len(), "Multi-unit scan done");
        (successes, errors)
    }

    fn run(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: &[Bar],
        pattern_types: Option<&[&str]>,
    ) -> ScanResult {
        let mut result = ScanResult::empty(symbol, timeframe);
        result.bars_scanned = bars.len();
        if bars.len() < self.config.min_bars {
            warn!(symbol, %timeframe, bars = bars.len(), need = self.config.min_bars, "Not enough bars for pattern detection");
            return result;
        }

        let ctx = DetectContext::new(symbol, timeframe);
        let selected = self.detectors.iter().filter(|d| {
            pattern_types.map_or(true, |names| names.iter().any(|n| n.eq_ignore_ascii_case(d.name())))
        });

        for detector in selected {
            let name = detector.name();
            match detector.detect(bars, &ctx) {
                Ok(found) => {
                    debug!(detector = name, count = found.len(), "Detector finished");
                    result.outcomes.push(DetectorOutcome::Found { detector: name, count: found.len() });
                    result
                        .patterns
                        .extend(found.into_iter().filter_map(|r| place(symbol, timeframe, bars, r)));
                },
                Err(e) => {
                    error!(detector = name, symbol, %timeframe, error = %e, "Detector failed");
                    result.outcomes.push(DetectorOutcome::Failed { detector: name, error: e.to_string() });
                },
            }
        }

        info!(symbol, %timeframe, bars = bars.len(), patterns = result.patterns.len(), "Scan complete");
        result
    }
}

fn place(symbol: &str, timeframe: Timeframe, bars: &[Bar], result: PatternResult) -> Option<DetectedPattern> {
    let (Some(start), Some(end)) = (bars.get(result.start_index), bars.get(result.end_index)) else {
        warn!(kind = %result.kind, start = result.start_index, end = result.end_index, "Result indices outside scanned bars");
        return None;
    };
    Some(DetectedPattern {
        symbol: symbol.to_string(),
        timeframe,
        start_time: start.time,
        end_time: end.time,
        result,
    })
}

// ============================================================
// BUILDER
// ============================================================

/// Generate an array of `BuiltinDetector` variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
  ($($variant:ident),* $(,)?) => {
    [$(BuiltinDetector::$variant(Default::default())),*]
  };
}

/// Builder for creating PatternScanner instances
pub struct ScannerBuilder {
    bar_store: Arc<dyn BarStore>,
    sink: Arc<dyn PatternSink>,
    detectors: Vec<BuiltinDetector>,
    config: ScannerConfig,
}

impl ScannerBuilder {
    pub fn new(bar_store: Arc<dyn BarStore>, sink: Arc<dyn PatternSink>) -> Self {
        Self {
            bar_store,
            sink,
            detectors: Vec::new(),
            config: ScannerConfig::default(),
        }
    }

    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Every candlestick and chart detector plus the Template Grid adapter
    pub fn with_all_defaults(self, engine: Arc<TemplateGridEngine>) -> Self {
        self.with_candlestick_defaults().with_chart_defaults().with_template_grid(engine)
    }

    /// Doji, Hammer, Shooting Star, Engulfing
    pub fn with_candlestick_defaults(mut self) -> Self {
        self.detectors.extend(builtin_defaults![Doji, Hammer, ShootingStar, Engulfing]);
        self
    }

    /// Head and Shoulders, Double Top, Double Bottom, Triangle, Flag
    pub fn with_chart_defaults(mut self) -> Self {
        self.detectors
            .extend(builtin_defaults![HeadAndShoulders, DoubleTop, DoubleBottom, Triangle, Flag]);
        self
    }

    pub fn with_template_grid(mut self, engine: Arc<TemplateGridEngine>) -> Self {
        self.detectors
            .push(BuiltinDetector::TemplateGrid(TemplateGridDetector::with_engine(engine)));
        self
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.detectors.push(detector);
        Ok(self)
    }

    /// Build the scanner. Detectors report the configured confidence floor.
    pub fn build(self) -> Result<PatternScanner> {
        let mut detectors = self.detectors;
        for d in &mut detectors {
            d.validate_config()?;
            d.set_min_confidence(self.config.detector_min_confidence);
        }
        Ok(PatternScanner {
            aggregator: TimeframeAggregator::new(self.bar_store),
            sink: self.sink,
            detectors,
            config: self.config,
        })
    }
}
