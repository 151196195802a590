//! Pipeline configuration
//!
//! One `Config` value is built at startup and handed to the engine, scanner,
//! signal generator and live detector. Every field has a default, so a JSON
//! document only needs the keys it overrides.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::timeframe::Timeframe;
use crate::{Error, Period, Ratio, Result};

/// Template Grid thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// TB magnitude (ho) separating a trend from no trend
    pub trend_threshold: f64,
    /// A predicate above this accuracy beats chance
    pub forecasting_threshold: f64,
    pub pip_size: f64,
    /// Current price must sit within APL +/- this fraction of APL
    pub price_band: Ratio,
    /// Minimum pip range for timeframes without their own minimum
    pub default_min_pips: f64,
    /// Library patterns need `prediction_accuracy` above this to load
    pub min_library_accuracy: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            trend_threshold: 10.0,
            forecasting_threshold: 50.0,
            pip_size: 0.0001,
            price_band: Ratio::new_const(0.02),
            default_min_pips: 10.0,
            min_library_accuracy: 60.0,
        }
    }
}

impl GridConfig {
    /// Minimum pip range for `timeframe`
    pub fn min_pips(&self, timeframe: Timeframe) -> f64 {
        timeframe.min_pips().unwrap_or(self.default_min_pips)
    }
}

/// Historical scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Fewer bars than this and a scan returns nothing
    pub min_bars: usize,
    /// Bars examined by a continuous scan
    pub lookback_bars: Period,
    /// `min_confidence` given to the builtin detectors
    pub detector_min_confidence: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_bars: 5,
            lookback_bars: Period::new_const(100),
            detector_min_confidence: 70.0,
        }
    }
}

/// Signal generation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Patterns below this confidence are not turned into signals
    pub min_pattern_confidence: f64,
    /// Signals below this adjusted confidence are dropped
    pub min_signal_confidence: f64,
    /// Bars used to classify the trend context
    pub trend_period: Period,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_pattern_confidence: 70.0,
            min_signal_confidence: 60.0,
            trend_period: Period::new_const(14),
        }
    }
}

/// Live detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Per-key buffer capacity
    pub max_buffer_size: Period,
    /// Buffered candles required before detection runs
    pub min_buffer_size: usize,
    /// Detect on every Nth candle overall
    pub detection_interval: Period,
    /// Most recent closes handed to the engine
    pub window_size: Period,
    /// Windows shorter than this are skipped
    pub min_window: usize,
    /// Library patterns need `prediction_accuracy` above this for live use
    pub min_template_accuracy: f64,
    /// Reported in detection stats
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: Period::new_const(1000),
            min_buffer_size: 50,
            detection_interval: Period::new_const(1),
            window_size: Period::new_const(50),
            min_window: 10,
            min_template_accuracy: 70.0,
            symbols: Vec::new(),
            timeframes: Vec::new(),
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridConfig,
    pub scanner: ScannerConfig,
    pub signals: SignalConfig,
    pub live: LiveConfig,
}

impl Config {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load overrides from `GRIDPAT_*` environment variables.
    ///
    /// Unset or unparsable values keep their defaults:
    /// - `GRIDPAT_TREND_THRESHOLD` (10.0)
    /// - `GRIDPAT_FORECASTING_THRESHOLD` (50.0)
    /// - `GRIDPAT_PIP_SIZE` (0.0001)
    /// - `GRIDPAT_PRICE_BAND` (0.02)
    /// - `GRIDPAT_DEFAULT_MIN_PIPS` (10.0)
    /// - `GRIDPAT_MIN_LIBRARY_ACCURACY` (60.0)
    /// - `GRIDPAT_SCANNER_MIN_BARS` (5)
    /// - `GRIDPAT_LOOKBACK_BARS` (100)
    /// - `GRIDPAT_DETECTOR_MIN_CONFIDENCE` (70.0)
    /// - `GRIDPAT_MIN_PATTERN_CONFIDENCE` (70.0)
    /// - `GRIDPAT_MIN_SIGNAL_CONFIDENCE` (60.0)
    /// - `GRIDPAT_TREND_PERIOD` (14)
    /// - `GRIDPAT_MAX_BUFFER_SIZE` (1000)
    /// - `GRIDPAT_MIN_BUFFER_SIZE` (50)
    /// - `GRIDPAT_DETECTION_INTERVAL` (1)
    /// - `GRIDPAT_WINDOW_SIZE` (50)
    /// - `GRIDPAT_MIN_WINDOW` (10)
    /// - `GRIDPAT_MIN_TEMPLATE_ACCURACY` (70.0)
    /// - `GRIDPAT_SYMBOLS` (comma separated)
    /// - `GRIDPAT_TIMEFRAMES` (comma separated codes)
    ///
    /// The merged result is validated like a JSON document.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Config::default();
        let num = |key: &str, default: f64| parse_or(&lookup, key, default);
        let count = |key: &str, default: usize| parse_or(&lookup, key, default);
        let period = |key: &str, default: Period| {
            lookup(key)
                .and_then(|s| s.trim().parse::<usize>().ok())
                .and_then(|v| Period::new(v).ok())
                .unwrap_or(default)
        };
        let list = |key: &str| -> Option<Vec<String>> {
            lookup(key).map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
        };

        let config = Self {
            grid: GridConfig {
                trend_threshold: num("GRIDPAT_TREND_THRESHOLD", d.grid.trend_threshold),
                forecasting_threshold: num("GRIDPAT_FORECASTING_THRESHOLD", d.grid.forecasting_threshold),
                pip_size: num("GRIDPAT_PIP_SIZE", d.grid.pip_size),
                price_band: lookup("GRIDPAT_PRICE_BAND")
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .and_then(|v| Ratio::new(v).ok())
                    .unwrap_or(d.grid.price_band),
                default_min_pips: num("GRIDPAT_DEFAULT_MIN_PIPS", d.grid.default_min_pips),
                min_library_accuracy: num("GRIDPAT_MIN_LIBRARY_ACCURACY", d.grid.min_library_accuracy),
            },
            scanner: ScannerConfig {
                min_bars: count("GRIDPAT_SCANNER_MIN_BARS", d.scanner.min_bars),
                lookback_bars: period("GRIDPAT_LOOKBACK_BARS", d.scanner.lookback_bars),
                detector_min_confidence: num(
                    "GRIDPAT_DETECTOR_MIN_CONFIDENCE",
                    d.scanner.detector_min_confidence,
                ),
            },
            signals: SignalConfig {
                min_pattern_confidence: num("GRIDPAT_MIN_PATTERN_CONFIDENCE", d.signals.min_pattern_confidence),
                min_signal_confidence: num("GRIDPAT_MIN_SIGNAL_CONFIDENCE", d.signals.min_signal_confidence),
                trend_period: period("GRIDPAT_TREND_PERIOD", d.signals.trend_period),
            },
            live: LiveConfig {
                max_buffer_size: period("GRIDPAT_MAX_BUFFER_SIZE", d.live.max_buffer_size),
                min_buffer_size: count("GRIDPAT_MIN_BUFFER_SIZE", d.live.min_buffer_size),
                detection_interval: period("GRIDPAT_DETECTION_INTERVAL", d.live.detection_interval),
                window_size: period("GRIDPAT_WINDOW_SIZE", d.live.window_size),
                min_window: count("GRIDPAT_MIN_WINDOW", d.live.min_window),
                min_template_accuracy: num("GRIDPAT_MIN_TEMPLATE_ACCURACY", d.live.min_template_accuracy),
                symbols: list("GRIDPAT_SYMBOLS").unwrap_or(d.live.symbols),
                timeframes: list("GRIDPAT_TIMEFRAMES")
                    .map(|codes| codes.iter().filter_map(|c| c.parse().ok()).collect())
                    .unwrap_or(d.live.timeframes),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot work together
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        let g = &self.grid;
        if !(g.trend_threshold >= 0.0) {
            return invalid("grid.trend_threshold must be >= 0");
        }
        if !(0.0..=100.0).contains(&g.forecasting_threshold) {
            return invalid("grid.forecasting_threshold must be within [0, 100]");
        }
        if !(g.pip_size > 0.0) {
            return invalid("grid.pip_size must be > 0");
        }
        if !(g.default_min_pips >= 0.0) {
            return invalid("grid.default_min_pips must be >= 0");
        }
        if !(0.0..=100.0).contains(&g.min_library_accuracy) {
            return invalid("grid.min_library_accuracy must be within [0, 100]");
        }

        if !(0.0..=100.0).contains(&self.scanner.detector_min_confidence) {
            return invalid("scanner.detector_min_confidence must be within [0, 100]");
        }

        let s = &self.signals;
        if !(0.0..=100.0).contains(&s.min_pattern_confidence)
            || !(0.0..=100.0).contains(&s.min_signal_confidence)
        {
            return invalid("signal confidences must be within [0, 100]");
        }

        let l = &self.live;
        if l.min_buffer_size > l.max_buffer_size.get() {
            return invalid("live.min_buffer_size exceeds live.max_buffer_size");
        }
        if l.window_size.get() > l.max_buffer_size.get() {
            return invalid("live.window_size exceeds live.max_buffer_size");
        }
        if l.min_window > l.window_size.get() {
            return invalid("live.min_window exceeds live.window_size");
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
