//! Live Template Grid detection
//!
//! Candles arrive one at a time, are buffered per (symbol, timeframe) and
//! periodically matched against the loaded library. Matches are persisted as
//! signals and fanned out to registered callbacks.
//!
//! ```text
//! Uninitialized --initialize--> Initialized --first candle--> Running --shutdown--> Stopped
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::aggregator::TimeframeAggregator;
use crate::bar::Bar;
use crate::config::LiveConfig;
use crate::grid::{PatternMatch, Prediction, TemplateGridEngine};
use crate::signals::SignalType;
use crate::store::{PatternSink, SignalRecord, TemplateStore};
use crate::timeframe::Timeframe;
use crate::{Error, PatternKind, Period, Result, OHLCV};

// ============================================================
// CANDLES AND BUFFERS
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveCandle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl LiveCandle {
    pub fn from_bar(symbol: &str, timeframe: Timeframe, bar: &Bar) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            time: bar.time,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

impl OHLCV for LiveCandle {
    fn open(&self) -> f64 {
        self.open
    }
    fn high(&self) -> f64 {
        self.high
    }
    fn low(&self) -> f64 {
        self.low
    }
    fn close(&self) -> f64 {
        self.close
    }
    fn volume(&self) -> f64 {
        self.volume
    }
    fn timestamp(&self) -> Option<i64> {
        Some(self.time.timestamp_millis())
    }
}

type BufferKey = (String, Timeframe);

/// Rolling per-(symbol, timeframe) candle buffers, oldest evicted first
#[derive(Debug, Clone)]
pub struct DataBuffer {
    max_size: usize,
    buffers: HashMap<BufferKey, VecDeque<LiveCandle>>,
}

impl DataBuffer {
    pub fn new(max_size: Period) -> Self {
        Self {
            max_size: max_size.get(),
            buffers: HashMap::new(),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Append `candle`, returning the key's new size
    pub fn add_candle(&mut self, candle: LiveCandle) -> usize {
        let max_size = self.max_size;
        let buffer = self
            .buffers
            .entry((candle.symbol.clone(), candle.timeframe))
            .or_default();
        buffer.push_back(candle);
        while buffer.len() > max_size {
            buffer.pop_front();
        }
        buffer.len()
    }

    /// Up to `window_size` most recent closes, oldest first
    pub fn price_window(&self, symbol: &str, timeframe: Timeframe, window_size: usize) -> Vec<f64> {
        self.buffers
            .get(&(symbol.to_string(), timeframe))
            .map(|buffer| {
                let skip = buffer.len().saturating_sub(window_size);
                buffer.iter().skip(skip).map(|c| c.close).collect()
            })
            .unwrap_or_default()
    }

    pub fn candles(&self, symbol: &str, timeframe: Timeframe) -> Vec<LiveCandle> {
        self.buffers
            .get(&(symbol.to_string(), timeframe))
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn buffer_size(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.buffers
            .get(&(symbol.to_string(), timeframe))
            .map_or(0, VecDeque::len)
    }
}

// ============================================================
// STATE AND STATS
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

impl LiveState {
    pub fn as_str(self) -> &'static str {
        match self {
            LiveState::Uninitialized => "uninitialized",
            LiveState::Initialized => "initialized",
            LiveState::Running => "running",
            LiveState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionStats {
    pub state: LiveState,
    pub total_patterns_loaded: usize,
    pub candles_processed: u64,
    pub patterns_detected: u64,
    pub callback_failures: u64,
    pub symbols_monitored: usize,
    pub timeframes_monitored: usize,
    /// `"<symbol>_<timeframe>"` for every configured pair
    pub buffer_sizes: BTreeMap<String, usize>,
}

/// A callback that returned an error or panicked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackFailure {
    /// Registration order
    pub callback: usize,
    pub pattern_id: i64,
    pub reason: String,
}

/// What a single candle produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleReport {
    /// False when the interval or buffer thresholds skipped detection
    pub detection_ran: bool,
    pub matches: Vec<PatternMatch>,
    pub callback_failures: Vec<CallbackFailure>,
}

pub type PatternCallback = Arc<dyn Fn(&PatternMatch) -> Result<()> + Send + Sync>;

// ============================================================
// DETECTOR
// ============================================================

/// Streams candles through a [`TemplateGridEngine`].
///
/// Candles for one (symbol, timeframe) must be fed in arrival order.
/// Different keys may be fed from different threads.
pub struct LivePatternDetector {
    config: LiveConfig,
    engine: Arc<TemplateGridEngine>,
    templates: Arc<dyn TemplateStore>,
    sink: Arc<dyn PatternSink>,
    state: Mutex<LiveState>,
    buffer: Mutex<DataBuffer>,
    callbacks: RwLock<Vec<PatternCallback>>,
    patterns_loaded: Mutex<usize>,
    candle_count: AtomicU64,
    patterns_detected: AtomicU64,
    callback_failures: AtomicU64,
}

impl fmt::Debug for LivePatternDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LivePatternDetector")
            .field("state", &*self.state.lock())
            .field("config", &self.config)
            .field("callbacks", &self.callbacks.read().len())
            .finish_non_exhaustive()
    }
}

impl LivePatternDetector {
    pub fn new(
        config: LiveConfig,
        engine: Arc<TemplateGridEngine>,
        templates: Arc<dyn TemplateStore>,
        sink: Arc<dyn PatternSink>,
    ) -> Self {
        let buffer = DataBuffer::new(config.max_buffer_size);
        Self {
            config,
            engine,
            templates,
            sink,
            state: Mutex::new(LiveState::Uninitialized),
            buffer: Mutex::new(buffer),
            callbacks: RwLock::new(Vec::new()),
            patterns_loaded: Mutex::new(0),
            candle_count: AtomicU64::new(0),
            patterns_detected: AtomicU64::new(0),
            callback_failures: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<TemplateGridEngine> {
        &self.engine
    }

    pub fn state(&self) -> LiveState {
        *self.state.lock()
    }

    /// Load the high-accuracy library. Calling it again reloads.
    pub fn initialize(&self) -> Result<usize> {
        let mut state = self.state.lock();
        if *state == LiveState::Stopped {
            return Err(Error::InvalidState { state: state.as_str(), operation: "initialize" });
        }

        let loaded = self
            .engine
            .reload_above(self.templates.as_ref(), self.config.min_template_accuracy)?;
        *self.patterns_loaded.lock() = loaded;
        if *state == LiveState::Uninitialized {
            *state = LiveState::Initialized;
        }
        info!(
            patterns = loaded,
            symbols = self.config.symbols.len(),
            timeframes = self.config.timeframes.len(),
            state = %*state,
            "Live detector initialized"
        );
        Ok(loaded)
    }

    pub fn add_pattern_callback<F>(&self, callback: F)
    where
        F: Fn(&PatternMatch) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.write().push(Arc::new(callback));
    }

    /// Buffer `candle` and run detection when due
    pub fn on_new_candle(&self, candle: LiveCandle) -> Result<CandleReport> {
        {
            let mut state = self.state.lock();
            match *state {
                LiveState::Uninitialized | LiveState::Stopped => {
                    return Err(Error::InvalidState { state: state.as_str(), operation: "process candles" });
                },
                LiveState::Initialized => {
                    *state = LiveState::Running;
                    info!(state = %*state, "Live detector running");
                },
                LiveState::Running => {},
            }
        }

        let (buffered, window) = {
            let mut buffer = self.buffer.lock();
            let buffered = buffer.add_candle(candle.clone());
            let window = buffer.price_window(&candle.symbol, candle.timeframe, self.config.window_size.get());
            (buffered, window)
        };
        let count = self.candle_count.fetch_add(1, Ordering::Relaxed) + 1;

        if count % self.config.detection_interval.get() as u64 != 0 {
            return Ok(CandleReport::default());
        }
        if buffered < self.config.min_buffer_size {
            debug!(symbol = %candle.symbol, timeframe = %candle.timeframe, buffered, "Not enough data");
            return Ok(CandleReport::default());
        }
        if window.len() < self.config.min_window {
            return Ok(CandleReport::default());
        }

        let matches = self.engine.detect_patterns_at(
            &window,
            &candle.symbol,
            candle.timeframe,
            candle.close,
            candle.time,
        );

        let mut report = CandleReport { detection_ran: true, ..CandleReport::default() };
        for m in &matches {
            self.patterns_detected.fetch_add(1, Ordering::Relaxed);

            if let Err(e) = self.sink.save_signal(&match_record(m, candle.time)) {
                error!(pattern_id = m.pattern_id, error = %e, "Failed to save pattern match");
            }
            report.callback_failures.extend(self.run_callbacks(m));

            info!(
                symbol = %m.symbol,
                timeframe = %m.timeframe,
                pattern_id = m.pattern_id,
                prediction = %m.prediction,
                confidence = m.confidence,
                similarity = m.similarity,
                "Pattern detected"
            );
        }
        report.matches = matches;
        Ok(report)
    }

    fn run_callbacks(&self, m: &PatternMatch) -> Vec<CallbackFailure> {
        // snapshot so callbacks may register further callbacks
        let callbacks: Vec<PatternCallback> = self.callbacks.read().clone();
        let mut failures = Vec::new();

        for (index, callback) in callbacks.iter().enumerate() {
            let reason = match catch_unwind(AssertUnwindSafe(|| callback(m))) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            self.callback_failures.fetch_add(1, Ordering::Relaxed);
            error!(callback = index, pattern_id = m.pattern_id, reason = %reason, "Pattern callback failed");
            failures.push(CallbackFailure { callback: index, pattern_id: m.pattern_id, reason });
        }
        failures
    }

    pub fn get_detection_stats(&self) -> DetectionStats {
        let buffer = self.buffer.lock();
        let mut buffer_sizes = BTreeMap::new();
        for symbol in &self.config.symbols {
            for &timeframe in &self.config.timeframes {
                buffer_sizes.insert(format!("{symbol}_{timeframe}"), buffer.buffer_size(symbol, timeframe));
            }
        }

        DetectionStats {
            state: self.state(),
            total_patterns_loaded: *self.patterns_loaded.lock(),
            candles_processed: self.candle_count.load(Ordering::Relaxed),
            patterns_detected: self.patterns_detected.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            symbols_monitored: self.config.symbols.len(),
            timeframes_monitored: self.config.timeframes.len(),
            buffer_sizes,
        }
    }

    pub fn buffer_size(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.buffer.lock().buffer_size(symbol, timeframe)
    }

    /// Stop accepting candles. Buffers and stats are kept.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if *state != LiveState::Stopped {
            *state = LiveState::Stopped;
            info!(state = %*state, "Live detector stopped");
        }
    }

    /// Replay stored bars of `[start, end]` as live candles, in order.
    /// Returns the number of matches.
    pub fn simulate_live_data(
        &self,
        aggregator: &TimeframeAggregator,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize> {
        let bars = aggregator.bars(symbol, timeframe, start, end, None)?;
        info!(symbol, %timeframe, candles = bars.len(), "Starting simulation");

        let mut matches = 0;
        for bar in &bars {
            matches += self.on_new_candle(LiveCandle::from_bar(symbol, timeframe, bar))?.matches.len();
        }
        info!(symbol, %timeframe, matches, "Simulation finished");
        Ok(matches)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}

/// Signal row for a live match
fn match_record(m: &PatternMatch, signal_time: DateTime<Utc>) -> SignalRecord {
    let signal_type = match m.prediction {
        Prediction::EnterLong => SignalType::Buy,
        Prediction::EnterShort => SignalType::Sell,
        Prediction::NotTrade | Prediction::Conflict => SignalType::Neutral,
    };
    let template_grid_match = serde_json::to_value(m).unwrap_or_else(|e| {
        warn!(pattern_id = m.pattern_id, error = %e, "Match not serializable");
        serde_json::Value::Null
    });

    SignalRecord {
        symbol: m.symbol.clone(),
        timeframe: m.timeframe,
        pattern_type: PatternKind::TemplateGrid(m.pattern_id).to_string(),
        signal_type,
        confidence: m.confidence,
        price: m.current_price,
        signal_time,
        metadata: serde_json::json!({
            "template_grid_match": template_grid_match,
            "pattern_id": m.pattern_id,
            "similarity": m.similarity,
            "prediction": m.prediction,
            "trend_behavior": m.trend_behavior,
            "grid_size": m.grid_size,
        }),
    }
}

// ============================================================
// ALERTS
// ============================================================

/// Alert payload handed to alert handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub action: Prediction,
    pub price: f64,
    pub confidence: f64,
    pub similarity: f64,
    pub timestamp: DateTime<Utc>,
    pub pattern_id: i64,
}

impl From<&PatternMatch> for Alert {
    fn from(m: &PatternMatch) -> Self {
        Self {
            symbol: m.symbol.clone(),
            timeframe: m.timeframe,
            action: m.prediction,
            price: m.current_price,
            confidence: m.confidence,
            similarity: m.similarity,
            timestamp: m.detected_at,
            pattern_id: m.pattern_id,
        }
    }
}

pub const HIGH_CONFIDENCE_ALERT: f64 = 80.0;
pub const TRADING_ALERT_CONFIDENCE: f64 = 75.0;

/// Alerts on any match with `confidence >= min_confidence`
pub fn high_confidence_alert<H>(min_confidence: f64, handler: H) -> impl Fn(&PatternMatch) -> Result<()> + Send + Sync
where
    H: Fn(Alert) -> Result<()> + Send + Sync,
{
    move |m: &PatternMatch| {
        if m.confidence < min_confidence {
            return Ok(());
        }
        let alert = Alert::from(m);
        warn!(symbol = %alert.symbol, action = %alert.action, confidence = alert.confidence, "High confidence alert");
        handler(alert)
    }
}

/// Alerts on ENTER_LONG / ENTER_SHORT matches at 75% confidence or more
pub fn trading_alert<H>(handler: H) -> impl Fn(&PatternMatch) -> Result<()> + Send + Sync
where
    H: Fn(Alert) -> Result<()> + Send + Sync,
{
    move |m: &PatternMatch| {
        if m.confidence < TRADING_ALERT_CONFIDENCE || !m.prediction.is_actionable() {
            return Ok(());
        }
        let alert = Alert::from(m);
        info!(symbol = %alert.symbol, action = %alert.action, price = alert.price, "Trading signal");
        handler(alert)
    }
}
