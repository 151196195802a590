//! Template Grid engine
//!
//! Holds the active library behind an `Arc` that is replaced wholesale on
//! reload, so a detection pass always sees one consistent snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::decision::{
    classify_trend, has_forecasting_power, make_trading_decision, passes_pip_filter,
    passes_price_band, trend_behavior, Prediction, TrendClass,
};
use super::pattern::TemplateGridPattern;
use super::pic::{prices_to_pic, similarity};
use crate::config::GridConfig;
use crate::store::{TemplateRecord, TemplateStore};
use crate::timeframe::Timeframe;
use crate::Result;

/// Matches below this similarity are discarded
pub const MIN_SIMILARITY: f64 = 60.0;

// ============================================================
// MATCH
// ============================================================

/// One library pattern matching the current window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern_id: i64,
    /// Percentage in [MIN_SIMILARITY, 100]
    pub similarity: f64,
    /// Mean of similarity and the pattern's prediction accuracy
    pub confidence: f64,
    pub prediction: Prediction,
    pub trend_behavior: f64,
    pub trend: TrendClass,
    pub predicate_accuracies: Vec<f64>,
    pub detected_at: DateTime<Utc>,
    pub current_price: f64,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub grid_size: (usize, usize),
    /// PIC of the matched window
    pub current_pic: Vec<usize>,
    pub pattern_pic: Vec<usize>,
    pub creation_method: String,
    pub trades_taken: i64,
    pub successful_trades: i64,
    pub total_pnl: f64,
}

// ============================================================
// LIBRARY STATISTICS
// ============================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeframeStats {
    pub count: usize,
    pub avg_pnl: f64,
    pub avg_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPerformer {
    pub id: i64,
    pub timeframe: Timeframe,
    pub total_pnl: f64,
    pub prediction_accuracy: f64,
    pub trades_taken: i64,
    pub success_rate: f64,
}

/// Summary of the active library
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub total_patterns: usize,
    pub with_forecasting_power: usize,
    pub avg_prediction_accuracy: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub total_trades: i64,
    pub total_successful_trades: i64,
    pub overall_success_rate: f64,
    pub by_timeframe: BTreeMap<Timeframe, TimeframeStats>,
    /// Most profitable first
    pub top_performers: Vec<TopPerformer>,
}

impl LibraryStats {
    fn from_patterns(patterns: &[TemplateGridPattern], top_n: usize) -> Self {
        if patterns.is_empty() {
            return Self::default();
        }
        let n = patterns.len() as f64;
        let total_pnl: f64 = patterns.iter().map(|p| p.total_pnl).sum();
        let total_trades: i64 = patterns.iter().map(|p| p.trades_taken).sum();
        let total_successful: i64 = patterns.iter().map(|p| p.successful_trades).sum();

        let mut by_timeframe: BTreeMap<Timeframe, TimeframeStats> = BTreeMap::new();
        for p in patterns {
            let entry = by_timeframe.entry(p.timeframe).or_default();
            entry.count += 1;
            entry.avg_pnl += p.total_pnl;
            entry.avg_accuracy += p.prediction_accuracy;
        }
        for entry in by_timeframe.values_mut() {
            entry.avg_pnl /= entry.count as f64;
            entry.avg_accuracy /= entry.count as f64;
        }

        let mut ranked: Vec<&TemplateGridPattern> = patterns.iter().collect();
        ranked.sort_by(|a, b| b.total_pnl.total_cmp(&a.total_pnl));
        let top_performers = ranked
            .into_iter()
            .take(top_n)
            .map(|p| TopPerformer {
                id: p.id,
                timeframe: p.timeframe,
                total_pnl: p.total_pnl,
                prediction_accuracy: p.prediction_accuracy,
                trades_taken: p.trades_taken,
                success_rate: p.success_rate(),
            })
            .collect();

        Self {
            total_patterns: patterns.len(),
            with_forecasting_power: patterns.iter().filter(|p| p.has_forecasting_power).count(),
            avg_prediction_accuracy: patterns.iter().map(|p| p.prediction_accuracy).sum::<f64>() / n,
            total_pnl,
            avg_pnl: total_pnl / n,
            total_trades,
            total_successful_trades: total_successful,
            overall_success_rate: if total_trades > 0 {
                total_successful as f64 / total_trades as f64 * 100.0
            } else {
                0.0
            },
            by_timeframe,
            top_performers,
        }
    }
}

// ============================================================
// ENGINE
// ============================================================

/// Matches price windows against the active template library
#[derive(Debug)]
pub struct TemplateGridEngine {
    config: GridConfig,
    library: RwLock<Arc<Vec<TemplateGridPattern>>>,
}

impl TemplateGridEngine {
    /// Engine with an empty library
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            library: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Decode stored rows and install the eligible ones as the active library.
    ///
    /// Malformed rows are logged and skipped. Returns the number installed.
    pub fn load_patterns(&self, records: &[TemplateRecord]) -> usize {
        self.load_patterns_above(records, self.config.min_library_accuracy)
    }

    /// As [`load_patterns`](Self::load_patterns) with an explicit accuracy floor
    pub fn load_patterns_above(&self, records: &[TemplateRecord], min_accuracy: f64) -> usize {
        let patterns: Vec<TemplateGridPattern> = records
            .iter()
            .filter_map(|record| match TemplateGridPattern::from_record(record) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!(pattern_id = record.id, error = %e, "Skipping malformed library pattern");
                    None
                },
            })
            .filter(|p| p.is_eligible(min_accuracy))
            .collect();

        let loaded = patterns.len();
        info!(loaded, offered = records.len(), min_accuracy, "Loaded template grid library");
        self.set_patterns(patterns);
        loaded
    }

    /// Replace the active library as-is
    pub fn set_patterns(&self, patterns: Vec<TemplateGridPattern>) {
        *self.library.write() = Arc::new(patterns);
    }

    /// Fetch eligible rows from `store` and swap them in
    pub fn reload(&self, store: &dyn TemplateStore) -> Result<usize> {
        self.reload_above(store, self.config.min_library_accuracy)
    }

    pub fn reload_above(&self, store: &dyn TemplateStore, min_accuracy: f64) -> Result<usize> {
        let records = store.fetch_eligible_templates(min_accuracy)?;
        Ok(self.load_patterns_above(&records, min_accuracy))
    }

    /// Current library snapshot; unaffected by later reloads
    pub fn library(&self) -> Arc<Vec<TemplateGridPattern>> {
        Arc::clone(&self.library.read())
    }

    pub fn pattern_count(&self) -> usize {
        self.library.read().len()
    }

    pub fn library_stats(&self, top_n: usize) -> LibraryStats {
        LibraryStats::from_patterns(&self.library(), top_n)
    }

    /// Match the most recent prices against every library pattern, stamped now
    pub fn detect_patterns_in_window(
        &self,
        window: &[f64],
        symbol: &str,
        timeframe: Timeframe,
        current_price: f64,
    ) -> Vec<PatternMatch> {
        self.detect_patterns_at(window, symbol, timeframe, current_price, Utc::now())
    }

    /// Match the most recent prices against every library pattern.
    ///
    /// Patterns are independent, so several may match one window. Results are
    /// sorted by confidence, highest first.
    pub fn detect_patterns_at(
        &self,
        window: &[f64],
        symbol: &str,
        timeframe: Timeframe,
        current_price: f64,
        detected_at: DateTime<Utc>,
    ) -> Vec<PatternMatch> {
        let library = self.library();
        let mut matches: Vec<PatternMatch> = library
            .iter()
            .filter(|p| p.timeframe == timeframe)
            .filter_map(|pattern| {
                match self.evaluate(pattern, window, symbol, current_price, detected_at) {
                    Ok(m) => m,
                    Err(e) => {
                        error!(pattern_id = pattern.id, error = %e, "Pattern evaluation failed");
                        None
                    },
                }
            })
            .collect();

        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        debug!(symbol, %timeframe, candidates = library.len(), matched = matches.len(), "Window evaluated");
        matches
    }

    fn evaluate(
        &self,
        pattern: &TemplateGridPattern,
        window: &[f64],
        symbol: &str,
        current_price: f64,
        detected_at: DateTime<Utc>,
    ) -> Result<Option<PatternMatch>> {
        let n = pattern.window_len();
        if window.len() < n {
            return Ok(None);
        }
        let recent = &window[window.len() - n..];

        let current_pic = prices_to_pic(recent, pattern.grid_size)?;
        let sim = similarity(&pattern.pic, &pattern.weights, &current_pic);
        if sim < MIN_SIMILARITY {
            return Ok(None);
        }
        if !has_forecasting_power(&pattern.predicate_accuracies, self.config.forecasting_threshold) {
            return Ok(None);
        }
        if !passes_pip_filter(recent, pattern.timeframe, &self.config) {
            return Ok(None);
        }
        if !passes_price_band(recent, current_price, self.config.price_band) {
            return Ok(None);
        }

        let tb = trend_behavior(&pattern.predicate_accuracies);
        Ok(Some(PatternMatch {
            pattern_id: pattern.id,
            similarity: sim,
            confidence: (sim + pattern.prediction_accuracy) / 2.0,
            prediction: make_trading_decision(&pattern.predicate_accuracies, self.config.trend_threshold),
            trend_behavior: tb,
            trend: classify_trend(tb, self.config.trend_threshold),
            predicate_accuracies: pattern.predicate_accuracies.clone(),
            detected_at,
            current_price,
            symbol: symbol.to_string(),
            timeframe: pattern.timeframe,
            grid_size: pattern.grid_size,
            current_pic,
            pattern_pic: pattern.pic.clone(),
            creation_method: pattern.creation_method.clone(),
            trades_taken: pattern.trades_taken,
            successful_trades: pattern.successful_trades,
            total_pnl: pattern.total_pnl,
        }))
    }
}
