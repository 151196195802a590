//! Storage collaborators
//!
//! The core never talks to a database directly. Bars, the template library and
//! pattern/signal persistence sit behind the narrow traits below; `MemoryStore`
//! implements all of them in-process.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::bar::{Bar, Tick};
use crate::signals::SignalType;
use crate::timeframe::Timeframe;
use crate::{Direction, Result};

// ============================================================
// RECORDS
// ============================================================

/// Template library row as stored: list-valued columns are JSON text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: i64,
    /// JSON array of row indices
    pub pic: String,
    /// JSON `[rows, cols]`
    pub grid_size: String,
    /// JSON rows x cols matrix
    pub weights: String,
    pub timeframe: String,
    pub creation_method: String,
    pub prediction_accuracy: f64,
    pub has_forecasting_power: bool,
    /// JSON array of 10 floats
    pub predicate_accuracies: String,
    pub trades_taken: i64,
    pub successful_trades: i64,
    pub total_pnl: f64,
}

/// Persisted pattern, keyed by (symbol, timeframe, pattern_type, start_time, end_time)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub pattern_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub confidence: f64,
    pub direction: Direction,
    pub metadata: serde_json::Value,
}

/// Persisted signal, keyed by (symbol, timeframe, pattern_type, signal_time)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub pattern_type: String,
    pub signal_type: SignalType,
    pub confidence: f64,
    pub price: f64,
    pub signal_time: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

type PatternKey = (String, Timeframe, String, DateTime<Utc>, DateTime<Utc>);
type SignalKey = (String, Timeframe, String, DateTime<Utc>);

impl PatternRecord {
    fn key(&self) -> PatternKey {
        (
            self.symbol.clone(),
            self.timeframe,
            self.pattern_type.clone(),
            self.start_time,
            self.end_time,
        )
    }
}

impl SignalRecord {
    fn key(&self) -> SignalKey {
        (self.symbol.clone(), self.timeframe, self.pattern_type.clone(), self.signal_time)
    }
}

// ============================================================
// COLLABORATOR TRAITS
// ============================================================

/// Bar and tick storage
pub trait BarStore: Send + Sync {
    /// Bars with `start <= time <= end`, ascending. `limit` keeps the first N.
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<Bar>>;

    fn fetch_latest_bar(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<Bar>>;

    /// Insert or overwrite bars keyed by (symbol, timeframe, time). Returns rows written.
    fn upsert_bars(&self, symbol: &str, timeframe: Timeframe, bars: &[Bar]) -> Result<usize>;

    /// Ticks with `start <= time <= end`, ascending; `None` bounds are open
    fn fetch_ticks(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Tick>>;
}

/// Template Grid library storage
pub trait TemplateStore: Send + Sync {
    /// Patterns with forecasting power and `prediction_accuracy > min_accuracy`,
    /// most profitable first
    fn fetch_eligible_templates(&self, min_accuracy: f64) -> Result<Vec<TemplateRecord>>;
}

/// Pattern and signal persistence. All writes are idempotent upserts.
pub trait PatternSink: Send + Sync {
    fn save_patterns(&self, patterns: &[PatternRecord]) -> Result<usize>;
    fn save_signal(&self, signal: &SignalRecord) -> Result<()>;

    /// Write one scan unit's patterns and signals together. Either every
    /// row lands or none do. Returns rows written.
    fn save_scan(&self, patterns: &[PatternRecord], signals: &[SignalRecord]) -> Result<usize>;
}

// ============================================================
// IN-MEMORY STORE
// ============================================================

#[derive(Default)]
struct Tables {
    bars: HashMap<(String, Timeframe), BTreeMap<DateTime<Utc>, Bar>>,
    ticks: HashMap<String, Vec<Tick>>,
    templates: Vec<TemplateRecord>,
    patterns: BTreeMap<PatternKey, PatternRecord>,
    signals: BTreeMap<SignalKey, SignalRecord>,
}

/// Thread-safe in-process implementation of every storage trait
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw ticks for a symbol, keeping them time-ordered
    pub fn insert_ticks(&self, symbol: &str, ticks: &[Tick]) {
        let mut tables = self.tables.write();
        let entry = tables.ticks.entry(symbol.to_string()).or_default();
        entry.extend_from_slice(ticks);
        entry.sort_by_key(|t| t.time);
    }

    pub fn insert_templates(&self, templates: impl IntoIterator<Item = TemplateRecord>) {
        self.tables.write().templates.extend(templates);
    }

    pub fn clear_templates(&self) {
        self.tables.write().templates.clear();
    }

    pub fn bar_count(&self, symbol: &str, timeframe: Timeframe) -> usize {
        self.tables
            .read()
            .bars
            .get(&(symbol.to_string(), timeframe))
            .map_or(0, BTreeMap::len)
    }

    /// Saved patterns in key order
    pub fn patterns(&self) -> Vec<PatternRecord> {
        self.tables.read().patterns.values().cloned().collect()
    }

    /// Saved signals in key order
    pub fn signals(&self) -> Vec<SignalRecord> {
        self.tables.read().signals.values().cloned().collect()
    }
}

impl BarStore for MemoryStore {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<Bar>> {
        if start > end {
            return Ok(Vec::new());
        }
        let tables = self.tables.read();
        let Some(series) = tables.bars.get(&(symbol.to_string(), timeframe)) else {
            return Ok(Vec::new());
        };
        let iter = series.range(start..=end).map(|(_, bar)| *bar);
        Ok(match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }

    fn fetch_latest_bar(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<Bar>> {
        let tables = self.tables.read();
        Ok(tables
            .bars
            .get(&(symbol.to_string(), timeframe))
            .and_then(|series| series.values().next_back().copied()))
    }

    fn upsert_bars(&self, symbol: &str, timeframe: Timeframe, bars: &[Bar]) -> Result<usize> {
        let mut tables = self.tables.write();
        let series = tables.bars.entry((symbol.to_string(), timeframe)).or_default();
        for bar in bars {
            series.insert(bar.time, *bar);
        }
        Ok(bars.len())
    }

    fn fetch_ticks(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Tick>> {
        let tables = self.tables.read();
        Ok(tables
            .ticks
            .get(symbol)
            .map(|ticks| {
                ticks
                    .iter()
                    .filter(|t| start.map_or(true, |s| t.time >= s))
                    .filter(|t| end.map_or(true, |e| t.time <= e))
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl TemplateStore for MemoryStore {
    fn fetch_eligible_templates(&self, min_accuracy: f64) -> Result<Vec<TemplateRecord>> {
        let mut eligible: Vec<TemplateRecord> = self
            .tables
            .read()
            .templates
            .iter()
            .filter(|t| t.has_forecasting_power && t.prediction_accuracy > min_accuracy)
            .cloned()
            .collect();
        eligible.sort_by(|a, b| {
            b.total_pnl
                .total_cmp(&a.total_pnl)
                .then(b.prediction_accuracy.total_cmp(&a.prediction_accuracy))
        });
        Ok(eligible)
    }
}

impl PatternSink for MemoryStore {
    fn save_patterns(&self, patterns: &[PatternRecord]) -> Result<usize> {
        let mut tables = self.tables.write();
        for p in patterns {
            tables.patterns.insert(p.key(), p.clone());
        }
        Ok(patterns.len())
    }

    fn save_signal(&self, signal: &SignalRecord) -> Result<()> {
        self.tables.write().signals.insert(signal.key(), signal.clone());
        Ok(())
    }

    fn save_scan(&self, patterns: &[PatternRecord], signals: &[SignalRecord]) -> Result<usize> {
        let mut tables = self.tables.write();
        for p in patterns {
            tables.patterns.insert(p.key(), p.clone());
        }
        for s in signals {
            tables.signals.insert(s.key(), s.clone());
        }
        Ok(patterns.len() + signals.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn bar(minute: i64, close: f64) -> Bar {
        Bar::new(t0() + Duration::minutes(minute), close, close, close, close, 1.0)
    }

    fn template(id: i64, accuracy: f64, power: bool, pnl: f64) -> TemplateRecord {
        TemplateRecord {
            id,
            pic: "[0,1]".into(),
            grid_size: "[2,2]".into(),
            weights: "[[1,0],[0,1]]".into(),
            timeframe: "60".into(),
            creation_method: "test".into(),
            prediction_accuracy: accuracy,
            has_forecasting_power: power,
            predicate_accuracies: "[50,50,50,50,50,50,50,50,50,50]".into(),
            trades_taken: 0,
            successful_trades: 0,
            total_pnl: pnl,
        }
    }

    #[test]
    fn test_upsert_overwrites_by_time() {
        let store = MemoryStore::new();
        store.upsert_bars("EURUSD", Timeframe::M1, &[bar(0, 1.0), bar(1, 2.0)]).unwrap();
        store.upsert_bars("EURUSD", Timeframe::M1, &[bar(1, 3.0)]).unwrap();

        assert_eq!(store.bar_count("EURUSD", Timeframe::M1), 2);
        let latest = store.fetch_latest_bar("EURUSD", Timeframe::M1).unwrap().unwrap();
        assert_eq!(latest.close, 3.0);
    }

    #[test]
    fn test_fetch_bars_range_and_limit() {
        let store = MemoryStore::new();
        let bars: Vec<Bar> = (0..10).map(|i| bar(i, i as f64)).collect();
        store.upsert_bars("EURUSD", Timeframe::M1, &bars).unwrap();

        let got = store
            .fetch_bars("EURUSD", Timeframe::M1, t0() + Duration::minutes(2), t0() + Duration::minutes(6), None)
            .unwrap();
        assert_eq!(got.len(), 5);
        assert_eq!(got[0].close, 2.0);

        let limited = store
            .fetch_bars("EURUSD", Timeframe::M1, t0(), t0() + Duration::minutes(9), Some(3))
            .unwrap();
        assert_eq!(limited.iter().map(|b| b.close).collect::<Vec<_>>(), vec![0.0, 1.0, 2.0]);

        assert!(store.fetch_bars("GBPUSD", Timeframe::M1, t0(), t0(), None).unwrap().is_empty());
    }

    #[test]
    fn test_eligible_templates_filtered_and_ordered() {
        let store = MemoryStore::new();
        store.insert_templates([
            template(1, 70.0, true, 10.0),
            template(2, 55.0, true, 99.0),
            template(3, 90.0, false, 99.0),
            template(4, 65.0, true, 50.0),
        ]);
        let ids: Vec<i64> = store.fetch_eligible_templates(60.0).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![4, 1]);
    }

    #[test]
    fn test_signal_upsert_is_idempotent() {
        let store = MemoryStore::new();
        let record = SignalRecord {
            symbol: "EURUSD".into(),
            timeframe: Timeframe::H1,
            pattern_type: "HAMMER".into(),
            signal_type: SignalType::Buy,
            confidence: 70.0,
            price: 1.1,
            signal_time: t0(),
            metadata: serde_json::Value::Null,
        };
        store.save_signal(&record).unwrap();
        store.save_signal(&SignalRecord { confidence: 80.0, ..record.clone() }).unwrap();

        let saved = store.signals();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].confidence, 80.0);
    }

    #[test]
    fn test_save_scan_writes_both_tables() {
        let store = MemoryStore::new();
        let pattern = PatternRecord {
            symbol: "EURUSD".into(),
            timeframe: Timeframe::H1,
            pattern_type: "HAMMER".into(),
            start_time: t0(),
            end_time: t0(),
            confidence: 80.0,
            direction: Direction::Bullish,
            metadata: serde_json::Value::Null,
        };
        let signal = SignalRecord {
            symbol: "EURUSD".into(),
            timeframe: Timeframe::H1,
            pattern_type: "HAMMER".into(),
            signal_type: SignalType::Buy,
            confidence: 72.0,
            price: 1.1,
            signal_time: t0(),
            metadata: serde_json::Value::Null,
        };

        assert_eq!(store.save_scan(&[pattern.clone()], &[signal.clone()]).unwrap(), 2);
        assert_eq!(store.save_scan(&[pattern], &[signal]).unwrap(), 2);
        assert_eq!(store.patterns().len(), 1);
        assert_eq!(store.signals().len(), 1);
    }
}
