//! Timeframe aggregation
//!
//! Ticks roll up into base (1m) bars and every higher timeframe is rebuilt from
//! its cascade source:
//!
//! ```text
//! ticks -> 1 -> {5, 15, 60, D}
//!          5 -> 30
//!         60 -> 240
//!          D -> {W, M}
//! ```
//!
//! Writes are upserts keyed by (symbol, timeframe, time), so re-running any
//! stage over the same range yields the same bars.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::bar::{Bar, Tick};
use crate::store::BarStore;
use crate::timeframe::Timeframe;
use crate::Result;

/// Bucket time-ordered ticks into bars of `target`.
///
/// Bars are built from bids: open is the first bid in the bucket, close the
/// last, and `tick_count` the number of ticks.
pub fn bucket_ticks(ticks: &[Tick], target: Timeframe) -> Vec<Bar> {
    let mut buckets: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
    for tick in ticks {
        let time = target.bucket_start(tick.time);
        buckets
            .entry(time)
            .and_modify(|bar| {
                bar.high = bar.high.max(tick.bid);
                bar.low = bar.low.min(tick.bid);
                bar.close = tick.bid;
                bar.volume += tick.volume;
                bar.tick_count += 1;
            })
            .or_insert_with(|| {
                Bar::new(time, tick.bid, tick.bid, tick.bid, tick.bid, tick.volume).with_tick_count(1)
            });
    }
    buckets.into_values().collect()
}

/// Bucket time-ordered bars into coarser bars of `target`
pub fn bucket_bars(bars: &[Bar], target: Timeframe) -> Vec<Bar> {
    let mut buckets: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
    for src in bars {
        let time = target.bucket_start(src.time);
        buckets
            .entry(time)
            .and_modify(|bar| {
                bar.high = bar.high.max(src.high);
                bar.low = bar.low.min(src.low);
                bar.close = src.close;
                bar.volume += src.volume;
                bar.tick_count += src.tick_count;
            })
            .or_insert_with(|| Bar { time, ..*src });
    }
    buckets.into_values().collect()
}

/// Store-backed aggregation and bar queries
pub struct TimeframeAggregator {
    store: Arc<dyn BarStore>,
}

impl TimeframeAggregator {
    pub fn new(store: Arc<dyn BarStore>) -> Self {
        Self { store }
    }

    /// Aggregate stored ticks straight into `timeframe`. Returns bars written.
    pub fn aggregate_from_ticks(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        info!(symbol, timeframe = %timeframe, "Aggregating ticks");
        let ticks = self.store.fetch_ticks(symbol, start, end)?;
        let bars = bucket_ticks(&ticks, timeframe);
        let written = self.store.upsert_bars(symbol, timeframe, &bars)?;
        debug!(symbol, timeframe = %timeframe, ticks = ticks.len(), bars = written, "Tick aggregation done");
        Ok(written)
    }

    /// Rebuild `target` bars from stored `source` bars within `[start, end]`
    pub fn aggregate_from_lower(
        &self,
        symbol: &str,
        source: Timeframe,
        target: Timeframe,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        info!(symbol, source = %source, target = %target, "Aggregating from lower timeframe");
        let start = start.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let end = end.unwrap_or(DateTime::<Utc>::MAX_UTC);
        let src = self.store.fetch_bars(symbol, source, start, end, None)?;
        let bars = bucket_bars(&src, target);
        let written = self.store.upsert_bars(symbol, target, &bars)?;
        debug!(symbol, source = %source, target = %target, bars = written, "Aggregation done");
        Ok(written)
    }

    /// Ticks to base bars, then every higher timeframe from its cascade source.
    ///
    /// Returns bars written per timeframe. A storage failure aborts the
    /// cascade for this symbol.
    pub fn aggregate_all_timeframes(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<BTreeMap<Timeframe, usize>> {
        info!(symbol, "Aggregating all timeframes");
        let mut written = BTreeMap::new();
        written.insert(
            Timeframe::BASE,
            self.aggregate_from_ticks(symbol, Timeframe::BASE, start, end)?,
        );

        // ALL is ordered so every source is rebuilt before its targets
        for target in Timeframe::ALL {
            let Some(source) = target.cascade_source() else {
                continue;
            };
            // Widen the source range to whole target buckets so edge buckets
            // are rebuilt from complete data
            let from = start.map(|s| target.bucket_start(s));
            let count = self.aggregate_from_lower(symbol, source, target, from, end)?;
            written.insert(target, count);
        }

        info!(symbol, total = written.values().sum::<usize>(), "All timeframes aggregated");
        Ok(written)
    }

    /// Bars for a timeframe code, ascending. Unknown codes fail with
    /// `InvalidTimeframe`.
    pub fn get_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<Bar>> {
        let tf: Timeframe = timeframe.parse()?;
        self.bars(symbol, tf, start, end, limit)
    }

    pub fn bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<Bar>> {
        self.store.fetch_bars(symbol, timeframe, start, end, limit)
    }

    pub fn get_latest_bar(&self, symbol: &str, timeframe: &str) -> Result<Option<Bar>> {
        let tf: Timeframe = timeframe.parse()?;
        self.latest_bar(symbol, tf)
    }

    pub fn latest_bar(&self, symbol: &str, timeframe: Timeframe) -> Result<Option<Bar>> {
        self.store.fetch_latest_bar(symbol, timeframe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::Error;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn minute_bar(minute: i64, o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar::new(t0() + Duration::minutes(minute), o, h, l, c, 10.0).with_tick_count(3)
    }

    #[test]
    fn test_bucket_ticks_ohlc() {
        let ticks = [
            Tick::new(t0() + Duration::seconds(1), 1.0, 1.0),
            Tick::new(t0() + Duration::seconds(20), 3.0, 2.0),
            Tick::new(t0() + Duration::seconds(40), 0.5, 1.0),
            Tick::new(t0() + Duration::seconds(59), 2.0, 1.0),
            Tick::new(t0() + Duration::seconds(61), 4.0, 1.0),
        ];
        let bars = bucket_ticks(&ticks, Timeframe::M1);
        assert_eq!(bars.len(), 2);
        let b = bars[0];
        assert_eq!((b.open, b.high, b.low, b.close), (1.0, 3.0, 0.5, 2.0));
        assert_eq!(b.volume, 5.0);
        assert_eq!(b.tick_count, 4);
        assert_eq!(bars[1].tick_count, 1);
    }

    #[test]
    fn test_bucket_bars_sums_volume_and_ticks() {
        let bars: Vec<Bar> = (0..10)
            .map(|i| minute_bar(i, 1.0 + i as f64, 2.0 + i as f64, 0.5, 1.5 + i as f64))
            .collect();
        let five = bucket_bars(&bars, Timeframe::M5);
        assert_eq!(five.len(), 2);
        assert_eq!(five[0].open, 1.0);
        assert_eq!(five[0].high, 6.0);
        assert_eq!(five[0].close, 5.5);
        assert_eq!(five[0].volume, 50.0);
        assert_eq!(five[0].tick_count, 15);
        assert_eq!(five[1].time, t0() + Duration::minutes(5));
    }

    #[test]
    fn test_reaggregation_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let bars: Vec<Bar> = (0..120).map(|i| minute_bar(i, 1.0, 1.2, 0.9, 1.1)).collect();
        store.upsert_bars("EURUSD", Timeframe::M1, &bars).unwrap();
        let agg = TimeframeAggregator::new(store.clone());

        agg.aggregate_from_lower("EURUSD", Timeframe::M1, Timeframe::H1, None, None).unwrap();
        let first = agg.bars("EURUSD", Timeframe::H1, t0(), t0() + Duration::days(1), None).unwrap();
        agg.aggregate_from_lower("EURUSD", Timeframe::M1, Timeframe::H1, None, None).unwrap();
        let second = agg.bars("EURUSD", Timeframe::H1, t0(), t0() + Duration::days(1), None).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].volume, 600.0);
    }

    #[test]
    fn test_full_cascade_from_ticks() {
        let store = Arc::new(MemoryStore::new());
        let ticks: Vec<Tick> = (0..(3 * 24 * 60))
            .map(|m| Tick::new(t0() + Duration::minutes(m), 1.0 + (m % 7) as f64 * 0.001, 1.0))
            .collect();
        store.insert_ticks("EURUSD", &ticks);
        let agg = TimeframeAggregator::new(store.clone());

        let written = agg.aggregate_all_timeframes("EURUSD", None, None).unwrap();
        assert_eq!(written[&Timeframe::M1], 3 * 24 * 60);
        assert_eq!(written[&Timeframe::H4], 18);
        assert_eq!(written[&Timeframe::D1], 3);
        assert_eq!(written[&Timeframe::W1], 1);
        assert_eq!(written[&Timeframe::Mn1], 1);

        let day = agg.get_latest_bar("EURUSD", "D").unwrap().unwrap();
        assert_eq!(day.tick_count, 24 * 60);
        assert_eq!(day.volume, (24 * 60) as f64);
    }

    #[test]
    fn test_unknown_timeframe_is_rejected() {
        let agg = TimeframeAggregator::new(Arc::new(MemoryStore::new()));
        let err = agg.get_bars("EURUSD", "7", t0(), t0(), None).unwrap_err();
        assert!(matches!(err, Error::InvalidTimeframe(_)));
        assert!(agg.get_latest_bar("EURUSD", "H").is_err());
    }
}
