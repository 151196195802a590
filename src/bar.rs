//! OHLCV bar and raw tick records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OHLCV;

/// Aggregated OHLCV bar, identified by (symbol, timeframe, time)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bucket start
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Raw ticks rolled into this bar
    #[serde(default)]
    pub tick_count: u64,
}

impl Bar {
    pub fn new(time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
            tick_count: 0,
        }
    }

    pub fn with_tick_count(mut self, tick_count: u64) -> Self {
        self.tick_count = tick_count;
        self
    }
}

impl OHLCV for Bar {
    #[inline]
    fn open(&self) -> f64 {
        self.open
    }

    #[inline]
    fn high(&self) -> f64 {
        self.high
    }

    #[inline]
    fn low(&self) -> f64 {
        self.low
    }

    #[inline]
    fn close(&self) -> f64 {
        self.close
    }

    #[inline]
    fn volume(&self) -> f64 {
        self.volume
    }

    #[inline]
    fn timestamp(&self) -> Option<i64> {
        Some(self.time.timestamp_millis())
    }
}

/// Raw price tick. Bars are built from the bid side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub time: DateTime<Utc>,
    pub bid: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Tick {
    pub fn new(time: DateTime<Utc>, bid: f64, volume: f64) -> Self {
        Self { time, bid, volume }
    }
}
