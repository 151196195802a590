//! Supported aggregation buckets
//!
//! Every timeframe knows how to align a timestamp to its bucket start, which
//! lower timeframe it is rolled up from, and the minimum price range (in pips)
//! a Template Grid window must span before a match on it is trusted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Bar bucket size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
    Mn1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 9] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
        Timeframe::W1,
        Timeframe::Mn1,
    ];

    /// Base timeframe built straight from ticks
    pub const BASE: Timeframe = Timeframe::M1;

    /// Canonical storage code
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1",
            Timeframe::M5 => "5",
            Timeframe::M15 => "15",
            Timeframe::M30 => "30",
            Timeframe::H1 => "60",
            Timeframe::H4 => "240",
            Timeframe::D1 => "D",
            Timeframe::W1 => "W",
            Timeframe::Mn1 => "M",
        }
    }

    /// Fixed bucket length in minutes; `None` for calendar-aligned frames
    pub fn minutes(self) -> Option<i64> {
        match self {
            Timeframe::M1 => Some(1),
            Timeframe::M5 => Some(5),
            Timeframe::M15 => Some(15),
            Timeframe::M30 => Some(30),
            Timeframe::H1 => Some(60),
            Timeframe::H4 => Some(240),
            Timeframe::D1 | Timeframe::W1 | Timeframe::Mn1 => None,
        }
    }

    /// Approximate bar length, used to size lookback windows
    pub fn nominal_duration(self) -> Duration {
        match self.minutes() {
            Some(m) => Duration::minutes(m),
            None => match self {
                Timeframe::D1 => Duration::days(1),
                Timeframe::W1 => Duration::days(7),
                _ => Duration::days(30),
            },
        }
    }

    /// Timeframe this one is rolled up from. `None` for the base timeframe.
    pub fn cascade_source(self) -> Option<Timeframe> {
        match self {
            Timeframe::M1 => None,
            Timeframe::M5 | Timeframe::M15 | Timeframe::H1 | Timeframe::D1 => Some(Timeframe::M1),
            Timeframe::M30 => Some(Timeframe::M5),
            Timeframe::H4 => Some(Timeframe::H1),
            Timeframe::W1 | Timeframe::Mn1 => Some(Timeframe::D1),
        }
    }

    /// Minimum pip range for a Template Grid window. `None` means use the
    /// configured default.
    pub fn min_pips(self) -> Option<f64> {
        match self {
            Timeframe::M1 => Some(5.0),
            Timeframe::M5 => Some(10.0),
            Timeframe::M15 => Some(15.0),
            Timeframe::M30 => Some(20.0),
            Timeframe::H1 => Some(30.0),
            Timeframe::H4 => Some(50.0),
            Timeframe::D1 => Some(80.0),
            Timeframe::W1 | Timeframe::Mn1 => None,
        }
    }

    /// Start of the bucket containing `t`
    pub fn bucket_start(self, t: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(minutes) = self.minutes() {
            let step = minutes * 60;
            let secs = t.timestamp();
            let floored = secs - secs.rem_euclid(step);
            return Utc.timestamp_opt(floored, 0).single().unwrap_or(t);
        }

        let date = t.date_naive();
        let day = match self {
            Timeframe::W1 => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
            Timeframe::Mn1 => NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date),
            _ => date,
        };
        Utc.from_utc_datetime(&day.and_time(NaiveTime::default()))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            "1" | "1m" => Timeframe::M1,
            "5" | "5m" => Timeframe::M5,
            "15" | "15m" => Timeframe::M15,
            "30" | "30m" => Timeframe::M30,
            "60" | "1h" => Timeframe::H1,
            "240" | "4h" => Timeframe::H4,
            "D" | "1d" | "1D" => Timeframe::D1,
            "W" | "1w" | "1W" => Timeframe::W1,
            "M" | "1M" | "1mo" => Timeframe::Mn1,
            other => return Err(Error::InvalidTimeframe(other.to_string())),
        })
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.as_str().to_string()
    }
}

impl TryFrom<String> for Timeframe {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}
