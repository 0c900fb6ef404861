//! OHLCV bar representation and bar timeframes.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// A single price bar. Sequences of bars are ordered oldest to newest.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Close prices of `bars`, in the same order.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Bar width, using the broker's labels (`1Min`, `15Min`, `1Day`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Minute1,
    Minute5,
    Minute15,
    Minute30,
    Hour1,
    Day1,
}

impl Timeframe {
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1Min",
            Timeframe::Minute5 => "5Min",
            Timeframe::Minute15 => "15Min",
            Timeframe::Minute30 => "30Min",
            Timeframe::Hour1 => "1Hour",
            Timeframe::Day1 => "1Day",
        }
    }

    pub fn seconds(&self) -> u64 {
        match self {
            Timeframe::Minute1 => 60,
            Timeframe::Minute5 => 300,
            Timeframe::Minute15 => 900,
            Timeframe::Minute30 => 1800,
            Timeframe::Hour1 => 3600,
            Timeframe::Day1 => 86_400,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1min" | "1m" => Ok(Timeframe::Minute1),
            "5min" | "5m" => Ok(Timeframe::Minute5),
            "15min" | "15m" => Ok(Timeframe::Minute15),
            "30min" | "30m" => Ok(Timeframe::Minute30),
            "1hour" | "1h" => Ok(Timeframe::Hour1),
            "1day" | "1d" => Ok(Timeframe::Day1),
            other => Err(format!("unknown timeframe '{other}'")),
        }
    }
}
