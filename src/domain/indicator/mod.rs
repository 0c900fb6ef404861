//! Momentum indicators and per-bar indicator snapshots.
//!
//! - `ema`, `rsi`, `macd`: series calculators over close prices
//! - `IndicatorParams`: periods for RSI and MACD
//! - `IndicatorSnapshot`: the indicator values at one bar, as seen by the signal rules

pub mod ema;
pub mod macd;
pub mod rsi;

pub use ema::calculate_ema;
pub use macd::{MacdPoint, calculate_macd};
pub use rsi::{RsiReading, calculate_rsi, compute_rsi};

use crate::domain::ohlcv::{Bar, closes};
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            rsi_period: 14,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
        }
    }
}

impl IndicatorParams {
    /// Bars needed before two consecutive snapshots carry every indicator.
    pub fn min_bars(&self) -> usize {
        let rsi = self.rsi_period.saturating_add(1);
        let macd = macd::macd_min_prices(self.macd_fast, self.macd_slow, self.macd_signal);
        rsi.max(macd).saturating_add(1)
    }
}

impl fmt::Display for IndicatorParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RSI({}) MACD({},{},{})",
            self.rsi_period, self.macd_fast, self.macd_slow, self.macd_signal
        )
    }
}

/// Indicator values at one bar. `None` while an indicator is still warming up.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
}

/// One snapshot per bar, oldest to newest, at full precision.
pub fn compute_snapshots(bars: &[Bar], params: &IndicatorParams) -> Vec<IndicatorSnapshot> {
    let prices = closes(bars);
    let rsi = calculate_rsi(&prices, params.rsi_period);
    let macd = calculate_macd(
        &prices,
        params.macd_fast,
        params.macd_slow,
        params.macd_signal,
    );

    bars.iter()
        .zip(rsi)
        .zip(macd)
        .map(|((bar, rsi), macd)| IndicatorSnapshot {
            timestamp: bar.timestamp,
            close: bar.close,
            rsi,
            macd: macd.map(|m| m.line),
            macd_signal: macd.map(|m| m.signal),
        })
        .collect()
}
