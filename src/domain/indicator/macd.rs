//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: max(fast, slow) - 1 + signal - 1 values (33 for defaults).

use crate::domain::indicator::ema::calculate_ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub fn calculate_macd(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Vec<Option<MacdPoint>> {
    let mut values = vec![None; prices.len()];
    if fast == 0 || slow == 0 || signal_period == 0 {
        return values;
    }

    let ema_fast = calculate_ema(prices, fast);
    let ema_slow = calculate_ema(prices, slow);
    let line_warmup = fast.max(slow) - 1;
    if prices.len() < line_warmup + signal_period {
        return values;
    }

    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => f - s,
            _ => 0.0,
        })
        .collect();

    let k = 2.0 / (signal_period as f64 + 1.0);
    let seed_end = line_warmup + signal_period;
    let mut signal = macd_line[line_warmup..seed_end].iter().sum::<f64>() / signal_period as f64;

    for i in (seed_end - 1)..prices.len() {
        if i >= seed_end {
            signal += k * (macd_line[i] - signal);
        }
        values[i] = Some(MacdPoint {
            line: macd_line[i],
            signal,
            histogram: macd_line[i] - signal,
        });
    }

    values
}

pub fn calculate_macd_default(prices: &[f64]) -> Vec<Option<MacdPoint>> {
    calculate_macd(prices, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

/// Number of prices needed before the first MACD point is defined.
pub fn macd_min_prices(fast: usize, slow: usize, signal_period: usize) -> usize {
    fast.max(slow).saturating_add(signal_period).saturating_sub(1)
}
