//! RSI (Relative Strength Index).
//!
//! Average gain/loss are simple means over exactly `period` price changes:
//! - diff[i] = P[i] - P[i-1], gain = max(diff, 0), loss = max(-diff, 0)
//! - RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! - avg_loss == 0 and avg_gain > 0: RSI = 100
//! - avg_loss == 0 and avg_gain == 0 (flat window): RSI = 50
//!
//! Warmup: the first `period` values are `None` (a full window of changes
//! needs period + 1 prices).

/// Neutral value reported when there is not enough history.
pub const NEUTRAL_RSI: f64 = 50.0;

/// Latest RSI value as reported to callers, rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiReading {
    pub value: f64,
    pub sufficient_data: bool,
}

/// Full-precision RSI series, one entry per price.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut values = vec![None; prices.len()];
    if period == 0 || prices.len() <= period {
        return values;
    }

    let gains: Vec<f64> = prices.windows(2).map(|w| (w[1] - w[0]).max(0.0)).collect();
    let losses: Vec<f64> = prices.windows(2).map(|w| (w[0] - w[1]).max(0.0)).collect();

    // Change i (between prices i and i+1) closes the window ending at price i+1.
    for end in (period - 1)..gains.len() {
        let start = end + 1 - period;
        let avg_gain = gains[start..=end].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[start..=end].iter().sum::<f64>() / period as f64;
        values[end + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    values
}

/// RSI of the most recent window. Falls back to [`NEUTRAL_RSI`] with fewer
/// than `period + 1` prices.
pub fn compute_rsi(prices: &[f64], period: usize) -> RsiReading {
    match calculate_rsi(prices, period).last().copied().flatten() {
        Some(rsi) => RsiReading {
            value: round2(rsi),
            sufficient_data: true,
        },
        None => RsiReading {
            value: NEUTRAL_RSI,
            sufficient_data: false,
        },
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain > 0.0 { 100.0 } else { NEUTRAL_RSI }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
