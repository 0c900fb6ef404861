//! Risk-based position sizing.
//!
//! risk_per_share = |entry - stop| when a stop is given, else entry * default_stop_pct
//! risk_amount    = balance * risk_pct
//! quantity       = floor(risk_amount / risk_per_share)
//!
//! A quantity of 0 means "do not trade this symbol this cycle".

/// Stop distance used when the caller has no explicit stop price.
pub const DEFAULT_STOP_PCT: f64 = 0.02;

pub fn position_size(
    balance: f64,
    risk_pct: f64,
    entry_price: f64,
    stop_loss_price: Option<f64>,
    default_stop_pct: f64,
) -> u64 {
    let risk_per_share = match stop_loss_price {
        Some(stop) => (entry_price - stop).abs(),
        None => entry_price * default_stop_pct,
    };
    if !risk_per_share.is_finite() || risk_per_share <= 0.0 {
        return 0;
    }

    let risk_amount = balance * risk_pct;
    let quantity = (risk_amount / risk_per_share).floor();
    if !quantity.is_finite() || quantity <= 0.0 {
        return 0;
    }
    quantity as u64
}

/// Account risk budget applied to every entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    pub risk_pct: f64,
    pub default_stop_pct: f64,
}

impl PositionSizer {
    pub fn new(risk_pct: f64, default_stop_pct: f64) -> Self {
        Self {
            risk_pct,
            default_stop_pct,
        }
    }

    pub fn size(&self, balance: f64, entry_price: f64, stop_loss_price: Option<f64>) -> u64 {
        position_size(
            balance,
            self.risk_pct,
            entry_price,
            stop_loss_price,
            self.default_stop_pct,
        )
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::new(0.01, DEFAULT_STOP_PCT)
    }
}
