//! Directional signal rules over the two most recent indicator snapshots.
//!
//! Two rule-sets are supported and fixed per generator:
//! - Crossover: RSI crossing 50 together with MACD crossing its signal line
//! - Threshold: RSI outside overbought/oversold bounds, gated by holdings

use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::indicator::rsi::{NEUTRAL_RSI, round2};
use chrono::{DateTime, Utc};
use std::fmt;

/// RSI midline used by the crossover rules.
pub const RSI_MIDLINE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalDirection {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalDirection::Buy => write!(f, "buy"),
            SignalDirection::Sell => write!(f, "sell"),
            SignalDirection::Hold => write!(f, "hold"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub symbol: String,
    pub direction: SignalDirection,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

impl Signal {
    pub fn is_actionable(&self) -> bool {
        self.direction != SignalDirection::Hold
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleSet {
    Crossover,
    Threshold {
        overbought: f64,
        oversold: f64,
        max_positions: usize,
    },
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSet::Crossover => write!(f, "crossover"),
            RuleSet::Threshold {
                overbought,
                oversold,
                max_positions,
            } => write!(f, "threshold({oversold}/{overbought}, max {max_positions})"),
        }
    }
}

/// What the account currently holds, as far as one symbol's decision needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Holdings {
    pub held: bool,
    pub open_positions: usize,
}

#[derive(Debug, Clone)]
pub struct SignalGenerator {
    rule_set: RuleSet,
}

impl SignalGenerator {
    pub fn new(rule_set: RuleSet) -> Self {
        Self { rule_set }
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    /// Signal from the last two snapshots. Fewer than two is a Hold.
    pub fn generate(
        &self,
        symbol: &str,
        snapshots: &[IndicatorSnapshot],
        holdings: Holdings,
    ) -> Option<Signal> {
        match snapshots {
            [.., prev, curr] => Some(self.evaluate(symbol, prev, curr, holdings)),
            [only] => Some(hold(symbol, only, "insufficient history: one bar")),
            [] => None,
        }
    }

    pub fn evaluate(
        &self,
        symbol: &str,
        prev: &IndicatorSnapshot,
        curr: &IndicatorSnapshot,
        holdings: Holdings,
    ) -> Signal {
        match self.rule_set {
            RuleSet::Crossover => crossover(symbol, prev, curr),
            RuleSet::Threshold {
                overbought,
                oversold,
                max_positions,
            } => threshold(symbol, curr, holdings, overbought, oversold, max_positions),
        }
    }
}

fn crossover(symbol: &str, prev: &IndicatorSnapshot, curr: &IndicatorSnapshot) -> Signal {
    let (Some(prev_rsi), Some(curr_rsi)) = (prev.rsi, curr.rsi) else {
        return hold(symbol, curr, "insufficient history for RSI");
    };
    let (Some(prev_macd), Some(prev_sig), Some(curr_macd), Some(curr_sig)) =
        (prev.macd, prev.macd_signal, curr.macd, curr.macd_signal)
    else {
        return hold(symbol, curr, "insufficient history for MACD");
    };

    let rsi_up = prev_rsi <= RSI_MIDLINE && curr_rsi > RSI_MIDLINE;
    let rsi_down = prev_rsi >= RSI_MIDLINE && curr_rsi < RSI_MIDLINE;
    let macd_up = prev_macd <= prev_sig && curr_macd > curr_sig;
    let macd_down = prev_macd >= prev_sig && curr_macd < curr_sig;

    let mut fired = Vec::new();
    if rsi_up {
        fired.push("RSI crossed above 50");
    }
    if rsi_down {
        fired.push("RSI crossed below 50");
    }
    if macd_up {
        fired.push("MACD crossed above signal line");
    }
    if macd_down {
        fired.push("MACD crossed below signal line");
    }

    let direction = if rsi_up && macd_up {
        SignalDirection::Buy
    } else if rsi_down && macd_down {
        SignalDirection::Sell
    } else {
        SignalDirection::Hold
    };

    let reason = match (direction, fired.is_empty()) {
        (_, true) => format!("no crossover (RSI {:.2})", curr_rsi),
        (SignalDirection::Hold, false) => format!("unconfirmed: {}", fired.join(", ")),
        _ => fired.join(", "),
    };

    Signal {
        symbol: symbol.to_string(),
        direction,
        price: curr.close,
        timestamp: curr.timestamp,
        reason,
    }
}

fn threshold(
    symbol: &str,
    curr: &IndicatorSnapshot,
    holdings: Holdings,
    overbought: f64,
    oversold: f64,
    max_positions: usize,
) -> Signal {
    let rsi = curr.rsi.unwrap_or(NEUTRAL_RSI);
    let shown = round2(rsi);

    let (direction, reason) = if curr.rsi.is_none() {
        (
            SignalDirection::Hold,
            format!("insufficient history for RSI, using neutral {NEUTRAL_RSI}"),
        )
    } else if rsi > overbought && holdings.held {
        (
            SignalDirection::Sell,
            format!("RSI {shown} above overbought {overbought}, position held"),
        )
    } else if rsi < oversold && !holdings.held && holdings.open_positions < max_positions {
        (
            SignalDirection::Buy,
            format!(
                "RSI {shown} below oversold {oversold}, not held, {}/{} positions open",
                holdings.open_positions, max_positions
            ),
        )
    } else if rsi > overbought {
        (
            SignalDirection::Hold,
            format!("RSI {shown} above overbought {overbought} but not held"),
        )
    } else if rsi < oversold && holdings.held {
        (
            SignalDirection::Hold,
            format!("RSI {shown} below oversold {oversold} but already held"),
        )
    } else if rsi < oversold {
        (
            SignalDirection::Hold,
            format!("RSI {shown} below oversold {oversold} but max positions {max_positions} reached"),
        )
    } else {
        (
            SignalDirection::Hold,
            format!("RSI {shown} within {oversold}..{overbought}"),
        )
    };

    Signal {
        symbol: symbol.to_string(),
        direction,
        price: curr.close,
        timestamp: curr.timestamp,
        reason,
    }
}

fn hold(symbol: &str, snapshot: &IndicatorSnapshot, reason: &str) -> Signal {
    Signal {
        symbol: symbol.to_string(),
        direction: SignalDirection::Hold,
        price: snapshot.close,
        timestamp: snapshot.timestamp,
        reason: reason.to_string(),
    }
}
