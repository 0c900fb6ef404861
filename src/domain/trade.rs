//! Trade records and their Open -> Closed lifecycle.
//!
//! A trade is created only after its entry order is confirmed and is closed
//! only after its exit order is confirmed. Closed is terminal.

use crate::domain::error::BotError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "long" => Ok(Side::Buy),
            "sell" | "short" => Ok(Side::Sell),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeStatus {
    Open,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "open",
            TradeStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(TradeStatus::Open),
            "closed" => Ok(TradeStatus::Closed),
            other => Err(format!("unknown trade status '{other}'")),
        }
    }
}

/// Realized profit of a round trip; positive when the trade made money.
pub fn realized_pnl(side: Side, entry_price: f64, exit_price: f64, quantity: u64) -> f64 {
    match side {
        Side::Buy => (exit_price - entry_price) * quantity as f64,
        Side::Sell => (entry_price - exit_price) * quantity as f64,
    }
}

/// Creation request handed to the ledger once an entry order is confirmed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub quantity: u64,
    pub entry_time: DateTime<Utc>,
    pub strategy_tag: String,
}

impl NewTrade {
    pub fn new(
        symbol: &str,
        side: Side,
        entry_price: f64,
        quantity: u64,
        entry_time: DateTime<Utc>,
        strategy_tag: &str,
    ) -> Result<Self, BotError> {
        if quantity == 0 {
            return Err(BotError::OrderFailed {
                symbol: symbol.to_string(),
                reason: "trade quantity must be positive".into(),
            });
        }
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(BotError::OrderFailed {
                symbol: symbol.to_string(),
                reason: format!("invalid entry price {entry_price}"),
            });
        }
        Ok(Self {
            symbol: symbol.to_string(),
            side,
            entry_price,
            quantity,
            entry_time,
            strategy_tag: strategy_tag.to_string(),
        })
    }
}

/// The Closed transition payload written back to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeExit {
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub pnl: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub id: i64,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub quantity: u64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub pnl: Option<f64>,
    pub strategy_tag: String,
    pub status: TradeStatus,
}

impl Trade {
    pub fn opened(id: i64, new: NewTrade) -> Self {
        Trade {
            id,
            symbol: new.symbol,
            side: new.side,
            entry_price: new.entry_price,
            exit_price: None,
            quantity: new.quantity,
            entry_time: new.entry_time,
            exit_time: None,
            pnl: None,
            strategy_tag: new.strategy_tag,
            status: TradeStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        realized_pnl(self.side, self.entry_price, price, self.quantity)
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    /// Open -> Closed. Fails without touching the trade if it is already closed.
    pub fn close(
        &mut self,
        exit_price: f64,
        exit_time: DateTime<Utc>,
    ) -> Result<TradeExit, BotError> {
        if !self.is_open() {
            return Err(BotError::InvalidTransition {
                id: self.id,
                reason: "trade is already closed".into(),
            });
        }
        if !exit_price.is_finite() || exit_price <= 0.0 {
            return Err(BotError::InvalidTransition {
                id: self.id,
                reason: format!("invalid exit price {exit_price}"),
            });
        }

        let exit = TradeExit {
            exit_price,
            exit_time,
            pnl: self.unrealized_pnl(exit_price),
        };
        self.apply_exit(&exit);
        Ok(exit)
    }

    pub(crate) fn apply_exit(&mut self, exit: &TradeExit) {
        self.exit_price = Some(exit.exit_price);
        self.exit_time = Some(exit.exit_time);
        self.pnl = Some(exit.pnl);
        self.status = TradeStatus::Closed;
    }
}
