//! Broker gateway port trait.
//!
//! The broker is the source of truth for what is actually held. Every call
//! must be bounded by the adapter's request timeout.

use crate::domain::error::BotError;
use crate::domain::trade::Side;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Account {
    pub cash: f64,
    pub equity: f64,
    pub buying_power: f64,
}

/// A live position as reported by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerPosition {
    pub symbol: String,
    pub quantity: f64,
    pub current_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInForce {
    Day,
    Gtc,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
        }
    }
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Day => "day",
            TimeInForce::Gtc => "gtc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub quantity: u64,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    pub fn market(symbol: &str, quantity: u64, side: Side) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity,
            side,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Gtc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Accepted,
    Filled,
    Rejected,
    Unknown,
}

impl OrderStatus {
    /// Broker status strings; anything unrecognised is `Unknown`.
    pub fn from_broker(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "filled" | "partially_filled" => OrderStatus::Filled,
            "new" | "accepted" | "pending_new" | "accepted_for_bidding" => OrderStatus::Accepted,
            "rejected" | "canceled" | "cancelled" | "expired" => OrderStatus::Rejected,
            _ => OrderStatus::Unknown,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Accepted => "accepted",
            OrderStatus::Filled => "filled",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub status: OrderStatus,
}

impl OrderConfirmation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self.status, OrderStatus::Accepted | OrderStatus::Filled)
    }

    /// Turns a rejected or ambiguous confirmation into the matching error.
    pub fn require_confirmed(self, symbol: &str) -> Result<Self, BotError> {
        match self.status {
            OrderStatus::Accepted | OrderStatus::Filled => Ok(self),
            OrderStatus::Rejected => Err(BotError::OrderFailed {
                symbol: symbol.to_string(),
                reason: format!("order {} rejected", self.order_id),
            }),
            OrderStatus::Unknown => Err(BotError::OrderAmbiguous {
                symbol: symbol.to_string(),
                status: self.status.to_string(),
            }),
        }
    }
}

pub trait BrokerGateway {
    fn get_account(&self) -> Result<Account, BotError>;

    fn get_positions(&self) -> Result<HashMap<String, BrokerPosition>, BotError>;

    fn submit_order(&self, order: &OrderRequest) -> Result<OrderConfirmation, BotError>;

    /// Flatten the whole position in `symbol`.
    fn close_position(&self, symbol: &str) -> Result<OrderConfirmation, BotError>;
}
