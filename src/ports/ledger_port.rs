//! Trade ledger port trait.
//!
//! The ledger is the durable record of trades. The core only decides
//! transitions; storage format belongs to the adapter.

use crate::domain::error::BotError;
use crate::domain::trade::{NewTrade, Trade, TradeExit};

pub trait TradeLedgerStore {
    /// Persist a freshly opened trade and return its id.
    fn create_trade(&self, trade: &NewTrade) -> Result<i64, BotError>;

    /// Record the Closed transition for trade `id`.
    fn update_trade(&self, id: i64, exit: &TradeExit) -> Result<(), BotError>;

    fn list_open_trades(&self) -> Result<Vec<Trade>, BotError>;

    /// Every trade, open and closed, oldest first.
    fn list_trades(&self) -> Result<Vec<Trade>, BotError>;
}
