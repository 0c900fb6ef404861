#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use momtrader::domain::config::BotConfig;
use momtrader::domain::error::BotError;
use momtrader::domain::ohlcv::{Bar, Timeframe};
use momtrader::domain::trade::{NewTrade, Trade, TradeExit, TradeStatus};
use momtrader::ports::broker_port::{
    Account, BrokerGateway, BrokerPosition, OrderConfirmation, OrderRequest, OrderStatus,
};
use momtrader::ports::data_port::MarketDataProvider;
use momtrader::ports::ledger_port::TradeLedgerStore;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap()
}

pub fn bar(i: usize, close: f64) -> Bar {
    Bar {
        timestamp: t0() + Duration::minutes(15 * i as i64),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000.0,
    }
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes.iter().enumerate().map(|(i, &c)| bar(i, c)).collect()
}

/// `flat` bars at 100, then one bar at `last`. A jump up fires the crossover
/// Buy on the last bar; a drop fires the Sell.
pub fn flat_then(flat: usize, last: f64) -> Vec<Bar> {
    let mut closes = vec![100.0; flat];
    closes.push(last);
    bars_from_closes(&closes)
}

pub fn test_config(symbols: &[&str]) -> BotConfig {
    BotConfig {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        ..BotConfig::default()
    }
}

pub fn open_trade(id: i64, symbol: &str, entry: f64, qty: u64) -> Trade {
    Trade::opened(
        id,
        NewTrade::new(
            symbol,
            momtrader::domain::trade::Side::Buy,
            entry,
            qty,
            t0(),
            "momentum",
        )
        .unwrap(),
    )
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

pub struct MockMarketData {
    pub bars: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
    pub requests: RefCell<Vec<(String, Timeframe, usize)>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            errors: HashMap::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataProvider for MockMarketData {
    fn get_historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, BotError> {
        self.requests
            .borrow_mut()
            .push((symbol.to_string(), timeframe, limit));
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BotError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        match self.bars.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let skip = bars.len().saturating_sub(limit);
                Ok(bars[skip..].to_vec())
            }
            _ => Err(BotError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no bars".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

pub struct MockBroker {
    pub account: Account,
    pub positions: RefCell<HashMap<String, BrokerPosition>>,
    pub order_status: Cell<OrderStatus>,
    pub close_status: Cell<OrderStatus>,
    pub order_error: RefCell<Option<String>>,
    pub fail_account: Cell<bool>,
    pub orders: RefCell<Vec<OrderRequest>>,
    pub closes: RefCell<Vec<String>>,
    next_id: Cell<u64>,
}

impl MockBroker {
    pub fn new(cash: f64) -> Self {
        Self {
            account: Account {
                cash,
                equity: cash,
                buying_power: cash,
            },
            positions: RefCell::new(HashMap::new()),
            order_status: Cell::new(OrderStatus::Filled),
            close_status: Cell::new(OrderStatus::Filled),
            order_error: RefCell::new(None),
            fail_account: Cell::new(false),
            orders: RefCell::new(Vec::new()),
            closes: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn set_position(&self, symbol: &str, quantity: f64, price: f64) {
        self.positions.borrow_mut().insert(
            symbol.to_string(),
            BrokerPosition {
                symbol: symbol.to_string(),
                quantity,
                current_price: price,
            },
        );
    }

    pub fn order_count(&self) -> usize {
        self.orders.borrow().len()
    }

    pub fn close_count(&self) -> usize {
        self.closes.borrow().len()
    }

    fn confirmation(&self, status: OrderStatus) -> OrderConfirmation {
        self.next_id.set(self.next_id.get() + 1);
        OrderConfirmation {
            order_id: format!("mock-{}", self.next_id.get()),
            status,
        }
    }
}

impl BrokerGateway for MockBroker {
    fn get_account(&self) -> Result<Account, BotError> {
        if self.fail_account.get() {
            return Err(BotError::broker("account endpoint timed out"));
        }
        Ok(self.account)
    }

    fn get_positions(&self) -> Result<HashMap<String, BrokerPosition>, BotError> {
        Ok(self.positions.borrow().clone())
    }

    fn submit_order(&self, order: &OrderRequest) -> Result<OrderConfirmation, BotError> {
        self.orders.borrow_mut().push(order.clone());
        if let Some(reason) = self.order_error.borrow().clone() {
            return Err(BotError::OrderFailed {
                symbol: order.symbol.clone(),
                reason,
            });
        }
        Ok(self.confirmation(self.order_status.get()))
    }

    fn close_position(&self, symbol: &str) -> Result<OrderConfirmation, BotError> {
        self.closes.borrow_mut().push(symbol.to_string());
        let confirmation = self.confirmation(self.close_status.get());
        if confirmation.is_confirmed() {
            self.positions.borrow_mut().remove(symbol);
        }
        Ok(confirmation)
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub struct MockLedger {
    pub trades: RefCell<Vec<Trade>>,
    pub fail_writes: Cell<bool>,
    pub updates: RefCell<Vec<i64>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            trades: RefCell::new(Vec::new()),
            fail_writes: Cell::new(false),
            updates: RefCell::new(Vec::new()),
        }
    }

    pub fn with_trades(trades: Vec<Trade>) -> Self {
        let ledger = Self::new();
        *ledger.trades.borrow_mut() = trades;
        ledger
    }

    pub fn open_count(&self) -> usize {
        self.trades.borrow().iter().filter(|t| t.is_open()).count()
    }

    pub fn get(&self, id: i64) -> Option<Trade> {
        self.trades.borrow().iter().find(|t| t.id == id).cloned()
    }
}

impl TradeLedgerStore for MockLedger {
    fn create_trade(&self, trade: &NewTrade) -> Result<i64, BotError> {
        if self.fail_writes.get() {
            return Err(BotError::ledger("disk full"));
        }
        let mut trades = self.trades.borrow_mut();
        let id = trades.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        trades.push(Trade::opened(id, trade.clone()));
        Ok(id)
    }

    fn update_trade(&self, id: i64, exit: &TradeExit) -> Result<(), BotError> {
        if self.fail_writes.get() {
            return Err(BotError::ledger("disk full"));
        }
        self.updates.borrow_mut().push(id);
        let mut trades = self.trades.borrow_mut();
        let trade = trades
            .iter_mut()
            .find(|t| t.id == id && t.is_open())
            .ok_or_else(|| BotError::InvalidTransition {
                id,
                reason: "no open trade with this id".into(),
            })?;
        trade.exit_price = Some(exit.exit_price);
        trade.exit_time = Some(exit.exit_time);
        trade.pnl = Some(exit.pnl);
        trade.status = TradeStatus::Closed;
        Ok(())
    }

    fn list_open_trades(&self) -> Result<Vec<Trade>, BotError> {
        Ok(self
            .trades
            .borrow()
            .iter()
            .filter(|t| t.is_open())
            .cloned()
            .collect())
    }

    fn list_trades(&self) -> Result<Vec<Trade>, BotError> {
        Ok(self.trades.borrow().clone())
    }
}
