//! In-process paper broker.
//!
//! Fills market orders immediately at the latest close reported by a
//! [`MarketDataProvider`] and keeps cash and signed positions in memory.

use crate::domain::error::BotError;
use crate::domain::ohlcv::Timeframe;
use crate::domain::trade::Side;
use crate::ports::broker_port::{
    Account, BrokerGateway, BrokerPosition, OrderConfirmation, OrderRequest, OrderStatus,
};
use crate::ports::data_port::MarketDataProvider;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Holding {
    /// Positive long, negative short.
    quantity: f64,
}

#[derive(Debug, Default)]
struct PaperState {
    cash: f64,
    holdings: HashMap<String, Holding>,
    next_order: u64,
}

pub struct PaperBroker<D> {
    data: D,
    timeframe: Timeframe,
    state: Mutex<PaperState>,
}

impl<D: MarketDataProvider> PaperBroker<D> {
    pub fn new(data: D, timeframe: Timeframe, starting_cash: f64) -> Self {
        PaperBroker {
            data,
            timeframe,
            state: Mutex::new(PaperState {
                cash: starting_cash,
                ..PaperState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn latest_price(&self, symbol: &str) -> Result<f64, BotError> {
        self.data
            .get_historical_bars(symbol, self.timeframe, 1)?
            .last()
            .map(|bar| bar.close)
            .ok_or_else(|| BotError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no price to fill against".into(),
            })
    }

    fn fill(&self, symbol: &str, side: Side, quantity: f64) -> Result<OrderConfirmation, BotError> {
        let price = self.latest_price(symbol).map_err(|e| BotError::OrderFailed {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })?;
        let signed = match side {
            Side::Buy => quantity,
            Side::Sell => -quantity,
        };

        let mut state = self.state();
        state.next_order += 1;
        let order_id = format!("paper-{}", state.next_order);

        let cost = signed * price;
        let current = state.holdings.get(symbol).map_or(0.0, |h| h.quantity);
        let opening_long = signed > 0.0 && current >= 0.0;
        if opening_long && cost > state.cash {
            info!(symbol, cost, cash = state.cash, "paper order rejected: insufficient cash");
            return Ok(OrderConfirmation {
                order_id,
                status: OrderStatus::Rejected,
            });
        }

        state.cash -= cost;
        let remaining = current + signed;
        if remaining.abs() < f64::EPSILON {
            state.holdings.remove(symbol);
        } else {
            state.holdings.insert(symbol.to_string(), Holding { quantity: remaining });
        }

        debug!(symbol, %side, quantity, price, order_id = %order_id, "paper fill");
        Ok(OrderConfirmation {
            order_id,
            status: OrderStatus::Filled,
        })
    }
}

impl<D: MarketDataProvider> BrokerGateway for PaperBroker<D> {
    fn get_account(&self) -> Result<Account, BotError> {
        let (cash, holdings) = {
            let state = self.state();
            (state.cash, state.holdings.clone())
        };
        let mut market_value = 0.0;
        for (symbol, h) in &holdings {
            let price = self
                .latest_price(symbol)
                .map_err(|e| BotError::broker(format!("cannot mark {symbol}: {e}")))?;
            market_value += h.quantity * price;
        }
        Ok(Account {
            cash,
            equity: cash + market_value,
            buying_power: cash,
        })
    }

    fn get_positions(&self) -> Result<HashMap<String, BrokerPosition>, BotError> {
        let holdings = self.state().holdings.clone();
        let mut positions = HashMap::with_capacity(holdings.len());
        for (symbol, h) in holdings {
            // Holdings without a current price are omitted.
            let current_price = match self.latest_price(&symbol) {
                Ok(price) => price,
                Err(e) => {
                    warn!(symbol = %symbol, quantity = h.quantity, error = %e, "no price for paper position; omitted");
                    continue;
                }
            };
            positions.insert(
                symbol.clone(),
                BrokerPosition {
                    symbol,
                    quantity: h.quantity,
                    current_price,
                },
            );
        }
        Ok(positions)
    }

    fn submit_order(&self, order: &OrderRequest) -> Result<OrderConfirmation, BotError> {
        if order.quantity == 0 {
            return Err(BotError::OrderFailed {
                symbol: order.symbol.clone(),
                reason: "quantity must be positive".into(),
            });
        }
        self.fill(&order.symbol, order.side, order.quantity as f64)
    }

    fn close_position(&self, symbol: &str) -> Result<OrderConfirmation, BotError> {
        let quantity = self
            .state()
            .holdings
            .get(symbol)
            .map(|h| h.quantity)
            .ok_or_else(|| BotError::OrderFailed {
                symbol: symbol.to_string(),
                reason: "no open position".into(),
            })?;
        let side = if quantity > 0.0 { Side::Sell } else { Side::Buy };
        self.fill(symbol, side, quantity.abs())
    }
}
