//! Exit policy for open trades (fixed stop-loss / take-profit bracket).
//!
//! Each pass re-derives its decisions from the ledger's Open trades and the
//! broker's live positions, so repeating a pass is safe. A trade is marked
//! Closed only after the broker confirms the close.

use crate::domain::error::BotError;
use crate::domain::trade::{Side, Trade};
use crate::ports::broker_port::{BrokerGateway, BrokerPosition};
use crate::ports::ledger_port::TradeLedgerStore;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{error, info, warn};

/// Slack on threshold comparisons so exact boundary prices trigger.
const PRICE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitPolicy {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for ExitPolicy {
    fn default() -> Self {
        ExitPolicy {
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Signal,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop-loss"),
            ExitReason::TakeProfit => write!(f, "take-profit"),
            ExitReason::Signal => write!(f, "sell signal"),
        }
    }
}

impl ExitPolicy {
    pub fn stop_price(&self, trade: &Trade) -> f64 {
        match trade.side {
            Side::Buy => trade.entry_price * (1.0 - self.stop_loss_pct),
            Side::Sell => trade.entry_price * (1.0 + self.stop_loss_pct),
        }
    }

    pub fn take_profit_price(&self, trade: &Trade) -> f64 {
        match trade.side {
            Side::Buy => trade.entry_price * (1.0 + self.take_profit_pct),
            Side::Sell => trade.entry_price * (1.0 - self.take_profit_pct),
        }
    }

    pub fn evaluate(&self, trade: &Trade, current_price: f64) -> Option<ExitReason> {
        let stop = self.stop_price(trade);
        let target = self.take_profit_price(trade);
        match trade.side {
            Side::Buy if current_price <= stop + PRICE_EPSILON => Some(ExitReason::StopLoss),
            Side::Buy if current_price >= target - PRICE_EPSILON => Some(ExitReason::TakeProfit),
            Side::Sell if current_price >= stop - PRICE_EPSILON => Some(ExitReason::StopLoss),
            Side::Sell if current_price <= target + PRICE_EPSILON => Some(ExitReason::TakeProfit),
            _ => None,
        }
    }
}

/// One broker close covering every Open trade in `symbol`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedExit {
    pub symbol: String,
    pub price: f64,
    pub reason: ExitReason,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExitPlan {
    pub exits: Vec<PlannedExit>,
    /// Open trades whose symbol the broker no longer reports.
    pub unreconciled: Vec<Trade>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedExit {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExitReport {
    pub evaluated: usize,
    pub closed: Vec<Trade>,
    pub failed: Vec<FailedExit>,
    pub unreconciled: Vec<Trade>,
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} exits evaluated, {} closed, {} failed, {} unreconciled",
            self.evaluated,
            self.closed.len(),
            self.failed.len(),
            self.unreconciled.len()
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExitMonitor {
    policy: ExitPolicy,
}

impl ExitMonitor {
    pub fn new(policy: ExitPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ExitPolicy {
        &self.policy
    }

    /// Pure decision step: which symbols to flatten, and which trades have no
    /// live position behind them.
    pub fn plan(
        &self,
        open_trades: Vec<Trade>,
        positions: &HashMap<String, BrokerPosition>,
    ) -> ExitPlan {
        let mut by_symbol: BTreeMap<String, Vec<Trade>> = BTreeMap::new();
        for trade in open_trades.into_iter().filter(Trade::is_open) {
            by_symbol.entry(trade.symbol.clone()).or_default().push(trade);
        }

        let mut plan = ExitPlan::default();
        for (symbol, trades) in by_symbol {
            let Some(position) = positions.get(&symbol) else {
                plan.unreconciled.extend(trades);
                continue;
            };
            let price = position.current_price;
            let reason = trades
                .iter()
                .filter_map(|t| self.policy.evaluate(t, price))
                .next();
            if let Some(reason) = reason {
                plan.exits.push(PlannedExit {
                    symbol,
                    price,
                    reason,
                    trades,
                });
            }
        }
        plan
    }

    /// Scan every Open trade against live positions and close those past the
    /// bracket.
    pub fn manage_open_positions(
        &self,
        ledger: &dyn TradeLedgerStore,
        broker: &dyn BrokerGateway,
        now: DateTime<Utc>,
    ) -> Result<ExitReport, BotError> {
        let open_trades = ledger.list_open_trades()?;
        let evaluated = open_trades.len();
        if open_trades.is_empty() {
            return Ok(ExitReport::default());
        }
        let positions = broker.get_positions()?;
        let plan = self.plan(open_trades, &positions);

        let mut report = ExitReport {
            evaluated,
            ..ExitReport::default()
        };

        for trade in &plan.unreconciled {
            warn!(
                trade_id = trade.id,
                symbol = %trade.symbol,
                "open trade has no broker position; left open pending reconciliation"
            );
        }
        report.unreconciled = plan.unreconciled;

        for exit in plan.exits {
            match close_symbol(&exit, ledger, broker, now) {
                Ok(mut closed) => report.closed.append(&mut closed),
                Err(e) => report.failed.push(FailedExit {
                    symbol: exit.symbol.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        Ok(report)
    }
}

/// Flatten `exit.symbol` at the broker, then commit the Closed transition for
/// each trade. Nothing is written unless the broker confirms.
pub(crate) fn close_symbol(
    exit: &PlannedExit,
    ledger: &dyn TradeLedgerStore,
    broker: &dyn BrokerGateway,
    now: DateTime<Utc>,
) -> Result<Vec<Trade>, BotError> {
    let confirmation = broker
        .close_position(&exit.symbol)
        .and_then(|c| c.require_confirmed(&exit.symbol))
        .inspect_err(|e| {
            warn!(symbol = %exit.symbol, error = %e, "exit order not confirmed; will re-check next cycle");
        })?;

    let mut closed = Vec::with_capacity(exit.trades.len());
    let mut first_error = None;
    for trade in &exit.trades {
        let mut trade = trade.clone();
        let result = trade
            .close(exit.price, now)
            .and_then(|fill| ledger.update_trade(trade.id, &fill));
        match result {
            Ok(()) => {
                info!(
                    trade_id = trade.id,
                    symbol = %trade.symbol,
                    order_id = %confirmation.order_id,
                    exit_price = exit.price,
                    pnl = trade.pnl.unwrap_or_default(),
                    reason = %exit.reason,
                    "trade closed"
                );
                closed.push(trade);
            }
            Err(e) => {
                error!(
                    trade_id = trade.id,
                    symbol = %exit.symbol,
                    error = %e,
                    "exit confirmed by broker but ledger update failed"
                );
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if closed.is_empty() => Err(e),
        _ => Ok(closed),
    }
}
