//! Momentum strategy: one entry pass over the configured symbols.
//!
//! For every symbol the strategy fetches bars, builds indicator snapshots,
//! asks the [`SignalGenerator`] for a direction and acts on it: a fresh entry
//! sized by the [`PositionSizer`], or liquidation of trades held on the other
//! side. Failures are isolated per symbol; only the account and position
//! queries at the start of the pass can fail the whole pass.

use crate::domain::config::{BalanceSource, BotConfig};
use crate::domain::error::BotError;
use crate::domain::exit_monitor::{ExitReason, ExitReport, PlannedExit, close_symbol};
use crate::domain::indicator::{IndicatorParams, compute_snapshots};
use crate::domain::ohlcv::Timeframe;
use crate::domain::signal::{Holdings, Signal, SignalDirection, SignalGenerator};
use crate::domain::sizing::PositionSizer;
use crate::domain::trade::{NewTrade, Side, Trade};
use crate::ports::broker_port::{BrokerGateway, BrokerPosition, OrderRequest};
use crate::ports::data_port::MarketDataProvider;
use crate::ports::ledger_port::TradeLedgerStore;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, error, info, info_span, warn};

/// Collaborators and clock for one cycle.
#[derive(Clone, Copy)]
pub struct CycleContext<'a> {
    pub market_data: &'a dyn MarketDataProvider,
    pub broker: &'a dyn BrokerGateway,
    pub ledger: &'a dyn TradeLedgerStore,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// What one cycle did, logged as its summary line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleReport {
    pub signals_evaluated: usize,
    pub opened: Vec<Trade>,
    pub closed: Vec<Trade>,
    pub skipped: Vec<SkippedSymbol>,
}

impl CycleReport {
    pub fn absorb_exits(&mut self, exits: ExitReport) {
        self.closed.extend(exits.closed);
        self.skipped.extend(exits.failed.into_iter().map(|f| SkippedSymbol {
            symbol: f.symbol,
            reason: format!("exit failed: {}", f.reason),
        }));
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} signals evaluated, {} opened, {} closed, {} skipped",
            self.signals_evaluated,
            self.opened.len(),
            self.closed.len(),
            self.skipped.len()
        )
    }
}

/// Result of a dry signal pass for one symbol.
#[derive(Debug)]
pub struct SymbolScan {
    pub symbol: String,
    pub signal: Result<Signal, BotError>,
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Enter(Side),
    Liquidate(Vec<Trade>),
    Pass,
    Skip(String),
}

/// What the account holds right now: broker positions plus the ledger's Open
/// trades, kept current as the pass opens and closes trades.
#[derive(Debug, Default)]
struct Book {
    positions: HashMap<String, BrokerPosition>,
    open: HashMap<String, Vec<Trade>>,
}

impl Book {
    fn load(ctx: &CycleContext<'_>) -> Result<Self, BotError> {
        let positions = ctx.broker.get_positions()?;
        let mut open: HashMap<String, Vec<Trade>> = HashMap::new();
        for trade in ctx.ledger.list_open_trades()? {
            open.entry(trade.symbol.clone()).or_default().push(trade);
        }
        Ok(Book { positions, open })
    }

    fn is_held(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol) || self.open.contains_key(symbol)
    }

    fn open_positions(&self) -> usize {
        self.positions
            .keys()
            .chain(self.open.keys())
            .collect::<BTreeSet<_>>()
            .len()
    }

    fn holdings(&self, symbol: &str) -> Holdings {
        Holdings {
            held: self.is_held(symbol),
            open_positions: self.open_positions(),
        }
    }

    fn record_open(&mut self, trade: &Trade) {
        self.open
            .entry(trade.symbol.clone())
            .or_default()
            .push(trade.clone());
    }

    fn record_flat(&mut self, symbol: &str) {
        self.positions.remove(symbol);
        self.open.remove(symbol);
    }
}

pub struct MomentumStrategy {
    symbols: Vec<String>,
    timeframe: Timeframe,
    bar_limit: usize,
    strategy_tag: String,
    max_positions: usize,
    allow_shorting: bool,
    balance_source: BalanceSource,
    indicators: IndicatorParams,
    generator: SignalGenerator,
    sizer: PositionSizer,
}

impl MomentumStrategy {
    pub fn from_config(config: &BotConfig) -> Self {
        MomentumStrategy {
            symbols: config.symbols.clone(),
            timeframe: config.timeframe,
            bar_limit: config.bar_limit,
            strategy_tag: config.strategy_tag.clone(),
            max_positions: config.max_positions,
            allow_shorting: config.allow_shorting,
            balance_source: config.balance_source,
            indicators: config.signals.indicators,
            generator: SignalGenerator::new(config.rule_set()),
            sizer: config.sizer(),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn generator(&self) -> &SignalGenerator {
        &self.generator
    }

    /// Run the entry pass and return the trades it opened.
    pub fn execute(&self, ctx: &CycleContext<'_>) -> Result<Vec<Trade>, BotError> {
        Ok(self.execute_with_report(ctx)?.opened)
    }

    pub fn execute_with_report(&self, ctx: &CycleContext<'_>) -> Result<CycleReport, BotError> {
        let account = ctx.broker.get_account()?;
        let balance = match self.balance_source {
            BalanceSource::Cash => account.cash,
            BalanceSource::Equity => account.equity,
        };
        let mut book = Book::load(ctx)?;
        let mut report = CycleReport::default();

        for symbol in &self.symbols {
            let _span = info_span!("symbol", symbol = %symbol).entered();
            let signal = match self.signal_for(ctx, symbol, book.holdings(symbol)) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!(error = %e, "no signal this cycle; holding");
                    report.skipped.push(SkippedSymbol {
                        symbol: symbol.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            report.signals_evaluated += 1;
            info!(
                direction = %signal.direction,
                price = signal.price,
                reason = %signal.reason,
                "signal"
            );

            match self.decide(&signal, &book) {
                Action::Pass => {}
                Action::Skip(reason) => {
                    info!(reason = %reason, "signal not acted on");
                    report.skipped.push(SkippedSymbol {
                        symbol: symbol.clone(),
                        reason,
                    });
                }
                Action::Enter(side) => match self.enter(ctx, &signal, side, balance) {
                    Ok(Some(trade)) => {
                        book.record_open(&trade);
                        report.opened.push(trade);
                    }
                    Ok(None) => report.skipped.push(SkippedSymbol {
                        symbol: symbol.clone(),
                        reason: "position size is zero".into(),
                    }),
                    Err(e) => {
                        warn!(error = %e, "entry not taken");
                        report.skipped.push(SkippedSymbol {
                            symbol: symbol.clone(),
                            reason: e.to_string(),
                        });
                    }
                },
                Action::Liquidate(trades) => {
                    let price = book
                        .positions
                        .get(symbol)
                        .map(|p| p.current_price)
                        .unwrap_or(signal.price);
                    let exit = PlannedExit {
                        symbol: symbol.clone(),
                        price,
                        reason: ExitReason::Signal,
                        trades,
                    };
                    match close_symbol(&exit, ctx.ledger, ctx.broker, ctx.now) {
                        Ok(mut closed) => {
                            book.record_flat(symbol);
                            report.closed.append(&mut closed);
                        }
                        Err(e) => report.skipped.push(SkippedSymbol {
                            symbol: symbol.clone(),
                            reason: e.to_string(),
                        }),
                    }
                }
            }
        }

        Ok(report)
    }

    /// Dry pass: the signal each symbol would act on, without placing orders.
    pub fn scan(&self, ctx: &CycleContext<'_>) -> Result<Vec<SymbolScan>, BotError> {
        let book = Book::load(ctx)?;
        Ok(self
            .symbols
            .iter()
            .map(|symbol| SymbolScan {
                symbol: symbol.clone(),
                signal: self.signal_for(ctx, symbol, book.holdings(symbol)),
            })
            .collect())
    }

    fn signal_for(
        &self,
        ctx: &CycleContext<'_>,
        symbol: &str,
        holdings: Holdings,
    ) -> Result<Signal, BotError> {
        let bars = ctx
            .market_data
            .get_historical_bars(symbol, self.timeframe, self.bar_limit)?;
        if bars.len() < self.indicators.min_bars() {
            debug!(
                bars = bars.len(),
                minimum = self.indicators.min_bars(),
                "short history; indicators may still be warming up"
            );
        }
        let snapshots = compute_snapshots(&bars, &self.indicators);
        self.generator
            .generate(symbol, &snapshots, holdings)
            .ok_or_else(|| BotError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no bars returned".into(),
            })
    }

    fn decide(&self, signal: &Signal, book: &Book) -> Action {
        let side = match signal.direction {
            SignalDirection::Hold => return Action::Pass,
            SignalDirection::Buy => Side::Buy,
            SignalDirection::Sell => Side::Sell,
        };

        if let Some(trades) = book.open.get(&signal.symbol) {
            let against: Vec<Trade> = trades
                .iter()
                .filter(|t| t.side == side.opposite())
                .cloned()
                .collect();
            if !against.is_empty() {
                return Action::Liquidate(against);
            }
        }
        if book.is_held(&signal.symbol) {
            return Action::Skip(format!("{side} signal but symbol already held"));
        }
        if side == Side::Sell && !self.allow_shorting {
            return Action::Skip("sell signal with nothing held and shorting disabled".into());
        }
        if book.open_positions() >= self.max_positions {
            return Action::Skip(format!(
                "max positions reached ({}/{})",
                book.open_positions(),
                self.max_positions
            ));
        }
        Action::Enter(side)
    }

    /// Size, submit and record one entry. `Ok(None)` when the size is zero.
    fn enter(
        &self,
        ctx: &CycleContext<'_>,
        signal: &Signal,
        side: Side,
        balance: f64,
    ) -> Result<Option<Trade>, BotError> {
        let quantity = self.sizer.size(balance, signal.price, None);
        if quantity == 0 {
            info!(balance, price = signal.price, "position size is zero; skipping");
            return Ok(None);
        }

        let new = NewTrade::new(
            &signal.symbol,
            side,
            signal.price,
            quantity,
            ctx.now,
            &self.strategy_tag,
        )?;
        let order = OrderRequest::market(&signal.symbol, quantity, side);
        let confirmation = ctx
            .broker
            .submit_order(&order)?
            .require_confirmed(&signal.symbol)?;

        let id = ctx.ledger.create_trade(&new).inspect_err(|e| {
            error!(
                order_id = %confirmation.order_id,
                error = %e,
                "entry confirmed by broker but ledger write failed"
            );
        })?;

        info!(
            trade_id = id,
            order_id = %confirmation.order_id,
            side = %side,
            quantity,
            price = signal.price,
            "trade opened"
        );
        Ok(Some(Trade::opened(id, new)))
    }
}
