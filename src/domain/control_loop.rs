//! Fixed-interval control loop with failure isolation and backoff.

use crate::domain::config::BotConfig;
use crate::domain::error::BotError;
use crate::domain::exit_monitor::ExitMonitor;
use crate::domain::strategy::{CycleContext, CycleReport, MomentumStrategy};
use crate::ports::broker_port::BrokerGateway;
use crate::ports::data_port::MarketDataProvider;
use crate::ports::ledger_port::TradeLedgerStore;
use chrono::{DateTime, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, info, info_span, warn};

/// Shared stop flag. Cloning shares the flag; a waiting loop wakes as soon
/// as shutdown is requested.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep up to `timeout`; returns true if shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |requested| !*requested)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

pub struct ControlLoop<'a> {
    strategy: MomentumStrategy,
    monitor: ExitMonitor,
    market_data: &'a dyn MarketDataProvider,
    broker: &'a dyn BrokerGateway,
    ledger: &'a dyn TradeLedgerStore,
    interval: Duration,
    backoff: Duration,
    max_cycles: Option<usize>,
    shutdown: ShutdownSignal,
}

impl<'a> ControlLoop<'a> {
    pub fn new(
        config: &BotConfig,
        market_data: &'a dyn MarketDataProvider,
        broker: &'a dyn BrokerGateway,
        ledger: &'a dyn TradeLedgerStore,
        shutdown: ShutdownSignal,
    ) -> Self {
        ControlLoop {
            strategy: MomentumStrategy::from_config(config),
            monitor: ExitMonitor::new(config.exit_policy()),
            market_data,
            broker,
            ledger,
            interval: config.schedule.interval,
            backoff: config.schedule.backoff,
            max_cycles: None,
            shutdown,
        }
    }

    pub fn with_timing(mut self, interval: Duration, backoff: Duration) -> Self {
        self.interval = interval;
        self.backoff = backoff;
        self
    }

    /// Stop after `n` cycles (`--once` is `Some(1)`).
    pub fn with_max_cycles(mut self, n: usize) -> Self {
        self.max_cycles = Some(n);
        self
    }

    /// Entries for every symbol, then the exit pass over all Open trades.
    /// The exit pass runs even when the entry pass fails.
    pub fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, BotError> {
        let ctx = CycleContext {
            market_data: self.market_data,
            broker: self.broker,
            ledger: self.ledger,
            now,
        };

        let entries = self.strategy.execute_with_report(&ctx);
        if let Err(e) = &entries {
            warn!(error = %e, "entry pass failed; still checking exits");
        }
        let exits = self.monitor.manage_open_positions(self.ledger, self.broker, now);

        match (entries, exits) {
            (Ok(mut report), Ok(exits)) => {
                report.absorb_exits(exits);
                Ok(report)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(exits)) => {
                warn!(summary = %exits, "exit pass finished after failed entry pass");
                Err(e)
            }
            (Err(e), Err(exit_err)) => {
                error!(error = %exit_err, "exit pass failed too");
                Err(e)
            }
        }
    }

    /// Run until shutdown is requested or `max_cycles` is reached. Returns the
    /// number of cycles run. Cycle failures are logged and backed off; only
    /// configuration errors end the loop early.
    pub fn run(&self) -> Result<usize, BotError> {
        info!(
            symbols = ?self.strategy.symbols(),
            rules = %self.strategy.generator().rule_set(),
            interval_secs = self.interval.as_secs(),
            "control loop starting"
        );

        let mut cycles = 0usize;
        while !self.shutdown.is_requested() {
            cycles += 1;
            let span = info_span!("cycle", n = cycles);
            let outcome = span.in_scope(|| {
                panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle(Utc::now())))
            });

            let pause = match outcome {
                Ok(Ok(report)) => {
                    info!(cycle = cycles, summary = %report, "cycle complete");
                    self.interval
                }
                Ok(Err(e)) if e.is_config() => return Err(e),
                Ok(Err(e)) => {
                    error!(cycle = cycles, error = %e, backoff_secs = self.backoff.as_secs(), "cycle failed; backing off");
                    self.backoff
                }
                Err(_) => {
                    error!(cycle = cycles, backoff_secs = self.backoff.as_secs(), "cycle panicked; backing off");
                    self.backoff
                }
            };

            if self.max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }
            if self.shutdown.wait_timeout(pause) {
                break;
            }
        }

        info!(cycles, "control loop stopped");
        Ok(cycles)
    }
}
