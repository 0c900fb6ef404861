//! End-to-end tests over mock ports: entries, exits, reconciliation and the
//! control loop.

mod common;

use chrono::Duration as ChronoDuration;
use common::*;
use momtrader::domain::control_loop::{ControlLoop, ShutdownSignal};
use momtrader::domain::error::BotError;
use momtrader::domain::exit_monitor::ExitMonitor;
use momtrader::domain::ohlcv::{Bar, Timeframe};
use momtrader::domain::signal::SignalDirection;
use momtrader::domain::strategy::{CycleContext, MomentumStrategy};
use momtrader::domain::trade::{Side, TradeStatus};
use momtrader::ports::broker_port::OrderStatus;
use momtrader::ports::data_port::MarketDataProvider;
use std::time::Duration;

fn ctx<'a>(data: &'a MockMarketData, broker: &'a MockBroker, ledger: &'a MockLedger) -> CycleContext<'a> {
    CycleContext {
        market_data: data,
        broker,
        ledger,
        now: t0() + ChronoDuration::hours(12),
    }
}

mod entries {
    use super::*;

    #[test]
    fn crossover_buy_opens_one_sized_trade() {
        let data = MockMarketData::new().with_bars("TEST", flat_then(40, 102.0));
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::new();
        let strategy = MomentumStrategy::from_config(&test_config(&["TEST"]));

        let report = strategy.execute_with_report(&ctx(&data, &broker, &ledger)).unwrap();

        assert_eq!(report.signals_evaluated, 1);
        assert_eq!(report.opened.len(), 1);
        let trade = &report.opened[0];
        assert_eq!(trade.symbol, "TEST");
        assert_eq!(trade.side, Side::Buy);
        assert_eq!(trade.quantity, 49);
        assert_eq!(trade.entry_price, 102.0);
        assert_eq!(trade.status, TradeStatus::Open);

        let orders = broker.orders.borrow();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].quantity, 49);
        assert_eq!(orders[0].side, Side::Buy);

        let stored = ledger.trades.borrow();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, trade.id);
        assert_eq!(stored[0].strategy_tag, "momentum");
    }

    #[test]
    fn bar_request_uses_configured_timeframe_and_limit() {
        let data = MockMarketData::new().with_bars("TEST", flat_then(40, 100.0));
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::new();
        let strategy = MomentumStrategy::from_config(&test_config(&["TEST"]));

        strategy.execute(&ctx(&data, &broker, &ledger)).unwrap();

        let requests = data.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0], ("TEST".to_string(), Timeframe::Minute15, 100));
    }

    #[test]
    fn flat_market_holds() {
        let data = MockMarketData::new().with_bars("TEST", flat_then(40, 100.0));
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::new();
        let strategy = MomentumStrategy::from_config(&test_config(&["TEST"]));

        let report = strategy.execute_with_report(&ctx(&data, &broker, &ledger)).unwrap();
        assert_eq!(report.signals_evaluated, 1);
        assert!(report.opened.is_empty());
        assert!(report.skipped.is_empty());
        assert_eq!(broker.order_count(), 0);
    }

    #[test]
    fn held_symbol_is_not_bought_again() {
        let data = MockMarketData::new().with_bars("TEST", flat_then(40, 102.0));
        let broker = MockBroker::new(10_000.0);
        broker.set_position("TEST", 10.0, 102.0);
        let ledger = MockLedger::with_trades(vec![open_trade(1, "TEST", 100.0, 10)]);
        let strategy = MomentumStrategy::from_config(&test_config(&["TEST"]));

        let report = strategy.execute_with_report(&ctx(&data, &broker, &ledger)).unwrap();
        assert!(report.opened.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("already held"));
        assert_eq!(broker.order_count(), 0);
    }

    #[test]
    fn max_positions_gate_blocks_new_entries() {
        let data = MockMarketData::new().with_bars("TEST", flat_then(40, 102.0));
        let broker = MockBroker::new(10_000.0);
        broker.set_position("OTHER", 5.0, 50.0);
        let ledger = MockLedger::new();
        let config = momtrader::domain::config::BotConfig {
            max_positions: 1,
            ..test_config(&["TEST"])
        };
        let strategy = MomentumStrategy::from_config(&config);

        let report = strategy.execute_with_report(&ctx(&data, &broker, &ledger)).unwrap();
        assert!(report.opened.is_empty());
        assert_eq!(report.skipped[0].reason, "max positions reached (1/1)");
        assert_eq!(broker.order_count(), 0);
    }

    #[test]
    fn entries_in_one_pass_count_toward_the_limit() {
        let data = MockMarketData::new()
            .with_bars("AAA", flat_then(40, 102.0))
            .with_bars("BBB", flat_then(40, 102.0));
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::new();
        let config = momtrader::domain::config::BotConfig {
            max_positions: 1,
            ..test_config(&["AAA", "BBB"])
        };
        let strategy = MomentumStrategy::from_config(&config);

        let report = strategy.execute_with_report(&ctx(&data, &broker, &ledger)).unwrap();
        assert_eq!(report.opened.len(), 1);
        assert_eq!(report.opened[0].symbol, "AAA");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].symbol, "BBB");
    }

    #[test]
    fn sell_without_shorting_is_skipped() {
        let data = MockMarketData::new().with_bars("TEST", flat_then(40, 98.0));
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::new();
        let strategy = MomentumStrategy::from_config(&test_config(&["TEST"]));

        let report = strategy.execute_with_report(&ctx(&data, &broker, &ledger)).unwrap();
        assert!(report.opened.is_empty());
        assert!(report.skipped[0].reason.contains("shorting disabled"));
        assert_eq!(broker.order_count(), 0);
    }

    #[test]
    fn sell_with_shorting_opens_short() {
        let data = MockMarketData::new().with_bars("TEST", flat_then(40, 98.0));
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::new();
        let config = momtrader::domain::config::BotConfig {
            allow_shorting: true,
            ..test_config(&["TEST"])
        };
        let strategy = MomentumStrategy::from_config(&config);

        let opened = strategy.execute(&ctx(&data, &broker, &ledger)).unwrap();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].side, Side::Sell);
        assert_eq!(opened[0].quantity, 51);
        assert_eq!(broker.orders.borrow()[0].side, Side::Sell);
    }

    #[test]
    fn zero_size_is_skipped_without_an_order() {
        let data = MockMarketData::new().with_bars("TEST", flat_then(40, 102.0));
        let broker = MockBroker::new(100.0);
        let ledger = MockLedger::new();
        let strategy = MomentumStrategy::from_config(&test_config(&["TEST"]));

        let report = strategy.execute_with_report(&ctx(&data, &broker, &ledger)).unwrap();
        assert!(report.opened.is_empty());
        assert_eq!(report.skipped[0].reason, "position size is zero");
        assert_eq!(broker.order_count(), 0);
    }

    #[test]
    fn failed_order_writes_nothing() {
        let data = MockMarketData::new().with_bars("TEST", flat_then(40, 102.0));
        let broker = MockBroker::new(10_000.0);
        *broker.order_error.borrow_mut() = Some("insufficient buying power".into());
        let ledger = MockLedger::new();
        let strategy = MomentumStrategy::from_config(&test_config(&["TEST"]));

        let report = strategy.execute_with_report(&ctx(&data, &broker, &ledger)).unwrap();
        assert!(report.opened.is_empty());
        assert!(report.skipped[0].reason.contains("insufficient buying power"));
        assert!(ledger.trades.borrow().is_empty());
    }

    #[test]
    fn unconfirmed_order_writes_nothing() {
        for status in [OrderStatus::Unknown, OrderStatus::Rejected] {
            let data = MockMarketData::new().with_bars("TEST", flat_then(40, 102.0));
            let broker = MockBroker::new(10_000.0);
            broker.order_status.set(status);
            let ledger = MockLedger::new();
            let strategy = MomentumStrategy::from_config(&test_config(&["TEST"]));

            let report = strategy.execute_with_report(&ctx(&data, &broker, &ledger)).unwrap();
            assert!(report.opened.is_empty(), "{status} should not open");
            assert_eq!(broker.order_count(), 1);
            assert!(ledger.trades.borrow().is_empty());
        }
    }

    #[test]
    fn unavailable_symbol_does_not_stop_the_others() {
        let data = MockMarketData::new()
            .with_error("BAD", "HTTP 503")
            .with_bars("GOOD", flat_then(40, 102.0));
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::new();
        let strategy = MomentumStrategy::from_config(&test_config(&["BAD", "GOOD"]));

        let report = strategy.execute_with_report(&ctx(&data, &broker, &ledger)).unwrap();
        assert_eq!(report.signals_evaluated, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].symbol, "BAD");
        assert!(report.skipped[0].reason.contains("HTTP 503"));
        assert_eq!(report.opened.len(), 1);
        assert_eq!(report.opened[0].symbol, "GOOD");
    }

    #[test]
    fn account_failure_fails_the_pass() {
        let data = MockMarketData::new().with_bars("TEST", flat_then(40, 102.0));
        let broker = MockBroker::new(10_000.0);
        broker.fail_account.set(true);
        let ledger = MockLedger::new();
        let strategy = MomentumStrategy::from_config(&test_config(&["TEST"]));

        let err = strategy.execute_with_report(&ctx(&data, &broker, &ledger)).unwrap_err();
        assert!(matches!(err, BotError::Broker { .. }));
        assert_eq!(broker.order_count(), 0);
    }

    #[test]
    fn opposite_signal_liquidates_open_trades() {
        let data = MockMarketData::new().with_bars("TEST", flat_then(40, 98.0));
        let broker = MockBroker::new(10_000.0);
        broker.set_position("TEST", 10.0, 99.0);
        let ledger = MockLedger::with_trades(vec![open_trade(1, "TEST", 100.0, 10)]);
        let strategy = MomentumStrategy::from_config(&test_config(&["TEST"]));

        let report = strategy.execute_with_report(&ctx(&data, &broker, &ledger)).unwrap();
        assert!(report.opened.is_empty());
        assert_eq!(report.closed.len(), 1);
        assert_eq!(broker.close_count(), 1);

        let closed = ledger.get(1).unwrap();
        assert_eq!(closed.status, TradeStatus::Closed);
        assert_eq!(closed.exit_price, Some(99.0));
        assert_eq!(closed.pnl, Some(-10.0));
    }

    #[test]
    fn scan_reports_signals_without_trading() {
        let data = MockMarketData::new()
            .with_bars("UP", flat_then(40, 102.0))
            .with_error("DOWN", "timeout");
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::new();
        let strategy = MomentumStrategy::from_config(&test_config(&["UP", "DOWN"]));

        let scans = strategy.scan(&ctx(&data, &broker, &ledger)).unwrap();
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].signal.as_ref().unwrap().direction, SignalDirection::Buy);
        assert!(scans[1].signal.is_err());
        assert_eq!(broker.order_count(), 0);
        assert!(ledger.trades.borrow().is_empty());
    }
}

mod exits {
    use super::*;

    fn run_exit_pass(price: f64) -> (MockBroker, MockLedger) {
        let broker = MockBroker::new(10_000.0);
        broker.set_position("TEST", 10.0, price);
        let ledger = MockLedger::with_trades(vec![open_trade(1, "TEST", 100.0, 10)]);
        let monitor = ExitMonitor::new(test_config(&["TEST"]).exit_policy());
        monitor
            .manage_open_positions(&ledger, &broker, t0() + ChronoDuration::hours(1))
            .unwrap();
        (broker, ledger)
    }

    #[test]
    fn stop_loss_at_boundary_closes() {
        let (broker, ledger) = run_exit_pass(98.0);
        assert_eq!(broker.close_count(), 1);
        let trade = ledger.get(1).unwrap();
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.exit_price, Some(98.0));
        assert_eq!(trade.pnl, Some(-20.0));
    }

    #[test]
    fn take_profit_at_boundary_closes() {
        let (broker, ledger) = run_exit_pass(104.0);
        assert_eq!(broker.close_count(), 1);
        let trade = ledger.get(1).unwrap();
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(trade.pnl, Some(40.0));
    }

    #[test]
    fn inside_the_bracket_stays_open() {
        for price in [99.0, 103.0] {
            let (broker, ledger) = run_exit_pass(price);
            assert_eq!(broker.close_count(), 0, "price {price}");
            assert_eq!(ledger.open_count(), 1);
        }
    }

    #[test]
    fn repeated_pass_closes_once() {
        let broker = MockBroker::new(10_000.0);
        broker.set_position("TEST", 10.0, 97.0);
        let ledger = MockLedger::with_trades(vec![open_trade(1, "TEST", 100.0, 10)]);
        let monitor = ExitMonitor::new(test_config(&["TEST"]).exit_policy());

        let first = monitor.manage_open_positions(&ledger, &broker, t0()).unwrap();
        let second = monitor.manage_open_positions(&ledger, &broker, t0()).unwrap();

        assert_eq!(first.closed.len(), 1);
        assert!(second.closed.is_empty());
        assert_eq!(second.evaluated, 0);
        assert_eq!(broker.close_count(), 1);
        assert_eq!(ledger.updates.borrow().len(), 1);
    }

    #[test]
    fn unconfirmed_close_leaves_trade_open() {
        for status in [OrderStatus::Rejected, OrderStatus::Unknown] {
            let broker = MockBroker::new(10_000.0);
            broker.set_position("TEST", 10.0, 97.0);
            broker.close_status.set(status);
            let ledger = MockLedger::with_trades(vec![open_trade(1, "TEST", 100.0, 10)]);
            let monitor = ExitMonitor::new(test_config(&["TEST"]).exit_policy());

            let report = monitor.manage_open_positions(&ledger, &broker, t0()).unwrap();
            assert!(report.closed.is_empty());
            assert_eq!(report.failed.len(), 1);
            assert_eq!(report.failed[0].symbol, "TEST");
            assert_eq!(ledger.open_count(), 1, "{status} must not close the trade");
            assert!(ledger.updates.borrow().is_empty());

            // Retried on the next pass.
            monitor.manage_open_positions(&ledger, &broker, t0()).unwrap();
            assert_eq!(broker.close_count(), 2);
        }
    }

    #[test]
    fn one_close_covers_every_trade_in_a_symbol() {
        let broker = MockBroker::new(10_000.0);
        broker.set_position("TEST", 20.0, 97.0);
        let ledger = MockLedger::with_trades(vec![
            open_trade(1, "TEST", 100.0, 10),
            open_trade(2, "TEST", 100.0, 10),
        ]);
        let monitor = ExitMonitor::new(test_config(&["TEST"]).exit_policy());

        let report = monitor.manage_open_positions(&ledger, &broker, t0()).unwrap();
        assert_eq!(report.closed.len(), 2);
        assert_eq!(broker.close_count(), 1);
        assert_eq!(ledger.open_count(), 0);
    }

    #[test]
    fn missing_broker_position_is_reported_not_closed() {
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::with_trades(vec![open_trade(1, "TEST", 100.0, 10)]);
        let monitor = ExitMonitor::new(test_config(&["TEST"]).exit_policy());

        let report = monitor.manage_open_positions(&ledger, &broker, t0()).unwrap();
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.unreconciled.len(), 1);
        assert_eq!(report.unreconciled[0].id, 1);
        assert_eq!(broker.close_count(), 0);
        assert_eq!(ledger.open_count(), 1);
    }

    #[test]
    fn ledger_failure_after_confirmed_close_is_reported() {
        let broker = MockBroker::new(10_000.0);
        broker.set_position("TEST", 10.0, 97.0);
        let ledger = MockLedger::with_trades(vec![open_trade(1, "TEST", 100.0, 10)]);
        ledger.fail_writes.set(true);
        let monitor = ExitMonitor::new(test_config(&["TEST"]).exit_policy());

        let report = monitor.manage_open_positions(&ledger, &broker, t0()).unwrap();
        assert!(report.closed.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].reason.contains("disk full"));
    }
}

mod control_loop {
    use super::*;
    use std::cell::Cell;

    fn fast(control: ControlLoop<'_>) -> ControlLoop<'_> {
        control.with_timing(Duration::from_millis(1), Duration::from_millis(1))
    }

    #[test]
    fn run_cycle_enters_then_checks_exits() {
        let data = MockMarketData::new().with_bars("TEST", flat_then(40, 102.0));
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::new();
        let config = test_config(&["TEST"]);
        let control = ControlLoop::new(&config, &data, &broker, &ledger, ShutdownSignal::new());

        let report = control.run_cycle(t0()).unwrap();
        assert_eq!(report.opened.len(), 1);
        assert_eq!(report.opened[0].quantity, 49);
        assert!(report.closed.is_empty());
        assert_eq!(ledger.open_count(), 1);
        assert_eq!(
            report.to_string(),
            "1 signals evaluated, 1 opened, 0 closed, 0 skipped"
        );
    }

    #[test]
    fn exit_pass_runs_when_entry_pass_fails() {
        let data = MockMarketData::new();
        let broker = MockBroker::new(10_000.0);
        broker.fail_account.set(true);
        broker.set_position("TEST", 10.0, 97.0);
        let ledger = MockLedger::with_trades(vec![open_trade(1, "TEST", 100.0, 10)]);
        let config = test_config(&["TEST"]);
        let control = ControlLoop::new(&config, &data, &broker, &ledger, ShutdownSignal::new());

        match control.run_cycle(t0()) {
            Err(BotError::Broker { reason }) => assert!(reason.contains("timed out")),
            Err(other) => panic!("expected the entry pass error, got: {other}"),
            Ok(report) => panic!("expected error, got: {report}"),
        }
        assert_eq!(broker.close_count(), 1);
        assert_eq!(ledger.open_count(), 0);
        assert_eq!(ledger.get(1).unwrap().status, TradeStatus::Closed);
    }

    #[test]
    fn stops_after_max_cycles() {
        let data = MockMarketData::new();
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::new();
        let config = test_config(&["TEST"]);
        let control = fast(ControlLoop::new(&config, &data, &broker, &ledger, ShutdownSignal::new()))
            .with_max_cycles(3);

        assert_eq!(control.run().unwrap(), 3);
        assert_eq!(data.requests.borrow().len(), 3);
    }

    #[test]
    fn shutdown_before_start_runs_nothing() {
        let data = MockMarketData::new();
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::new();
        let config = test_config(&["TEST"]);
        let shutdown = ShutdownSignal::new();
        shutdown.request();
        let control = fast(ControlLoop::new(&config, &data, &broker, &ledger, shutdown));

        assert_eq!(control.run().unwrap(), 0);
        assert!(data.requests.borrow().is_empty());
    }

    #[test]
    fn failed_cycles_back_off_and_continue() {
        let data = MockMarketData::new();
        let broker = MockBroker::new(10_000.0);
        broker.fail_account.set(true);
        let ledger = MockLedger::new();
        let config = test_config(&["TEST"]);
        let control = fast(ControlLoop::new(&config, &data, &broker, &ledger, ShutdownSignal::new()))
            .with_max_cycles(2);

        assert_eq!(control.run().unwrap(), 2);
    }

    struct PanickingData {
        calls: Cell<usize>,
    }

    impl MarketDataProvider for PanickingData {
        fn get_historical_bars(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _limit: usize,
        ) -> Result<Vec<Bar>, BotError> {
            self.calls.set(self.calls.get() + 1);
            panic!("provider bug");
        }
    }

    #[test]
    fn panicking_cycle_does_not_end_the_loop() {
        let data = PanickingData { calls: Cell::new(0) };
        let broker = MockBroker::new(10_000.0);
        let ledger = MockLedger::new();
        let config = test_config(&["TEST"]);
        let control = fast(ControlLoop::new(&config, &data, &broker, &ledger, ShutdownSignal::new()))
            .with_max_cycles(2);

        assert_eq!(control.run().unwrap(), 2);
        assert_eq!(data.calls.get(), 2);
    }
}

#[cfg(feature = "sqlite")]
mod paper_round_trip {
    use super::*;
    use momtrader::adapters::csv_adapter::CsvMarketData;
    use momtrader::adapters::paper_broker::PaperBroker;
    use momtrader::adapters::sqlite_adapter::SqliteLedger;
    use momtrader::ports::broker_port::BrokerGateway;
    use momtrader::ports::ledger_port::TradeLedgerStore;
    use std::fs;
    use tempfile::TempDir;

    fn write_bars(dir: &TempDir, closes: &[f64]) {
        let mut csv = String::from("timestamp,open,high,low,close,volume\n");
        for bar in bars_from_closes(closes) {
            csv.push_str(&format!(
                "{},{c},{c},{c},{c},{}\n",
                bar.timestamp.to_rfc3339(),
                bar.volume,
                c = bar.close
            ));
        }
        fs::write(dir.path().join("TEST_15Min.csv"), csv).unwrap();
    }

    #[test]
    fn entry_then_take_profit() {
        let dir = TempDir::new().unwrap();
        let mut closes = vec![100.0; 40];
        closes.push(102.0);
        write_bars(&dir, &closes);

        let data = CsvMarketData::new(dir.path());
        let broker = PaperBroker::new(data.clone(), Timeframe::Minute15, 10_000.0);
        let ledger = SqliteLedger::in_memory().unwrap();
        let config = test_config(&["TEST"]);
        let control = ControlLoop::new(&config, &data, &broker, &ledger, ShutdownSignal::new());

        let first = control.run_cycle(t0()).unwrap();
        assert_eq!(first.opened.len(), 1);
        assert!(first.closed.is_empty());
        assert_eq!(ledger.list_open_trades().unwrap().len(), 1);
        assert_eq!(broker.get_positions().unwrap()["TEST"].quantity, 49.0);

        closes.push(107.0);
        write_bars(&dir, &closes);

        let second = control.run_cycle(t0() + ChronoDuration::minutes(15)).unwrap();
        assert!(second.opened.is_empty());
        assert_eq!(second.closed.len(), 1);

        let trades = ledger.list_trades().unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].status, TradeStatus::Closed);
        assert_eq!(trades[0].exit_price, Some(107.0));
        assert_eq!(trades[0].pnl, Some(245.0));
        assert!(broker.get_positions().unwrap().is_empty());
        assert_eq!(broker.get_account().unwrap().cash, 10_245.0);
    }

    #[test]
    fn price_outage_leaves_trade_open_and_reported() {
        let dir = TempDir::new().unwrap();
        let mut closes = vec![100.0; 40];
        closes.push(102.0);
        write_bars(&dir, &closes);

        let data = CsvMarketData::new(dir.path());
        let broker = PaperBroker::new(data.clone(), Timeframe::Minute15, 10_000.0);
        let ledger = SqliteLedger::in_memory().unwrap();
        let config = test_config(&["TEST"]);
        let control = ControlLoop::new(&config, &data, &broker, &ledger, ShutdownSignal::new());
        control.run_cycle(t0()).unwrap();

        fs::remove_file(dir.path().join("TEST_15Min.csv")).unwrap();

        let monitor = ExitMonitor::new(config.exit_policy());
        let report = monitor.manage_open_positions(&ledger, &broker, t0()).unwrap();
        assert!(report.closed.is_empty());
        assert_eq!(report.unreconciled.len(), 1);
        assert_eq!(ledger.list_open_trades().unwrap().len(), 1);
        assert!(matches!(broker.get_account(), Err(BotError::Broker { .. })));
    }
}
