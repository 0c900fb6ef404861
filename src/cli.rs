//! CLI definition, process wiring and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvMarketData;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::config::{BotConfig, build_bot_config};
use crate::domain::control_loop::{ControlLoop, ShutdownSignal};
use crate::domain::error::BotError;
use crate::domain::strategy::{CycleContext, MomentumStrategy};
use crate::domain::trade::Trade;
use crate::ports::broker_port::BrokerGateway;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataProvider;
use crate::ports::ledger_port::TradeLedgerStore;

/// Env var holding a tracing filter; overrides `--log-level`.
pub const LOG_ENV: &str = "MOMTRADER_LOG";

#[derive(Parser, Debug)]
#[command(name = "momtrader", version, about = "Momentum trading bot (RSI + MACD)")]
pub struct Cli {
    /// Log level or filter directive when MOMTRADER_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the trading loop
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Simulated broker over local CSV bars (default)
        #[arg(long, conflicts_with = "live")]
        paper: bool,
        /// Alpaca REST broker and market data
        #[arg(long)]
        live: bool,
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Load and validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Compute and print the current signal for every symbol without trading
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        live: bool,
    },
    /// List trades recorded in the ledger
    Trades {
        #[arg(short, long)]
        config: PathBuf,
        /// Only Open trades
        #[arg(long)]
        open: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    if let Err(e) = init_tracing(&cli.log_level, cli.log_format) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    match cli.command {
        Command::Run {
            config,
            paper: _,
            live,
            once,
        } => run_bot(&config, live, once),
        Command::Validate { config } => run_validate(&config),
        Command::Signals { config, live } => run_signals(&config, live),
        Command::Trades { config, open } => run_trades(&config, open),
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_tracing(log_level: &str, format: LogFormat) -> Result<(), String> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    Ok(())
}

fn fail(e: &BotError) -> ExitCode {
    eprintln!("error: {e}");
    e.into()
}

pub fn load_config(path: &Path) -> Result<(FileConfigAdapter, BotConfig), BotError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    let config = build_bot_config(&adapter)?;
    Ok((adapter, config))
}

/// The collaborators one process trades through.
pub struct Services {
    pub market_data: Box<dyn MarketDataProvider>,
    pub broker: Box<dyn BrokerGateway>,
    pub ledger: Box<dyn TradeLedgerStore>,
}

impl Services {
    pub fn context(&self) -> CycleContext<'_> {
        CycleContext {
            market_data: self.market_data.as_ref(),
            broker: self.broker.as_ref(),
            ledger: self.ledger.as_ref(),
            now: chrono::Utc::now(),
        }
    }
}

pub fn open_ledger(adapter: &dyn ConfigPort) -> Result<Box<dyn TradeLedgerStore>, BotError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteLedger;
        Ok(Box::new(SqliteLedger::from_config(adapter)?))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = adapter;
        Err(BotError::ledger("built without the `sqlite` feature"))
    }
}

/// Local simulation: CSV bars from `[paper] data_dir` and an in-memory broker.
pub fn connect_paper(adapter: &dyn ConfigPort, config: &BotConfig) -> Result<Services, BotError> {
    let data_dir = adapter
        .get_string("paper", "data_dir")
        .ok_or_else(|| BotError::ConfigMissing {
            section: "paper".into(),
            key: "data_dir".into(),
        })?;
    let starting_cash = adapter.get_double("paper", "starting_cash", 100_000.0);
    if !(starting_cash.is_finite() && starting_cash > 0.0) {
        return Err(BotError::config_invalid(
            "paper",
            "starting_cash",
            "starting_cash must be positive",
        ));
    }

    let data = CsvMarketData::new(&data_dir);
    let broker = PaperBroker::new(data.clone(), config.timeframe, starting_cash);
    info!(data_dir = %data_dir, starting_cash, "using paper broker");

    Ok(Services {
        market_data: Box::new(data),
        broker: Box::new(broker),
        ledger: open_ledger(adapter)?,
    })
}

pub fn connect_live(adapter: &dyn ConfigPort, config: &BotConfig) -> Result<Services, BotError> {
    #[cfg(feature = "alpaca")]
    {
        use crate::adapters::alpaca_adapter::AlpacaClient;
        let client = AlpacaClient::from_config(adapter, config.schedule.request_timeout)?;
        info!(base_url = %client.base_url(), "using Alpaca broker");
        Ok(Services {
            market_data: Box::new(client.clone()),
            broker: Box::new(client),
            ledger: open_ledger(adapter)?,
        })
    }

    #[cfg(not(feature = "alpaca"))]
    {
        let _ = (adapter, config);
        Err(BotError::config_invalid(
            "alpaca",
            "base_url",
            "--live requires a build with the `alpaca` feature",
        ))
    }
}

pub fn connect(adapter: &dyn ConfigPort, config: &BotConfig, live: bool) -> Result<Services, BotError> {
    if live {
        connect_live(adapter, config)
    } else {
        connect_paper(adapter, config)
    }
}

/// Observe ctrl-c on a helper thread and turn it into a shutdown request.
pub fn install_ctrl_c(shutdown: ShutdownSignal) {
    let spawned = thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    warn!(error = %e, "could not start signal runtime; ctrl-c will not stop gracefully");
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received; stopping after the current cycle");
                    shutdown.request();
                }
            });
        });
    if let Err(e) = spawned {
        warn!(error = %e, "could not spawn signal thread");
    }
}

fn run_bot(config_path: &Path, live: bool, once: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let (adapter, config) = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let services = match connect(&adapter, &config, live) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let shutdown = ShutdownSignal::new();
    install_ctrl_c(shutdown.clone());

    let mut control = ControlLoop::new(
        &config,
        services.market_data.as_ref(),
        services.broker.as_ref(),
        services.ledger.as_ref(),
        shutdown,
    );
    if once {
        control = control.with_max_cycles(1);
    }

    match control.run() {
        Ok(cycles) => {
            eprintln!("Stopped after {cycles} cycle(s)");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

pub fn describe_config(config: &BotConfig) -> Vec<String> {
    vec![
        format!("symbols:        {}", config.symbols.join(", ")),
        format!("timeframe:      {} x {} bars", config.timeframe, config.bar_limit),
        format!("rules:          {} {}", config.rule_set(), config.signals.indicators),
        format!(
            "risk:           {:.2}% per trade, stop {:.2}%, target {:.2}%",
            config.risk.risk_pct * 100.0,
            config.risk.stop_loss_pct * 100.0,
            config.risk.take_profit_pct * 100.0
        ),
        format!(
            "positions:      max {}, shorting {}",
            config.max_positions,
            if config.allow_shorting { "on" } else { "off" }
        ),
        format!(
            "loop:           every {}s, backoff {}s",
            config.schedule.interval.as_secs(),
            config.schedule.backoff.as_secs()
        ),
    ]
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let (_, config) = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    for line in describe_config(&config) {
        println!("{line}");
    }
    eprintln!("Config is valid");
    ExitCode::SUCCESS
}

fn run_signals(config_path: &Path, live: bool) -> ExitCode {
    let (adapter, config) = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let services = match connect(&adapter, &config, live) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let strategy = MomentumStrategy::from_config(&config);
    let scans = match strategy.scan(&services.context()) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    for scan in scans {
        match scan.signal {
            Ok(signal) => println!(
                "{}\t{}\t{:.2}\t{}",
                signal.symbol, signal.direction, signal.price, signal.reason
            ),
            Err(e) => println!("{}\tunavailable\t-\t{e}", scan.symbol),
        }
    }
    ExitCode::SUCCESS
}

pub fn format_trade(trade: &Trade) -> String {
    let opt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    format!(
        "{}\t{}\t{}\t{}\t{}\t{:.2}\t{}\t{}\t{}",
        trade.id,
        trade.symbol,
        trade.side,
        trade.status,
        trade.quantity,
        trade.entry_price,
        opt(trade.exit_price),
        opt(trade.pnl),
        trade.entry_time.format("%Y-%m-%d %H:%M:%S"),
    )
}

fn run_trades(config_path: &Path, open_only: bool) -> ExitCode {
    let adapter = match FileConfigAdapter::from_file(config_path) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };
    let ledger = match open_ledger(&adapter) {
        Ok(l) => l,
        Err(e) => return fail(&e),
    };
    let trades = if open_only {
        ledger.list_open_trades()
    } else {
        ledger.list_trades()
    };
    let trades = match trades {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };

    if trades.is_empty() {
        eprintln!("No trades recorded");
    }
    for trade in &trades {
        println!("{}", format_trade(trade));
    }
    ExitCode::SUCCESS
}
