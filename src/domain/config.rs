//! Typed bot configuration.
//!
//! Built once at startup from a [`ConfigPort`] and validated before anything
//! runs; see [`crate::domain::config_validation`].

use crate::domain::config_validation::validate_bot_config;
use crate::domain::error::BotError;
use crate::domain::exit_monitor::ExitPolicy;
use crate::domain::indicator::IndicatorParams;
use crate::domain::ohlcv::Timeframe;
use crate::domain::signal::RuleSet;
use crate::domain::sizing::PositionSizer;
use crate::ports::config_port::{ConfigPort, parse_bool};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMode {
    Crossover,
    Threshold,
}

impl FromStr for SignalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crossover" => Ok(SignalMode::Crossover),
            "threshold" => Ok(SignalMode::Threshold),
            other => Err(format!("unknown signal mode '{other}' (expected crossover|threshold)")),
        }
    }
}

/// Which account figure the risk budget is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceSource {
    Cash,
    Equity,
}

impl FromStr for BalanceSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(BalanceSource::Cash),
            "equity" => Ok(BalanceSource::Equity),
            other => Err(format!("unknown balance source '{other}' (expected cash|equity)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub mode: SignalMode,
    pub indicators: IndicatorParams,
    pub overbought: f64,
    pub oversold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub risk_pct: f64,
    pub default_stop_pct: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub interval: Duration,
    pub backoff: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
    pub bar_limit: usize,
    pub strategy_tag: String,
    pub max_positions: usize,
    pub allow_shorting: bool,
    pub balance_source: BalanceSource,
    pub signals: SignalConfig,
    pub risk: RiskConfig,
    pub schedule: LoopConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            symbols: vec!["AAPL".into(), "MSFT".into(), "TSLA".into()],
            timeframe: Timeframe::Minute15,
            bar_limit: 100,
            strategy_tag: "momentum".into(),
            max_positions: 5,
            allow_shorting: false,
            balance_source: BalanceSource::Cash,
            signals: SignalConfig {
                mode: SignalMode::Crossover,
                indicators: IndicatorParams::default(),
                overbought: 70.0,
                oversold: 30.0,
            },
            risk: RiskConfig {
                risk_pct: 0.01,
                default_stop_pct: 0.02,
                stop_loss_pct: 0.02,
                take_profit_pct: 0.04,
            },
            schedule: LoopConfig {
                interval: Duration::from_secs(900),
                backoff: Duration::from_secs(60),
                request_timeout: Duration::from_secs(10),
            },
        }
    }
}

impl BotConfig {
    pub fn rule_set(&self) -> RuleSet {
        match self.signals.mode {
            SignalMode::Crossover => RuleSet::Crossover,
            SignalMode::Threshold => RuleSet::Threshold {
                overbought: self.signals.overbought,
                oversold: self.signals.oversold,
                max_positions: self.max_positions,
            },
        }
    }

    pub fn exit_policy(&self) -> ExitPolicy {
        ExitPolicy {
            stop_loss_pct: self.risk.stop_loss_pct,
            take_profit_pct: self.risk.take_profit_pct,
        }
    }

    pub fn sizer(&self) -> PositionSizer {
        PositionSizer::new(self.risk.risk_pct, self.risk.default_stop_pct)
    }
}

/// Read, type and validate the whole configuration. Any problem is fatal.
pub fn build_bot_config(config: &dyn ConfigPort) -> Result<BotConfig, BotError> {
    let defaults = BotConfig::default();

    let symbols: Vec<String> = config
        .get_list("trading", "symbols")
        .into_iter()
        .map(|s| s.to_uppercase())
        .collect();
    if symbols.is_empty() {
        return Err(BotError::ConfigMissing {
            section: "trading".into(),
            key: "symbols".into(),
        });
    }

    let indicators = IndicatorParams {
        rsi_period: usize_value(config, "signals", "rsi_period", defaults.signals.indicators.rsi_period)?,
        macd_fast: usize_value(config, "signals", "macd_fast", defaults.signals.indicators.macd_fast)?,
        macd_slow: usize_value(config, "signals", "macd_slow", defaults.signals.indicators.macd_slow)?,
        macd_signal: usize_value(config, "signals", "macd_signal", defaults.signals.indicators.macd_signal)?,
    };

    let built = BotConfig {
        symbols,
        timeframe: parsed(config, "trading", "timeframe", defaults.timeframe)?,
        bar_limit: usize_value(config, "trading", "bar_limit", defaults.bar_limit)?,
        strategy_tag: config
            .get_string("trading", "strategy_tag")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.strategy_tag),
        max_positions: usize_value(config, "trading", "max_positions", defaults.max_positions)?,
        allow_shorting: bool_value(config, "trading", "allow_shorting", defaults.allow_shorting)?,
        balance_source: parsed(config, "trading", "balance_source", defaults.balance_source)?,
        signals: SignalConfig {
            mode: parsed(config, "signals", "mode", defaults.signals.mode)?,
            indicators,
            overbought: f64_value(config, "signals", "overbought", defaults.signals.overbought)?,
            oversold: f64_value(config, "signals", "oversold", defaults.signals.oversold)?,
        },
        risk: RiskConfig {
            risk_pct: f64_value(config, "risk", "risk_pct", defaults.risk.risk_pct)?,
            default_stop_pct: f64_value(config, "risk", "default_stop_pct", defaults.risk.default_stop_pct)?,
            stop_loss_pct: f64_value(config, "risk", "stop_loss_pct", defaults.risk.stop_loss_pct)?,
            take_profit_pct: f64_value(config, "risk", "take_profit_pct", defaults.risk.take_profit_pct)?,
        },
        schedule: LoopConfig {
            interval: secs_value(config, "loop", "interval_secs", defaults.schedule.interval)?,
            backoff: secs_value(config, "loop", "backoff_secs", defaults.schedule.backoff)?,
            request_timeout: secs_value(
                config,
                "loop",
                "request_timeout_secs",
                defaults.schedule.request_timeout,
            )?,
        },
    };

    validate_bot_config(&built)?;
    Ok(built)
}

fn raw(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parsed<T>(config: &dyn ConfigPort, section: &str, key: &str, default: T) -> Result<T, BotError>
where
    T: FromStr,
    T::Err: ToString,
{
    match raw(config, section, key) {
        None => Ok(default),
        Some(s) => s
            .parse::<T>()
            .map_err(|e| BotError::config_invalid(section, key, e.to_string())),
    }
}

fn f64_value(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, BotError> {
    parsed(config, section, key, default)
}

fn usize_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, BotError> {
    parsed(config, section, key, default)
}

fn bool_value(config: &dyn ConfigPort, section: &str, key: &str, default: bool) -> Result<bool, BotError> {
    match raw(config, section, key) {
        None => Ok(default),
        Some(s) => parse_bool(&s)
            .ok_or_else(|| BotError::config_invalid(section, key, format!("'{s}' is not a boolean"))),
    }
}

fn secs_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Duration,
) -> Result<Duration, BotError> {
    let secs: u64 = parsed(config, section, key, default.as_secs())?;
    Ok(Duration::from_secs(secs))
}
