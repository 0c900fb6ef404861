//! Configuration validation.
//!
//! Validates the whole risk policy and schedule before the loop starts.

use crate::domain::config::BotConfig;
use crate::domain::error::BotError;

/// Longest indicator window accepted from configuration.
pub const MAX_PERIOD: usize = 10_000;

pub fn validate_bot_config(config: &BotConfig) -> Result<(), BotError> {
    validate_symbols(config)?;
    validate_risk_pct(config)?;
    validate_stop_pcts(config)?;
    validate_max_positions(config)?;
    validate_indicator_periods(config)?;
    validate_thresholds(config)?;
    validate_bar_limit(config)?;
    validate_schedule(config)?;
    Ok(())
}

fn validate_symbols(config: &BotConfig) -> Result<(), BotError> {
    if config.symbols.is_empty() {
        return Err(BotError::ConfigMissing {
            section: "trading".to_string(),
            key: "symbols".to_string(),
        });
    }
    if let Some(bad) = config
        .symbols
        .iter()
        .find(|s| s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '/'))
    {
        return Err(BotError::config_invalid(
            "trading",
            "symbols",
            format!("'{bad}' is not a valid symbol"),
        ));
    }
    Ok(())
}

fn validate_risk_pct(config: &BotConfig) -> Result<(), BotError> {
    let value = config.risk.risk_pct;
    if !(value > 0.0 && value <= 1.0) {
        return Err(BotError::config_invalid(
            "risk",
            "risk_pct",
            "risk_pct must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_stop_pcts(config: &BotConfig) -> Result<(), BotError> {
    for (key, value) in [
        ("default_stop_pct", config.risk.default_stop_pct),
        ("stop_loss_pct", config.risk.stop_loss_pct),
        ("take_profit_pct", config.risk.take_profit_pct),
    ] {
        if !(value > 0.0 && value < 1.0) {
            return Err(BotError::config_invalid(
                "risk",
                key,
                format!("{key} must be in (0, 1)"),
            ));
        }
    }
    Ok(())
}

fn validate_max_positions(config: &BotConfig) -> Result<(), BotError> {
    if config.max_positions < 1 {
        return Err(BotError::config_invalid(
            "trading",
            "max_positions",
            "max_positions must be at least 1",
        ));
    }
    Ok(())
}

fn validate_indicator_periods(config: &BotConfig) -> Result<(), BotError> {
    let params = &config.signals.indicators;
    for (key, value) in [
        ("rsi_period", params.rsi_period),
        ("macd_fast", params.macd_fast),
        ("macd_slow", params.macd_slow),
        ("macd_signal", params.macd_signal),
    ] {
        if value < 1 {
            return Err(BotError::config_invalid(
                "signals",
                key,
                format!("{key} must be at least 1"),
            ));
        }
        if value > MAX_PERIOD {
            return Err(BotError::config_invalid(
                "signals",
                key,
                format!("{key} must be at most {MAX_PERIOD}"),
            ));
        }
    }
    if params.macd_fast >= params.macd_slow {
        return Err(BotError::config_invalid(
            "signals",
            "macd_fast",
            "macd_fast must be shorter than macd_slow",
        ));
    }
    Ok(())
}

fn validate_thresholds(config: &BotConfig) -> Result<(), BotError> {
    let (oversold, overbought) = (config.signals.oversold, config.signals.overbought);
    if !(0.0..=100.0).contains(&oversold) || !(0.0..=100.0).contains(&overbought) {
        return Err(BotError::config_invalid(
            "signals",
            "overbought",
            "RSI thresholds must be within 0..100",
        ));
    }
    if oversold >= overbought {
        return Err(BotError::config_invalid(
            "signals",
            "oversold",
            "oversold must be below overbought",
        ));
    }
    Ok(())
}

fn validate_bar_limit(config: &BotConfig) -> Result<(), BotError> {
    let minimum = config.signals.indicators.min_bars();
    if config.bar_limit < minimum {
        return Err(BotError::config_invalid(
            "trading",
            "bar_limit",
            format!("bar_limit must be at least {minimum} for the configured indicators"),
        ));
    }
    Ok(())
}

fn validate_schedule(config: &BotConfig) -> Result<(), BotError> {
    if config.schedule.interval.as_secs() < 1 {
        return Err(BotError::config_invalid(
            "loop",
            "interval_secs",
            "interval_secs must be at least 1",
        ));
    }
    if config.schedule.request_timeout.as_secs() < 1 {
        return Err(BotError::config_invalid(
            "loop",
            "request_timeout_secs",
            "request_timeout_secs must be at least 1",
        ));
    }
    Ok(())
}
