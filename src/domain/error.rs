//! Domain error types.

/// Top-level error type for momtrader.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("market data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("order for {symbol} failed: {reason}")]
    OrderFailed { symbol: String, reason: String },

    #[error("order for {symbol} has unconfirmed status: {status}")]
    OrderAmbiguous { symbol: String, status: String },

    #[error("broker error: {reason}")]
    Broker { reason: String },

    #[error("ledger error: {reason}")]
    Ledger { reason: String },

    #[error("trade {id} cannot transition: {reason}")]
    InvalidTransition { id: i64, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BotError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        BotError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn ledger(reason: impl ToString) -> Self {
        BotError::Ledger {
            reason: reason.to_string(),
        }
    }

    pub fn broker(reason: impl ToString) -> Self {
        BotError::Broker {
            reason: reason.to_string(),
        }
    }

    /// Configuration errors are fatal; everything else is retried next cycle.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            BotError::ConfigParse { .. }
                | BotError::ConfigMissing { .. }
                | BotError::ConfigInvalid { .. }
        )
    }
}

impl From<&BotError> for std::process::ExitCode {
    fn from(err: &BotError) -> Self {
        let code: u8 = match err {
            BotError::Io(_) => 1,
            BotError::ConfigParse { .. }
            | BotError::ConfigMissing { .. }
            | BotError::ConfigInvalid { .. } => 2,
            BotError::Ledger { .. } => 3,
            BotError::Broker { .. }
            | BotError::OrderFailed { .. }
            | BotError::OrderAmbiguous { .. } => 4,
            BotError::DataUnavailable { .. } | BotError::InsufficientData { .. } => 5,
            BotError::InvalidTransition { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
