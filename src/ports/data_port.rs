//! Market data port trait.

use crate::domain::error::BotError;
use crate::domain::ohlcv::{Bar, Timeframe};

pub trait MarketDataProvider {
    /// The newest `limit` bars for `symbol`, ordered oldest to newest.
    ///
    /// Implementations return `BotError::DataUnavailable` rather than an
    /// empty vector when nothing is available.
    fn get_historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, BotError>;
}
