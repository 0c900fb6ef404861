//! CSV bar files as a market data provider.
//!
//! One file per symbol and timeframe, `<dir>/<SYMBOL>_<timeframe>.csv`, with
//! a header row `timestamp,open,high,low,close,volume`. Timestamps may be
//! RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a bare date.

use crate::domain::error::BotError;
use crate::domain::ohlcv::{Bar, Timeframe};
use crate::ports::data_port::MarketDataProvider;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CsvMarketData {
    base_path: PathBuf,
}

impl CsvMarketData {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", symbol, timeframe.label()))
    }
}

fn unavailable(symbol: &str, reason: impl Into<String>) -> BotError {
    BotError::DataUnavailable {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

fn number(record: &StringRecord, idx: usize, name: &str, symbol: &str) -> Result<f64, BotError> {
    let raw = record
        .get(idx)
        .ok_or_else(|| unavailable(symbol, format!("missing {name} column")))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|e| unavailable(symbol, format!("invalid {name} value '{raw}': {e}")))
}

fn parse_bar(record: &StringRecord, symbol: &str) -> Result<Bar, BotError> {
    let raw_ts = record
        .get(0)
        .ok_or_else(|| unavailable(symbol, "missing timestamp column"))?;
    let timestamp = parse_timestamp(raw_ts)
        .ok_or_else(|| unavailable(symbol, format!("invalid timestamp '{raw_ts}'")))?;

    Ok(Bar {
        timestamp,
        open: number(record, 1, "open", symbol)?,
        high: number(record, 2, "high", symbol)?,
        low: number(record, 3, "low", symbol)?,
        close: number(record, 4, "close", symbol)?,
        volume: number(record, 5, "volume", symbol)?,
    })
}

impl MarketDataProvider for CsvMarketData {
    fn get_historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, BotError> {
        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path)
            .map_err(|e| unavailable(symbol, format!("failed to read {}: {e}", path.display())))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| unavailable(symbol, format!("CSV parse error: {e}")))?;
            bars.push(parse_bar(&record, symbol)?);
        }

        if bars.is_empty() {
            return Err(unavailable(symbol, format!("{} has no bars", path.display())));
        }

        bars.sort_by_key(|b| b.timestamp);
        if bars.len() > limit {
            bars.drain(..bars.len() - limit);
        }
        debug!(symbol, bars = bars.len(), path = %path.display(), "loaded bars");
        Ok(bars)
    }
}
