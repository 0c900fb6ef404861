//! SQLite trade ledger.

use crate::domain::error::BotError;
use crate::domain::trade::{NewTrade, Side, Trade, TradeExit, TradeStatus};
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::TradeLedgerStore;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{Row, params};
use std::str::FromStr;
use tracing::debug;

const TRADE_COLUMNS: &str = "id, symbol, side, entry_price, exit_price, quantity, entry_time, \
                             exit_time, pnl, strategy, status";

pub struct SqliteLedger {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteLedger {
    /// Open (or create) the ledger named by `[ledger] path`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BotError> {
        let db_path =
            config
                .get_string("ledger", "path")
                .ok_or_else(|| BotError::ConfigMissing {
                    section: "ledger".into(),
                    key: "path".into(),
                })?;
        let raw_pool_size = config.get_int("ledger", "pool_size", 4);
        let pool_size = u32::try_from(raw_pool_size)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                BotError::config_invalid(
                    "ledger",
                    "pool_size",
                    format!("pool_size must be between 1 and {}, got {raw_pool_size}", u32::MAX),
                )
            })?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(BotError::ledger)?;

        let ledger = Self { pool };
        ledger.initialize_schema()?;
        debug!(path = %db_path, pool_size, "ledger opened");
        Ok(ledger)
    }

    pub fn in_memory() -> Result<Self, BotError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)
            .map_err(BotError::ledger)?;

        let ledger = Self { pool };
        ledger.initialize_schema()?;
        Ok(ledger)
    }

    pub fn initialize_schema(&self) -> Result<(), BotError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS trades (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    symbol TEXT NOT NULL,
                    side TEXT NOT NULL,
                    entry_price REAL NOT NULL,
                    exit_price REAL,
                    quantity INTEGER NOT NULL CHECK (quantity > 0),
                    entry_time TEXT NOT NULL,
                    exit_time TEXT,
                    pnl REAL,
                    strategy TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'open'
                );
                CREATE INDEX IF NOT EXISTS idx_trades_status ON trades(status);
                CREATE INDEX IF NOT EXISTS idx_trades_symbol ON trades(symbol);",
            )
            .map_err(BotError::ledger)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, BotError> {
        self.pool.get().map_err(BotError::ledger)
    }

    fn query_trades(&self, filter: &str) -> Result<Vec<Trade>, BotError> {
        let conn = self.conn()?;
        let query = format!("SELECT {TRADE_COLUMNS} FROM trades {filter} ORDER BY id ASC");
        let mut stmt = conn.prepare(&query).map_err(BotError::ledger)?;
        let rows = stmt.query_map([], trade_from_row).map_err(BotError::ledger)?;

        let mut trades = Vec::new();
        for row in rows {
            trades.push(row.map_err(BotError::ledger)?);
        }
        Ok(trades)
    }
}

fn conversion_error(idx: usize, ty: Type, msg: impl ToString) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, msg.to_string().into())
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, Type::Text, e))
}

fn parse_text<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>().map_err(|e| conversion_error(idx, Type::Text, e))
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    let side: String = row.get(2)?;
    let quantity: i64 = row.get(5)?;
    let entry_time: String = row.get(6)?;
    let exit_time: Option<String> = row.get(7)?;
    let status: String = row.get(10)?;

    Ok(Trade {
        id: row.get(0)?,
        symbol: row.get(1)?,
        side: parse_text::<Side>(2, &side)?,
        entry_price: row.get(3)?,
        exit_price: row.get(4)?,
        quantity: u64::try_from(quantity).map_err(|e| conversion_error(5, Type::Integer, e))?,
        entry_time: parse_time(6, &entry_time)?,
        exit_time: exit_time.as_deref().map(|t| parse_time(7, t)).transpose()?,
        pnl: row.get(8)?,
        strategy_tag: row.get(9)?,
        status: parse_text::<TradeStatus>(10, &status)?,
    })
}

impl TradeLedgerStore for SqliteLedger {
    fn create_trade(&self, trade: &NewTrade) -> Result<i64, BotError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO trades (symbol, side, entry_price, quantity, entry_time, strategy, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                trade.symbol,
                trade.side.as_str(),
                trade.entry_price,
                trade.quantity as i64,
                trade.entry_time.to_rfc3339(),
                trade.strategy_tag,
                TradeStatus::Open.as_str(),
            ],
        )
        .map_err(BotError::ledger)?;
        Ok(conn.last_insert_rowid())
    }

    fn update_trade(&self, id: i64, exit: &TradeExit) -> Result<(), BotError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE trades SET exit_price = ?1, exit_time = ?2, pnl = ?3, status = ?4
                 WHERE id = ?5 AND status = ?6",
                params![
                    exit.exit_price,
                    exit.exit_time.to_rfc3339(),
                    exit.pnl,
                    TradeStatus::Closed.as_str(),
                    id,
                    TradeStatus::Open.as_str(),
                ],
            )
            .map_err(BotError::ledger)?;

        if changed == 0 {
            return Err(BotError::InvalidTransition {
                id,
                reason: "no open trade with this id".into(),
            });
        }
        Ok(())
    }

    fn list_open_trades(&self) -> Result<Vec<Trade>, BotError> {
        self.query_trades("WHERE status = 'open'")
    }

    fn list_trades(&self) -> Result<Vec<Trade>, BotError> {
        self.query_trades("")
    }
}
