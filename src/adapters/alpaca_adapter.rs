//! Alpaca REST client: broker gateway and market data provider.
//!
//! Blocking `reqwest` with a per-request timeout. Alpaca reports money and
//! quantities as decimal strings; they are parsed here into `f64`.

use crate::domain::error::BotError;
use crate::domain::ohlcv::{Bar, Timeframe};
use crate::ports::broker_port::{
    Account, BrokerGateway, BrokerPosition, OrderConfirmation, OrderRequest, OrderStatus,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataProvider;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use tracing::debug;

pub const PAPER_BASE_URL: &str = "https://paper-api.alpaca.markets";
pub const DATA_BASE_URL: &str = "https://data.alpaca.markets";

const KEY_HEADER: &str = "APCA-API-KEY-ID";
const SECRET_HEADER: &str = "APCA-API-SECRET-KEY";

#[derive(Debug, Deserialize)]
struct AccountResponse {
    cash: String,
    equity: String,
    buying_power: String,
}

#[derive(Debug, Deserialize)]
struct PositionResponse {
    symbol: String,
    qty: String,
    current_price: String,
    #[serde(default)]
    side: Option<String>,
}

#[derive(Debug, Serialize)]
struct OrderBody<'a> {
    symbol: &'a str,
    qty: String,
    side: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    time_in_force: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    #[serde(default)]
    bars: Option<Vec<BarResponse>>,
}

#[derive(Debug, Deserialize)]
struct BarResponse {
    t: String,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[derive(Debug, Clone)]
pub struct AlpacaCredentials {
    pub api_key: String,
    pub secret_key: String,
}

#[derive(Clone)]
pub struct AlpacaClient {
    client: Client,
    base_url: String,
    data_url: String,
    credentials: AlpacaCredentials,
}

impl AlpacaClient {
    pub fn new(
        base_url: &str,
        data_url: &str,
        credentials: AlpacaCredentials,
        timeout: Duration,
    ) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("momtrader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(BotError::broker)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            data_url: data_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// `[alpaca]` section, with keys falling back to `APCA_API_KEY_ID` and
    /// `APCA_API_SECRET_KEY`. Trading goes to the paper endpoint unless
    /// `base_url` names another.
    pub fn from_config(config: &dyn ConfigPort, timeout: Duration) -> Result<Self, BotError> {
        let base_url = config
            .get_string("alpaca", "base_url")
            .unwrap_or_else(|| PAPER_BASE_URL.to_string());
        let data_url = config
            .get_string("alpaca", "data_url")
            .unwrap_or_else(|| DATA_BASE_URL.to_string());

        let credential = |key: &str, var: &str| {
            config
                .get_string("alpaca", key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| env::var(var).ok())
                .ok_or_else(|| BotError::ConfigMissing {
                    section: "alpaca".into(),
                    key: key.into(),
                })
        };
        let credentials = AlpacaCredentials {
            api_key: credential("api_key", "APCA_API_KEY_ID")?,
            secret_key: credential("secret_key", "APCA_API_SECRET_KEY")?,
        };

        Self::new(&base_url, &data_url, credentials, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(KEY_HEADER, &self.credentials.api_key)
            .header(SECRET_HEADER, &self.credentials.secret_key)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, BotError> {
        let response = self
            .authed(request)
            .send()
            .map_err(|e| BotError::broker(format!("{what}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(BotError::broker(format!("{what}: HTTP {status}: {body}")));
        }
        response
            .json::<T>()
            .map_err(|e| BotError::broker(format!("{what}: bad response: {e}")))
    }
}

/// Wall-clock window wide enough to hold `limit` bars across nights,
/// weekends and holidays. Without `start` the bars endpoint only returns
/// the current day.
fn bars_window_start(timeframe: Timeframe, limit: usize, now: DateTime<Utc>) -> DateTime<Utc> {
    let wall_clock_factor = match timeframe {
        Timeframe::Day1 => 2,
        _ => 6,
    };
    let span = i64::try_from(limit)
        .unwrap_or(i64::MAX)
        .saturating_mul(timeframe.seconds() as i64)
        .saturating_mul(wall_clock_factor);
    let lookback = ChronoDuration::try_seconds(span)
        .unwrap_or(ChronoDuration::days(3650))
        .min(ChronoDuration::days(3650));
    now - lookback - ChronoDuration::days(4)
}

fn bars_query(timeframe: Timeframe, limit: usize, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
    vec![
        ("timeframe", timeframe.label().to_string()),
        ("limit", limit.to_string()),
        ("sort", "desc".to_string()),
        (
            "start",
            bars_window_start(timeframe, limit, now).to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
    ]
}

fn decimal(field: &str, raw: &str) -> Result<f64, BotError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| BotError::broker(format!("invalid {field} '{raw}': {e}")))
}

fn account_from(resp: AccountResponse) -> Result<Account, BotError> {
    Ok(Account {
        cash: decimal("cash", &resp.cash)?,
        equity: decimal("equity", &resp.equity)?,
        buying_power: decimal("buying_power", &resp.buying_power)?,
    })
}

fn position_from(resp: PositionResponse) -> Result<BrokerPosition, BotError> {
    let mut quantity = decimal("qty", &resp.qty)?;
    if resp.side.as_deref() == Some("short") && quantity > 0.0 {
        quantity = -quantity;
    }
    Ok(BrokerPosition {
        current_price: decimal("current_price", &resp.current_price)?,
        symbol: resp.symbol,
        quantity,
    })
}

fn confirmation_from(resp: OrderResponse) -> OrderConfirmation {
    OrderConfirmation {
        status: OrderStatus::from_broker(&resp.status),
        order_id: resp.id,
    }
}

fn bars_from(symbol: &str, resp: BarsResponse) -> Result<Vec<Bar>, BotError> {
    let mut bars = resp
        .bars
        .unwrap_or_default()
        .into_iter()
        .map(|b| {
            let timestamp = DateTime::parse_from_rfc3339(&b.t)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| BotError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: format!("invalid bar timestamp '{}': {e}", b.t),
                })?;
            Ok(Bar {
                timestamp,
                open: b.o,
                high: b.h,
                low: b.l,
                close: b.c,
                volume: b.v,
            })
        })
        .collect::<Result<Vec<_>, BotError>>()?;

    if bars.is_empty() {
        return Err(BotError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "no bars returned".into(),
        });
    }
    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

impl BrokerGateway for AlpacaClient {
    fn get_account(&self) -> Result<Account, BotError> {
        let url = format!("{}/v2/account", self.base_url);
        account_from(self.send(self.client.get(url), "get account")?)
    }

    fn get_positions(&self) -> Result<HashMap<String, BrokerPosition>, BotError> {
        let url = format!("{}/v2/positions", self.base_url);
        let positions: Vec<PositionResponse> = self.send(self.client.get(url), "list positions")?;
        positions
            .into_iter()
            .map(|p| position_from(p).map(|pos| (pos.symbol.clone(), pos)))
            .collect()
    }

    fn submit_order(&self, order: &OrderRequest) -> Result<OrderConfirmation, BotError> {
        let url = format!("{}/v2/orders", self.base_url);
        let body = OrderBody {
            symbol: &order.symbol,
            qty: order.quantity.to_string(),
            side: order.side.as_str(),
            order_type: order.order_type.as_str(),
            time_in_force: order.time_in_force.as_str(),
        };
        debug!(symbol = %order.symbol, side = %order.side, qty = order.quantity, "submitting order");
        let resp: OrderResponse = self
            .send(self.client.post(url).json(&body), "submit order")
            .map_err(|e| BotError::OrderFailed {
                symbol: order.symbol.clone(),
                reason: e.to_string(),
            })?;
        Ok(confirmation_from(resp))
    }

    fn close_position(&self, symbol: &str) -> Result<OrderConfirmation, BotError> {
        let url = format!("{}/v2/positions/{}", self.base_url, symbol);
        let resp: OrderResponse = self
            .send(self.client.delete(url), "close position")
            .map_err(|e| BotError::OrderFailed {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;
        Ok(confirmation_from(resp))
    }
}

impl MarketDataProvider for AlpacaClient {
    fn get_historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, BotError> {
        let url = format!("{}/v2/stocks/{}/bars", self.data_url, symbol);
        let request = self
            .client
            .get(url)
            .query(&bars_query(timeframe, limit, Utc::now()));
        let resp: BarsResponse =
            self.send(request, "fetch bars")
                .map_err(|e| BotError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                })?;
        bars_from(symbol, resp)
    }
}
