// =============================================================================
// Binance USDⓈ-M Futures REST Client — public kline history
// =============================================================================
//
// Only the public `GET /fapi/v1/klines` endpoint is used, so no request
// signing is needed.  An API key, when configured, is sent as X-MBX-APIKEY
// and is never logged.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, instrument};

use super::rate_limit::{klines_weight, WeightTracker};
use crate::error::ScanError;
use crate::market_data::{Candle, MarketDataClient, Series};

const FUTURES_API: &str = "https://fapi.binance.com";

/// Largest `limit` the klines endpoint accepts.
pub const MAX_KLINES_LIMIT: usize = 1500;

/// Binance futures REST client for candle history.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    base_url: String,
    client: reqwest::Client,
    weight: Arc<WeightTracker>,
}

impl BinanceFuturesClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_key` — optional Binance API key (header only).
    /// * `timeout` — bound on every request, connect through body.
    pub fn new(api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let val = HeaderValue::from_str(key).context("API key is not a valid header value")?;
            default_headers.insert("X-MBX-APIKEY", val);
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client for BinanceFuturesClient")?;

        debug!(base_url = FUTURES_API, "BinanceFuturesClient initialised");

        Ok(Self {
            base_url: FUTURES_API.to_string(),
            client,
            weight: Arc::new(WeightTracker::new()),
        })
    }

    /// Point the client at a different REST host.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /fapi/v1/klines (public — no signature required).
    ///
    /// Array indices of each entry:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime, [7] quoteAssetVolume, [8] numberOfTrades, ...
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ScanError> {
        if !self.weight.can_send_request(klines_weight(limit)) {
            return Err(ScanError::data_unavailable(
                symbol,
                "request weight budget exhausted for this minute",
            ));
        }

        let url = format!("{}/fapi/v1/klines", self.base_url);
        let limit_s = limit.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("limit", limit_s.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                ScanError::data_unavailable(symbol, format!("GET /fapi/v1/klines failed: {e}"))
            })?;

        self.weight.update_from_headers(resp.headers());

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| {
                ScanError::data_unavailable(symbol, format!("failed to parse klines response: {e}"))
            })?;

        if !status.is_success() {
            // e.g. 400 {"code":-1121,"msg":"Invalid symbol."}
            let msg = body["msg"].as_str().unwrap_or("no message");
            return Err(ScanError::data_unavailable(
                symbol,
                format!("Binance GET /fapi/v1/klines returned {status}: {msg}"),
            ));
        }

        let candles = parse_klines(symbol, &body)?;
        debug!(
            symbol,
            interval,
            count = candles.len(),
            used_weight = self.weight.used_weight(),
            "klines fetched"
        );
        Ok(candles)
    }
}

#[async_trait]
impl MarketDataClient for BinanceFuturesClient {
    async fn fetch(
        &self,
        instrument: &str,
        interval: &str,
        count: usize,
    ) -> Result<Series, ScanError> {
        if !(2..=MAX_KLINES_LIMIT).contains(&count) {
            return Err(ScanError::data_unavailable(
                instrument,
                format!("lookback {count} outside 2..={MAX_KLINES_LIMIT}"),
            ));
        }

        let candles = self.get_klines(instrument, interval, count).await?;
        let series = Series::new(instrument, interval, candles)?;
        if series.is_empty() {
            return Err(ScanError::data_unavailable(instrument, "empty klines payload"));
        }

        Ok(series)
    }
}

// -----------------------------------------------------------------------------
// Payload parsing
// -----------------------------------------------------------------------------

/// Parse the array-of-arrays klines payload.  Any malformed entry fails the
/// whole payload rather than leaving a silent hole in the series.
pub fn parse_klines(symbol: &str, body: &serde_json::Value) -> Result<Vec<Candle>, ScanError> {
    let raw = body
        .as_array()
        .ok_or_else(|| ScanError::data_unavailable(symbol, "klines response is not an array"))?;

    raw.iter()
        .enumerate()
        .map(|(i, entry)| {
            parse_entry(entry).map_err(|reason| {
                ScanError::data_unavailable(symbol, format!("kline entry {i}: {reason}"))
            })
        })
        .collect()
}

fn parse_entry(entry: &serde_json::Value) -> Result<Candle, String> {
    let arr = entry.as_array().ok_or("not an array")?;
    if arr.len() < 7 {
        return Err(format!("expected at least 7 fields, got {}", arr.len()));
    }

    let open_time = arr[0].as_i64().ok_or("openTime is not an integer")?;
    let close_time = arr[6].as_i64().ok_or("closeTime is not an integer")?;

    Ok(Candle::new(
        open_time,
        parse_str_f64(&arr[1], "open")?,
        parse_str_f64(&arr[2], "high")?,
        parse_str_f64(&arr[3], "low")?,
        parse_str_f64(&arr[4], "close")?,
        parse_str_f64(&arr[5], "volume")?,
        close_time,
    ))
}

/// Binance sends decimals as JSON strings; accept plain numbers too.
fn parse_str_f64(val: &serde_json::Value, name: &str) -> Result<f64, String> {
    let parsed = match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| format!("failed to parse {name} '{s}' as f64"))?,
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{name} is not a valid f64"))?,
        other => return Err(format!("{name} has unexpected JSON type: {other}")),
    };

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(format!("{name} is not finite"))
    }
}

impl std::fmt::Debug for BinanceFuturesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceFuturesClient")
            .field("base_url", &self.base_url)
            .field("weight", &self.weight)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const KLINES: &str = r#"[
        [1700000000000, "37000.10", "37050.00", "36990.00", "37020.00", "123.456", 1700000299999, "4567890.12", 1500, "60.1", "2224455.6", "0"],
        [1700000300000, "37020.00", "37100.00", "37010.00", "37090.50", "98.7", 1700000599999, "3650000.00", 1200, "50.0", "1800000.0", "0"]
    ]"#;

    fn client(base: &str) -> BinanceFuturesClient {
        BinanceFuturesClient::new(None, Duration::from_secs(2))
            .unwrap()
            .with_base_url(base)
    }

    #[test]
    fn parses_string_and_numeric_fields() {
        let body = json!([[0, "1.5", 2.0, "1.0", "1.75", 10, 299_999]]);
        let candles = parse_klines("BTCUSDT", &body).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].open, 1.5);
        assert_eq!(candles[0].high, 2.0);
        assert_eq!(candles[0].close, 1.75);
        assert_eq!(candles[0].volume, 10.0);
        assert_eq!(candles[0].close_time, 299_999);
    }

    #[test]
    fn malformed_entry_fails_whole_payload() {
        let body = json!([[0, "1", "1", "1", "1", "1", 1], [1, "x", "1", "1", "1", "1", 2]]);
        let err = parse_klines("BTCUSDT", &body).unwrap_err();
        assert!(err.to_string().contains("kline entry 1"));

        let body = json!([[0, "1", "1"]]);
        assert!(parse_klines("BTCUSDT", &body).is_err());

        let body = json!({"code": -1121});
        assert!(parse_klines("BTCUSDT", &body).is_err());
    }

    #[tokio::test]
    async fn fetch_returns_ascending_series() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/fapi/v1/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
                Matcher::UrlEncoded("interval".into(), "5m".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("X-MBX-USED-WEIGHT-1M", "12")
            .with_body(KLINES)
            .create_async()
            .await;

        let series = client(&server.url()).fetch("BTCUSDT", "5m", 2).await.unwrap();
        mock.assert_async().await;

        assert_eq!(series.instrument(), "BTCUSDT");
        assert_eq!(series.interval(), "5m");
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().close, 37090.5);
    }

    #[tokio::test]
    async fn unknown_symbol_is_data_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/klines")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-1121,"msg":"Invalid symbol."}"#)
            .create_async()
            .await;

        let err = client(&server.url()).fetch("NOPEUSDT", "5m", 100).await.unwrap_err();
        assert!(matches!(err, ScanError::DataUnavailable { .. }));
        assert!(err.to_string().contains("Invalid symbol."));
    }

    #[tokio::test]
    async fn empty_payload_is_data_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fapi/v1/klines")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let err = client(&server.url()).fetch("BTCUSDT", "5m", 100).await.unwrap_err();
        assert!(err.to_string().contains("empty klines payload"));
    }

    #[tokio::test]
    async fn lookback_below_two_is_rejected_without_request() {
        let err = client("http://127.0.0.1:1").fetch("BTCUSDT", "5m", 1).await.unwrap_err();
        assert!(matches!(err, ScanError::DataUnavailable { .. }));
    }
}
