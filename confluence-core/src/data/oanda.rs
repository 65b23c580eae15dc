//! OANDA v3 candle source.
//!
//! Fetches mid-price candles from the instruments candles endpoint, keeps only
//! complete bars, and retries transient failures with exponential backoff.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::provider::{CandleSource, DataError};
use crate::domain::Candle;

pub const DEFAULT_BASE_URL: &str = "https://api-fxpractice.oanda.com";

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    #[serde(default)]
    candles: Vec<OandaCandle>,
}

#[derive(Debug, Deserialize)]
struct OandaCandle {
    complete: bool,
    #[serde(default)]
    volume: f64,
    time: DateTime<Utc>,
    mid: Option<MidPrices>,
}

/// OANDA encodes prices as decimal strings.
#[derive(Debug, Deserialize)]
struct MidPrices {
    o: String,
    h: String,
    l: String,
    c: String,
}

/// OANDA REST candle source.
pub struct OandaSource {
    client: reqwest::blocking::Client,
    api_key: Option<String>,
    base_url: String,
    granularity: String,
    max_retries: u32,
    base_delay: Duration,
}

impl OandaSource {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            granularity: "H1".to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Build from `OANDA_API_KEY` and optional `OANDA_API_URL`.
    pub fn from_env() -> Result<Self, DataError> {
        let key = std::env::var("OANDA_API_KEY").ok();
        let url = std::env::var("OANDA_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(key, url)
    }

    pub fn with_granularity(mut self, granularity: impl Into<String>) -> Self {
        self.granularity = granularity.into();
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn candles_url(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        format!(
            "{}/v3/instruments/{}/candles?price=M&granularity={}&from={}&to={}",
            self.base_url,
            instrument_name(symbol),
            self.granularity,
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }

    fn parse_response(symbol: &str, resp: CandlesResponse) -> Result<Vec<Candle>, DataError> {
        let mut candles = Vec::with_capacity(resp.candles.len());
        for c in resp.candles.into_iter().filter(|c| c.complete) {
            let mid = c.mid.ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("{symbol}: candle without mid prices"))
            })?;
            candles.push(Candle {
                timestamp: c.time,
                open: parse_price(&mid.o)?,
                high: parse_price(&mid.h)?,
                low: parse_price(&mid.l)?,
                close: parse_price(&mid.c)?,
                volume: c.volume,
            });
        }
        Ok(candles)
    }

    fn fetch_with_retry(
        &self,
        key: &str,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        let url = self.candles_url(symbol, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = retry_delay(self.base_delay, attempt, last_error.as_ref());
                debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, "retrying chunk");
                std::thread::sleep(delay);
            }

            match self.client.get(&url).bearer_auth(key).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                        return Err(DataError::AuthenticationRejected(format!("HTTP {status}")));
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::SymbolNotFound {
                            symbol: symbol.to_string(),
                        });
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(1);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if !status.is_success() {
                        last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let body: CandlesResponse = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
                    })?;
                    return Self::parse_response(symbol, body);
                }
                Err(e) => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl CandleSource for OandaSource {
    fn name(&self) -> &str {
        "oanda"
    }

    fn fetch_chunk(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, DataError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DataError::MissingCredentials("OANDA_API_KEY is not set".into()))?;
        self.fetch_with_retry(key, symbol, start, end)
    }
}

/// Wait before retry `attempt` (1-based): exponential backoff from `base`,
/// stretched to the provider's `Retry-After` when it asked for longer.
fn retry_delay(base: Duration, attempt: u32, last_error: Option<&DataError>) -> Duration {
    let backoff = base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    match last_error {
        Some(DataError::RateLimited { retry_after_secs }) => backoff.max(Duration::from_secs(*retry_after_secs)),
        _ => backoff,
    }
}

/// `EURUSD` → `EUR_USD`; names that already contain `_` pass through.
pub fn instrument_name(symbol: &str) -> String {
    if symbol.contains('_') || symbol.len() != 6 || !symbol.is_ascii() {
        return symbol.to_string();
    }
    format!("{}_{}", &symbol[..3], &symbol[3..])
}

fn parse_price(raw: &str) -> Result<f64, DataError> {
    raw.parse::<f64>()
        .map_err(|_| DataError::ResponseFormatChanged(format!("invalid price: {raw:?}")))
}
