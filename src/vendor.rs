//! Market-data vendor boundary.
//!
//! [`CandleSource`] is what the ranker and the chart pipeline fetch through;
//! [`TwelveDataClient`] is the HTTP implementation. Every failure comes back as
//! a [`LoadError`]; nothing here retries.
//!
//! [`SymbolSearchClient`] looks tickers up on Finnhub. Search is best-effort:
//! any failure reads as no matches.

use std::future::Future;
use std::sync::LazyLock;

use anyhow::Context;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::candle::CandleSeries;
use crate::config::VendorConfig;
use crate::error::LoadError;
use crate::loader::{SeriesOrder, VendorShape, normalize};

static SYMBOL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.:\-]{1,20}$").expect("symbol pattern is valid"));

// Company names as typed into a search box: "apple", "Berkshire Hathaway", "AT&T".
static QUERY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 .:&'\-]{1,50}$").expect("query pattern is valid"));

/// Chart resolution. Serializes as the dashboard code (`"5"`, `"D"`, ...).
/// Deserializes through [`Resolution::from_code`], so vendor interval names
/// are accepted too and unknown codes read as daily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Resolution {
    #[serde(rename = "5")]
    FiveMinutes,
    #[serde(rename = "15")]
    FifteenMinutes,
    #[serde(rename = "60")]
    Hourly,
    #[default]
    #[serde(rename = "D")]
    Daily,
    #[serde(rename = "W")]
    Weekly,
    #[serde(rename = "M")]
    Monthly,
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = String::deserialize(deserializer)?;
        Ok(Resolution::from_code(&code))
    }
}

impl Resolution {
    /// Unknown codes fall back to daily bars.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "5" | "5min" => Resolution::FiveMinutes,
            "15" | "15min" => Resolution::FifteenMinutes,
            "60" | "1h" => Resolution::Hourly,
            "W" | "1week" => Resolution::Weekly,
            "M" | "1month" => Resolution::Monthly,
            _ => Resolution::Daily,
        }
    }

    pub fn vendor_interval(self) -> &'static str {
        match self {
            Resolution::FiveMinutes => "5min",
            Resolution::FifteenMinutes => "15min",
            Resolution::Hourly => "1h",
            Resolution::Daily => "1day",
            Resolution::Weekly => "1week",
            Resolution::Monthly => "1month",
        }
    }
}

/// Anything that can produce a normalized candle series for a symbol.
pub trait CandleSource {
    fn candles(
        &self,
        symbol: &str,
        resolution: Resolution,
    ) -> impl Future<Output = Result<CandleSeries, LoadError>> + Send;
}

pub fn validate_symbol(symbol: &str) -> Result<(), LoadError> {
    if SYMBOL_PATTERN.is_match(symbol) {
        Ok(())
    } else {
        Err(LoadError::InvalidSymbol(symbol.to_string()))
    }
}

/// Error body Twelve Data sends with a 200: `{"code":..,"message":..,"status":"error"}`.
fn vendor_error(payload: &Value) -> Option<LoadError> {
    if payload.get("status").and_then(Value::as_str) != Some("error") {
        return None;
    }
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("upstream request failed");
    Some(LoadError::Vendor(message.to_string()))
}

fn http_client() -> anyhow::Result<Client> {
    Ok(Client::builder().pool_max_idle_per_host(50).build()?)
}

pub struct TwelveDataClient {
    client: Client,
    base_url: String,
    api_key: String,
    outputsize: u32,
}

impl TwelveDataClient {
    pub fn new(config: &VendorConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self::with_client(http_client()?, config, api_key))
    }

    /// Builds on an existing `reqwest::Client` so several vendors can share
    /// one connection pool.
    pub fn with_client(client: Client, config: &VendorConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            outputsize: config.overview_outputsize,
        }
    }

    /// Reads the API key from the variable named in `config.api_key_env`.
    pub fn from_env(config: &VendorConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("Missing {}", config.api_key_env))?;
        Self::new(config, api_key)
    }

    /// Number of bars requested per call.
    pub fn with_outputsize(mut self, outputsize: u32) -> Self {
        self.outputsize = outputsize;
        self
    }

    async fn fetch(&self, symbol: &str, resolution: Resolution) -> Result<CandleSeries, LoadError> {
        validate_symbol(symbol)?;

        let url = format!("{}/time_series", self.base_url);
        let outputsize = self.outputsize.to_string();
        let query = [
            ("symbol", symbol),
            ("interval", resolution.vendor_interval()),
            ("outputsize", outputsize.as_str()),
            ("apikey", self.api_key.as_str()),
        ];

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| LoadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(symbol, %status, "vendor rejected request");
            return Err(LoadError::Vendor(format!("HTTP {}", status)));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| LoadError::Transport(e.to_string()))?;

        if let Some(error) = vendor_error(&payload) {
            return Err(error);
        }

        let series = normalize(
            &payload,
            VendorShape::ObjectList {
                order: SeriesOrder::Detect,
            },
        )?;
        debug!(symbol, candles = series.len(), "fetched candles");
        Ok(series)
    }
}

impl CandleSource for TwelveDataClient {
    fn candles(
        &self,
        symbol: &str,
        resolution: Resolution,
    ) -> impl Future<Output = Result<CandleSeries, LoadError>> + Send {
        self.fetch(symbol, resolution)
    }
}

// --- Symbol search ---

/// Finnhub `/search` body: `{"count": 2, "result": [...]}`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub result: Vec<SymbolMatch>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMatch {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_symbol: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

pub struct SymbolSearchClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SymbolSearchClient {
    pub fn new(config: &VendorConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self::with_client(http_client()?, config, api_key))
    }

    pub fn with_client(client: Client, config: &VendorConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: config.search_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Reads the API key from the variable named in `config.search_api_key_env`.
    pub fn from_env(config: &VendorConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.search_api_key_env)
            .with_context(|| format!("Missing {}", config.search_api_key_env))?;
        Self::new(config, api_key)
    }

    /// Matches for `query`. Blank or malformed queries and upstream failures
    /// all come back empty.
    pub async fn search(&self, query: &str) -> SearchResults {
        let query = query.trim();
        if !QUERY_PATTERN.is_match(query) {
            debug!(query, "ignoring search query");
            return SearchResults::default();
        }

        match self.try_search(query).await {
            Ok(results) => {
                debug!(query, matches = results.result.len(), "search done");
                results
            }
            Err(error) => {
                warn!(query, %error, "search failed");
                SearchResults::default()
            }
        }
    }

    async fn try_search(&self, query: &str) -> Result<SearchResults, LoadError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| LoadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Vendor(format!("HTTP {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| LoadError::Transport(e.to_string()))
    }
}
