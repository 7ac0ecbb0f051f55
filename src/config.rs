use serde::{Deserialize, Serialize};

use crate::metrics::ChangeOffsets;
use crate::vendor::Resolution;

// CONFIGURATION STRUCTS
// Every field carries a serde default so a partial config.json still loads.

/// Numeric policy shared by the metrics and the ranker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Policy {
    pub rsi_period: usize,        // 14
    pub ema_period: usize,        // 20
    pub atr_window: usize,        // 14 candles of high-low range
    pub volatility_window: usize, // 20 returns
    pub volume_window: usize,     // 20 candles
    pub min_history: usize,       // symbols with fewer candles are dropped
    pub min_liquidity: f64,       // average volume floor
    pub top_k: usize,
    pub max_concurrency: usize, // per-symbol fetches in flight
    pub snapshot_window: usize, // candles carried in a chart snapshot
    pub change_offsets: ChangeOffsets,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            ema_period: 20,
            atr_window: 14,
            volatility_window: 20,
            volume_window: 20,
            min_history: 25,
            min_liquidity: 2_000_000.0,
            top_k: 5,
            max_concurrency: 4,
            snapshot_window: 30,
            change_offsets: ChangeOffsets::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct VendorConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub overview_outputsize: u32,
    pub chart_outputsize: u32,
    pub overview_resolution: Resolution,
    /// Finnhub, used only for symbol search.
    pub search_base_url: String,
    pub search_api_key_env: String,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twelvedata.com".to_string(),
            api_key_env: "TWELVEDATA_API_KEY".to_string(),
            overview_outputsize: 120,
            chart_outputsize: 500,
            overview_resolution: Resolution::Daily,
            search_base_url: "https://finnhub.io/api/v1".to_string(),
            search_api_key_env: "FINNHUB_API_KEY".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub policy: Policy,
    pub vendor: VendorConfig,
    pub universe: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            vendor: VendorConfig::default(),
            universe: [
                "SPY", "QQQ", "TSLA", "AAPL", "AMZN", "NVDA", "META", "MSFT", "GOOGL", "AMD",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "policy": { "top_k": 3, "change_offsets": { "week": 7 } }, "universe": ["IWM"] }"#,
        )
        .unwrap();

        assert_eq!(config.policy.top_k, 3);
        assert_eq!(config.policy.min_history, 25);
        assert_eq!(config.policy.change_offsets.week, 7);
        assert_eq!(config.policy.change_offsets.month, 20);
        assert_eq!(config.universe, vec!["IWM".to_string()]);
        assert_eq!(config.vendor, VendorConfig::default());
        assert_eq!(config.vendor.search_api_key_env, "FINNHUB_API_KEY");
    }

    #[test]
    fn resolution_accepts_dashboard_and_vendor_codes() {
        let vendor: VendorConfig =
            serde_json::from_str(r#"{ "overview_resolution": "1week" }"#).unwrap();
        assert_eq!(vendor.overview_resolution, Resolution::Weekly);

        let vendor: VendorConfig = serde_json::from_str(r#"{ "overview_resolution": "60" }"#).unwrap();
        assert_eq!(vendor.overview_resolution, Resolution::Hourly);
    }
}
