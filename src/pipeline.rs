//! The calling layer around the core: configuration, vendor access, and the
//! documents handed to the prompt layer.

use anyhow::Result;
use tracing::info;

use crate::config::AppConfig;
use crate::ranker::{RankedSelection, rank_universe};
use crate::snapshot::ChartSnapshot;
use crate::storage_utils::AsyncStorageManager;
use crate::vendor::{CandleSource, Resolution, SearchResults, SymbolSearchClient, TwelveDataClient};

pub const STORAGE_DIR: &str = "storage";

/// Loads `storage/config.json` next to the executable, or defaults.
pub async fn load_config(storage: &AsyncStorageManager) -> Result<AppConfig> {
    storage.load_or_default("config").await
}

/// Ranks the configured universe and saves the selection as
/// `market_overview.json` for the prompt layer.
pub async fn run_market_overview(
    config: &AppConfig,
    storage: &AsyncStorageManager,
) -> Result<RankedSelection> {
    let client = TwelveDataClient::from_env(&config.vendor)?
        .with_outputsize(config.vendor.overview_outputsize);

    let selection = rank_universe(
        &client,
        &config.universe,
        config.vendor.overview_resolution,
        &config.policy,
    )
    .await;

    info!(selected = selection.len(), "market overview ready");
    storage.save("market_overview", &selection).await?;
    Ok(selection)
}

/// Fetches one symbol and builds its chart snapshot.
pub async fn run_chart_snapshot(
    config: &AppConfig,
    symbol: &str,
    resolution: Resolution,
) -> Result<ChartSnapshot> {
    let client = TwelveDataClient::from_env(&config.vendor)?
        .with_outputsize(config.vendor.chart_outputsize);

    chart_snapshot(&client, config, symbol, resolution).await
}

/// Looks up tickers matching `query`. Needs the search key; everything past
/// that is best-effort.
pub async fn run_symbol_search(config: &AppConfig, query: &str) -> Result<SearchResults> {
    let client = SymbolSearchClient::from_env(&config.vendor)?;
    Ok(client.search(query).await)
}

pub async fn chart_snapshot<C: CandleSource>(
    source: &C,
    config: &AppConfig,
    symbol: &str,
    resolution: Resolution,
) -> Result<ChartSnapshot> {
    let candles = source.candles(symbol, resolution).await?;
    Ok(ChartSnapshot::build(
        symbol,
        resolution,
        &candles,
        &config.policy,
    ))
}
