use anyhow::{Result, bail};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chartwise::pipeline::{self, STORAGE_DIR};
use chartwise::report::render_selection;
use chartwise::storage_utils::AsyncStorageManager;
use chartwise::vendor::Resolution;

const USAGE: &str =
    "usage: chartwise [overview | search <QUERY> | chart <SYMBOL> [5|15|60|D|W|M]]";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let storage = AsyncStorageManager::new_relative(STORAGE_DIR).await?;
    let config = pipeline::load_config(&storage).await?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] | ["overview"] => {
            info!(universe = config.universe.len(), "ranking universe");
            let selection = pipeline::run_market_overview(&config, &storage).await?;
            if selection.is_empty() {
                println!("No symbols passed the filters.");
            } else {
                println!("\n{}", render_selection(&selection));
            }
        }
        ["search", words @ ..] if !words.is_empty() => {
            let query = words.join(" ");
            let results = pipeline::run_symbol_search(&config, &query).await?;
            if results.result.is_empty() {
                println!("No matches for {:?}.", query);
            }
            for hit in &results.result {
                println!("{:<12} {:<16} {}", hit.display_symbol, hit.kind, hit.description);
            }
        }
        ["chart", symbol, rest @ ..] => {
            let resolution = rest
                .first()
                .map(|code| Resolution::from_code(code))
                .unwrap_or_default();
            let snapshot = pipeline::run_chart_snapshot(&config, symbol, resolution).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
