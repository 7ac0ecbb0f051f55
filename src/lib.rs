//! Market analytics for the ChartWise dashboard: candle normalization,
//! indicators, per-symbol metrics, and universe ranking.

pub mod candle;
pub mod config;
pub mod error;
pub mod indicators;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod ranker;
pub mod report;
pub mod snapshot;
pub mod storage_utils;
pub mod vendor;

pub use candle::{Candle, CandleSeries};
pub use config::{AppConfig, Policy};
pub use error::{LoadError, MetricsError};
pub use indicators::IndicatorSeries;
pub use loader::{SeriesOrder, VendorShape, normalize};
pub use metrics::{ChangeMetrics, SymbolMetrics};
pub use ranker::{RankedSelection, rank, rank_universe};
pub use snapshot::ChartSnapshot;
pub use vendor::{CandleSource, Resolution, SearchResults, SymbolSearchClient};
