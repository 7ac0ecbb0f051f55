use serde::Serialize;

use crate::candle::{Candle, CandleSeries};
use crate::config::Policy;
use crate::indicators::{ema, rsi};
use crate::vendor::Resolution;

/// Structured view of a single chart, consumed by the pattern-analysis and
/// swing-plan prompts alongside the chart images.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartSnapshot {
    pub symbol: String,
    pub resolution: Resolution,
    pub as_of: Option<String>,
    pub latest_close: Option<f64>,
    pub latest_rsi: Option<f64>,
    pub latest_ema: Option<f64>,
    pub last_candles: Vec<Candle>,
}

impl ChartSnapshot {
    pub fn build(
        symbol: impl Into<String>,
        resolution: Resolution,
        candles: &CandleSeries,
        policy: &Policy,
    ) -> Self {
        let closes = candles.closes();
        let latest = candles.latest();

        Self {
            symbol: symbol.into(),
            resolution,
            as_of: latest.map(Candle::iso_time),
            latest_close: latest.map(|c| c.close),
            latest_rsi: rsi(&closes, policy.rsi_period).last(),
            latest_ema: ema(&closes, policy.ema_period).last(),
            last_candles: candles.tail(policy.snapshot_window).to_vec(),
        }
    }
}
