//! Percent-change and trailing-window metrics, and the per-symbol record
//! built from them.

use serde::{Deserialize, Serialize};

use crate::candle::Candle;
use crate::config::Policy;
use crate::error::MetricsError;
use crate::indicators::{range_average, return_volatility, returns};

/// How many candles back the day/week/month references sit.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ChangeOffsets {
    pub day: usize,
    pub week: usize,
    pub month: usize,
}

impl Default for ChangeOffsets {
    fn default() -> Self {
        Self {
            day: 1,
            week: 5,
            month: 20,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMetrics {
    pub day_change_pct: Option<f64>,
    pub week_change_pct: Option<f64>,
    pub month_change_pct: Option<f64>,
}

/// Percent change of the latest close against the close `offset` candles back.
pub fn change_pct(candles: &[Candle], offset: usize) -> Result<f64, MetricsError> {
    let reference = candles
        .iter()
        .rev()
        .nth(offset)
        .ok_or(MetricsError::InvalidReference)?;
    let latest = candles.last().ok_or(MetricsError::InvalidReference)?;

    if reference.close == 0.0 {
        return Err(MetricsError::InvalidReference);
    }
    Ok((latest.close - reference.close) / reference.close * 100.0)
}

pub fn compute_change_metrics(candles: &[Candle], offsets: &ChangeOffsets) -> ChangeMetrics {
    ChangeMetrics {
        day_change_pct: change_pct(candles, offsets.day).ok(),
        week_change_pct: change_pct(candles, offsets.week).ok(),
        month_change_pct: change_pct(candles, offsets.month).ok(),
    }
}

/// Mean volume over the last `window` candles, skipping candles without
/// volume. `None` when no candle in the window reports one.
pub fn compute_avg_volume(candles: &[Candle], window: usize) -> Option<f64> {
    let tail = &candles[candles.len().saturating_sub(window)..];
    let (sum, count) = tail
        .iter()
        .filter_map(|c| c.volume)
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    (count > 0).then(|| sum / count as f64)
}

/// Snapshot of one symbol's recent behaviour, as handed to the ranker and the
/// prompt layer.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMetrics {
    pub symbol: String,
    pub as_of: String,
    pub latest_close: f64,
    pub day_change_pct: Option<f64>,
    pub week_change_pct: Option<f64>,
    pub month_change_pct: Option<f64>,
    /// Average high-low range over `Policy::atr_window` candles.
    pub atr: f64,
    /// Sample stddev of returns over `Policy::volatility_window`.
    pub volatility: f64,
    pub avg_volume: Option<f64>,
}

impl SymbolMetrics {
    pub fn compute(
        symbol: impl Into<String>,
        candles: &[Candle],
        policy: &Policy,
    ) -> Result<Self, MetricsError> {
        let needed = policy.min_history.max(1);
        let latest = match candles.last() {
            Some(latest) if candles.len() >= needed => latest,
            _ => {
                return Err(MetricsError::InsufficientHistory {
                    needed,
                    available: candles.len(),
                });
            }
        };

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let changes = compute_change_metrics(candles, &policy.change_offsets);

        Ok(Self {
            symbol: symbol.into(),
            as_of: latest.iso_time(),
            latest_close: latest.close,
            day_change_pct: changes.day_change_pct,
            week_change_pct: changes.week_change_pct,
            month_change_pct: changes.month_change_pct,
            atr: range_average(candles, policy.atr_window),
            volatility: return_volatility(&returns(&closes), policy.volatility_window),
            avg_volume: compute_avg_volume(candles, policy.volume_window),
        })
    }
}
