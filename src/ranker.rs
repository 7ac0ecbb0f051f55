//! Fans the per-symbol computation out over a universe and keeps the most
//! volatile liquid names.
//!
//! Per-symbol futures run through an unordered buffered stream polled by the
//! caller's task: at most `Policy::max_concurrency` are in flight, none are
//! spawned, and dropping the `rank` future drops every in-flight unit with it.
//! A finished unit frees its slot at once, whatever its universe position;
//! results are put back in universe order before ranking.

use std::cmp::Ordering;
use std::fmt::Display;
use std::future::Future;
use std::ops::Deref;

use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Policy;
use crate::metrics::SymbolMetrics;
use crate::vendor::{CandleSource, Resolution};

/// Liquid symbols sorted by descending volatility, at most `top_k` long.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct RankedSelection(Vec<SymbolMetrics>);

impl RankedSelection {
    pub fn into_inner(self) -> Vec<SymbolMetrics> {
        self.0
    }
}

impl Deref for RankedSelection {
    type Target = [SymbolMetrics];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Runs `fetch_and_compute` for every symbol and ranks whatever succeeded.
///
/// A symbol whose future resolves to `Err` is logged and dropped; the batch
/// always waits for every symbol to settle.
pub async fn rank<S, F, Fut, E>(symbols: &[S], fetch_and_compute: F, policy: &Policy) -> RankedSelection
where
    S: AsRef<str>,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<SymbolMetrics, E>>,
    E: Display,
{
    let concurrency = policy.max_concurrency.max(1);

    let mut settled: Vec<(usize, Option<SymbolMetrics>)> =
        stream::iter(symbols.iter().map(|s| s.as_ref().to_string()).enumerate())
            .map(|(index, symbol)| {
                let unit = fetch_and_compute(symbol.clone());
                async move {
                    let metrics = match unit.await {
                        Ok(metrics) => Some(metrics),
                        Err(error) => {
                            warn!(%symbol, %error, "skipping symbol");
                            None
                        }
                    };
                    (index, metrics)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

    // Completion order is arbitrary; ties must resolve by universe position.
    settled.sort_unstable_by_key(|(index, _)| *index);
    let computed: Vec<SymbolMetrics> = settled.into_iter().filter_map(|(_, m)| m).collect();
    info!(
        universe = symbols.len(),
        computed = computed.len(),
        "universe settled"
    );
    select(computed, policy)
}

/// Liquidity filter, stable volatility sort, and truncation. `metrics` must be
/// in universe order for ties to resolve deterministically.
pub fn select(metrics: Vec<SymbolMetrics>, policy: &Policy) -> RankedSelection {
    let mut liquid: Vec<SymbolMetrics> = metrics
        .into_iter()
        .filter(|m| {
            let keep = m.avg_volume.is_none_or(|v| v >= policy.min_liquidity);
            if !keep {
                debug!(symbol = %m.symbol, avg_volume = ?m.avg_volume, "below liquidity floor");
            }
            keep
        })
        .collect();

    liquid.sort_by(by_volatility_desc);
    liquid.truncate(policy.top_k);
    RankedSelection(liquid)
}

// NaN volatility sorts after every real value.
fn by_volatility_desc(a: &SymbolMetrics, b: &SymbolMetrics) -> Ordering {
    match (a.volatility.is_nan(), b.volatility.is_nan()) {
        (false, false) => b
            .volatility
            .partial_cmp(&a.volatility)
            .unwrap_or(Ordering::Equal),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    }
}

/// Ranks a universe fetched through `source`. Symbols with fewer than
/// `policy.min_history` candles are dropped before ranking.
pub async fn rank_universe<C, S>(
    source: &C,
    symbols: &[S],
    resolution: Resolution,
    policy: &Policy,
) -> RankedSelection
where
    C: CandleSource,
    S: AsRef<str>,
{
    rank(
        symbols,
        |symbol| async move {
            let candles = source.candles(&symbol, resolution).await?;
            SymbolMetrics::compute(symbol, &candles, policy)
        },
        policy,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn metrics(symbol: &str, volatility: f64, avg_volume: Option<f64>) -> SymbolMetrics {
        SymbolMetrics {
            symbol: symbol.to_string(),
            as_of: "2024-01-02T00:00:00.000Z".to_string(),
            latest_close: 100.0,
            day_change_pct: None,
            week_change_pct: None,
            month_change_pct: None,
            atr: 1.0,
            volatility,
            avg_volume,
        }
    }

    fn symbols(selection: &RankedSelection) -> Vec<&str> {
        selection.iter().map(|m| m.symbol.as_str()).collect()
    }

    #[test]
    fn unknown_liquidity_passes_the_filter() {
        let policy = Policy::default();
        let selection = select(
            vec![
                metrics("THIN", 0.9, Some(1_999_999.0)),
                metrics("UNKNOWN", 0.5, None),
                metrics("EXACT", 0.4, Some(2_000_000.0)),
            ],
            &policy,
        );
        assert_eq!(symbols(&selection), vec!["UNKNOWN", "EXACT"]);
    }

    #[test]
    fn ties_keep_universe_order_and_nan_sorts_last() {
        let policy = Policy::default();
        let selection = select(
            vec![
                metrics("NAN", f64::NAN, None),
                metrics("B", 0.2, None),
                metrics("A", 0.3, None),
                metrics("C", 0.2, None),
            ],
            &policy,
        );
        assert_eq!(symbols(&selection), vec!["A", "B", "C", "NAN"]);
    }

    #[test]
    fn truncates_to_top_k() {
        let policy = Policy {
            top_k: 2,
            ..Policy::default()
        };
        let universe = (0..6).map(|i| metrics(&format!("S{i}"), i as f64, None)).collect();
        assert_eq!(symbols(&select(universe, &policy)), vec!["S5", "S4"]);
    }

    #[tokio::test]
    async fn failures_are_dropped_not_fatal() {
        let policy = Policy::default();
        let universe = ["OK1", "FAIL", "OK2"];

        let selection = rank(
            &universe,
            |symbol| async move {
                match symbol.as_str() {
                    "FAIL" => Err(LoadError::NoData),
                    "OK1" => Ok(metrics(&symbol, 0.1, None)),
                    _ => Ok(metrics(&symbol, 0.2, None)),
                }
            },
            &policy,
        )
        .await;

        assert_eq!(symbols(&selection), vec!["OK2", "OK1"]);
    }

    #[tokio::test]
    async fn slow_leader_does_not_hold_back_later_symbols() {
        // SLOW only finishes once LAST has started, which needs FAST's slot.
        let notify = Notify::new();
        let release = &notify;
        let policy = Policy {
            max_concurrency: 2,
            ..Policy::default()
        };

        let ranking = rank(
            &["SLOW", "FAST", "LAST"],
            move |symbol| async move {
                match symbol.as_str() {
                    "SLOW" => release.notified().await,
                    "LAST" => release.notify_one(),
                    _ => {}
                }
                Ok::<_, LoadError>(metrics(&symbol, 0.1, None))
            },
            &policy,
        );

        let selection = tokio::time::timeout(Duration::from_secs(5), ranking)
            .await
            .expect("a finished symbol should free its slot");
        assert_eq!(symbols(&selection), vec!["SLOW", "FAST", "LAST"]);
    }

    #[tokio::test]
    async fn everything_failing_yields_empty_selection() {
        let selection = rank(
            &["A", "B"],
            |_| async { Err::<SymbolMetrics, _>("boom") },
            &Policy::default(),
        )
        .await;
        assert!(selection.is_empty());
    }
}
