//! Technical indicators over closes or candles.
//!
//! `Ema` and `Rsi` are streaming state machines driven through the `ta`
//! crate's `Next` trait; the batch functions below run them over a slice and
//! record where the first defined value lands. Nothing here holds state
//! between calls.

use serde::Serialize;
use ta::errors::{Result as TaResult, TaError};
use ta::{Close, Next, Period, Reset};

use crate::candle::Candle;

/// Indicator values aligned to the tail of a candle sequence.
///
/// `values[i]` belongs to candle index `offset + i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSeries {
    offset: usize,
    values: Vec<f64>,
}

/// One indicator value pinned to its candle's timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorPoint {
    pub time: i64,
    pub value: f64,
}

impl IndicatorSeries {
    pub fn new(offset: usize, values: Vec<f64>) -> Self {
        Self { offset, values }
    }

    /// Index of the first candle that has a value.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Value for a candle index, `None` before the indicator is defined.
    pub fn at(&self, candle_index: usize) -> Option<f64> {
        candle_index
            .checked_sub(self.offset)
            .and_then(|i| self.values.get(i).copied())
    }

    /// Zips values with the timestamps of the candles they belong to.
    pub fn aligned(&self, candles: &[Candle]) -> Vec<IndicatorPoint> {
        candles
            .iter()
            .skip(self.offset)
            .zip(&self.values)
            .map(|(candle, &value)| IndicatorPoint {
                time: candle.time,
                value,
            })
            .collect()
    }
}

/// Exponential moving average seeded with the simple mean of the first
/// `period` inputs. Yields `None` until the seed is complete.
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: f64,
    seed_sum: f64,
    seen: usize,
    current: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> TaResult<Self> {
        if period == 0 {
            return Err(TaError::InvalidParameter);
        }
        Ok(Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            seen: 0,
            current: None,
        })
    }
}

impl Period for Ema {
    fn period(&self) -> usize {
        self.period
    }
}

impl Next<f64> for Ema {
    type Output = Option<f64>;

    fn next(&mut self, input: f64) -> Self::Output {
        match self.current {
            Some(prev) => self.current = Some(input * self.k + prev * (1.0 - self.k)),
            None => {
                self.seed_sum += input;
                self.seen += 1;
                if self.seen == self.period {
                    self.current = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.current
    }
}

impl<T: Close> Next<&T> for Ema {
    type Output = Option<f64>;

    fn next(&mut self, input: &T) -> Self::Output {
        self.next(input.close())
    }
}

impl Reset for Ema {
    fn reset(&mut self) {
        self.seed_sum = 0.0;
        self.seen = 0;
        self.current = None;
    }
}

/// Relative strength index with Wilder's smoothing.
///
/// The first value appears after `period` price differences, i.e. on the
/// `period + 1`-th input. A zero average loss reads as 100.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev: Option<f64>,
    gain_sum: f64,
    loss_sum: f64,
    diffs: usize,
    averages: Option<(f64, f64)>,
}

impl Rsi {
    pub fn new(period: usize) -> TaResult<Self> {
        if period == 0 {
            return Err(TaError::InvalidParameter);
        }
        Ok(Self {
            period,
            prev: None,
            gain_sum: 0.0,
            loss_sum: 0.0,
            diffs: 0,
            averages: None,
        })
    }
}

impl Period for Rsi {
    fn period(&self) -> usize {
        self.period
    }
}

impl Next<f64> for Rsi {
    type Output = Option<f64>;

    fn next(&mut self, input: f64) -> Self::Output {
        let prev = self.prev.replace(input)?;
        let change = input - prev;
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        let period = self.period as f64;

        match self.averages {
            Some((avg_gain, avg_loss)) => {
                self.averages = Some((
                    (avg_gain * (period - 1.0) + gain) / period,
                    (avg_loss * (period - 1.0) + loss) / period,
                ));
            }
            None => {
                self.gain_sum += gain;
                self.loss_sum += loss;
                self.diffs += 1;
                if self.diffs == self.period {
                    self.averages = Some((self.gain_sum / period, self.loss_sum / period));
                }
            }
        }

        self.averages
            .map(|(avg_gain, avg_loss)| rsi_from_averages(avg_gain, avg_loss))
    }
}

impl<T: Close> Next<&T> for Rsi {
    type Output = Option<f64>;

    fn next(&mut self, input: &T) -> Self::Output {
        self.next(input.close())
    }
}

impl Reset for Rsi {
    fn reset(&mut self) {
        self.prev = None;
        self.gain_sum = 0.0;
        self.loss_sum = 0.0;
        self.diffs = 0;
        self.averages = None;
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// EMA over `values`. Offset is `period - 1`; empty if `values` is shorter
/// than `period` or `period` is zero.
pub fn ema(values: &[f64], period: usize) -> IndicatorSeries {
    if values.len() < period {
        return IndicatorSeries::default();
    }
    let Ok(mut state) = Ema::new(period) else {
        return IndicatorSeries::default();
    };

    let values = values.iter().filter_map(|&v| state.next(v)).collect();
    IndicatorSeries::new(period - 1, values)
}

/// RSI over `values`. Offset is `period`; empty unless `values` is longer
/// than `period`.
pub fn rsi(values: &[f64], period: usize) -> IndicatorSeries {
    if values.len() <= period {
        return IndicatorSeries::default();
    }
    let Ok(mut state) = Rsi::new(period) else {
        return IndicatorSeries::default();
    };

    let values = values.iter().filter_map(|&v| state.next(v)).collect();
    IndicatorSeries::new(period, values)
}

/// Mean of `high - low` over the last `window` candles. This is the plain
/// bar range, not Wilder's true range.
pub fn range_average(candles: &[Candle], window: usize) -> f64 {
    let tail = &candles[candles.len().saturating_sub(window)..];
    if tail.is_empty() {
        return 0.0;
    }
    tail.iter().map(|c| c.high - c.low).sum::<f64>() / tail.len() as f64
}

/// Single-period simple returns; a zero previous close counts as a 0 return.
pub fn returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { (w[1] - w[0]) / w[0] })
        .collect()
}

/// Sample standard deviation (n - 1) of the last `window` returns.
pub fn return_volatility(returns: &[f64], window: usize) -> f64 {
    let tail = &returns[returns.len().saturating_sub(window)..];
    if tail.len() < 2 {
        return 0.0;
    }

    let n = tail.len() as f64;
    let mean = tail.iter().sum::<f64>() / n;
    let variance = tail.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}
