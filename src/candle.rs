use chrono::{DateTime, SecondsFormat};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::Deref;

/// A single OHLCV bar. `time` is unix seconds at the bar open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

impl Candle {
    /// ISO-8601 rendering of `time` with millisecond precision and a `Z` suffix.
    pub fn iso_time(&self) -> String {
        DateTime::from_timestamp(self.time, 0)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }
}

impl ta::Open for Candle {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}

/// Candles ordered oldest to newest with strictly increasing `time`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CandleSeries(Vec<Candle>);

impl CandleSeries {
    /// Sorts by time and collapses duplicate timestamps, keeping the later row.
    pub fn from_candles(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.time);

        let mut ordered: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match ordered.last_mut() {
                Some(last) if last.time == candle.time => *last = candle,
                _ => ordered.push(candle),
            }
        }
        Self(ordered)
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.0.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.0.iter().map(|c| c.close).collect()
    }

    /// The trailing `count` candles (all of them if the series is shorter).
    pub fn tail(&self, count: usize) -> &[Candle] {
        &self.0[self.0.len().saturating_sub(count)..]
    }

    pub fn into_inner(self) -> Vec<Candle> {
        self.0
    }
}

impl Deref for CandleSeries {
    type Target = [Candle];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// --- Lenient numeric decoding ---
// Vendors send prices as numbers or as numeric strings, sometimes blank.

struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a float, an integer, or a string representing a number")
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            trimmed.parse::<f64>().map(Some).map_err(E::custom)
        }
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

pub(crate) fn deserialize_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientF64Visitor)
}
