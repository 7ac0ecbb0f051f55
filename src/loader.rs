//! Normalizes raw vendor OHLCV payloads into a [`CandleSeries`].
//!
//! Two payload layouts are understood:
//! - an object list under `values`, one object per bar, newest first in
//!   practice (Twelve Data `time_series`);
//! - parallel arrays `t`/`o`/`h`/`l`/`c`/`v` with a status field `s`
//!   (Finnhub `stock/candle`).
//!
//! Everything here is a pure transform over `serde_json::Value`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::candle::{Candle, CandleSeries, deserialize_f64_lenient};
use crate::error::LoadError;

/// Native time order of a vendor payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeriesOrder {
    Ascending,
    Descending,
    /// Compare the first and last timestamps.
    #[default]
    Detect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorShape {
    ObjectList { order: SeriesOrder },
    ParallelArrays { order: SeriesOrder },
}

impl VendorShape {
    fn order(self) -> SeriesOrder {
        match self {
            VendorShape::ObjectList { order } | VendorShape::ParallelArrays { order } => order,
        }
    }
}

#[derive(Deserialize)]
struct ObjectRow {
    #[serde(default)]
    datetime: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    open: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    high: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    low: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    close: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_f64_lenient")]
    volume: Option<f64>,
}

impl ObjectRow {
    fn into_candle(self) -> Option<Candle> {
        let time = match (self.timestamp, self.datetime.as_deref()) {
            (Some(ts), _) => ts,
            (None, Some(text)) => parse_datetime(text)?,
            (None, None) => return None,
        };
        build_candle(time, self.open?, self.high?, self.low?, self.close?, self.volume)
    }
}

/// Decodes a vendor payload into a strictly time-ascending series.
///
/// Returns [`LoadError::NoData`] when the values field is absent, not an
/// array, empty, or holds no usable rows.
pub fn normalize(payload: &Value, shape: VendorShape) -> Result<CandleSeries, LoadError> {
    let candles = match shape {
        VendorShape::ObjectList { .. } => object_list(payload)?,
        VendorShape::ParallelArrays { .. } => parallel_arrays(payload)?,
    };

    let candles = orient(candles, shape.order());
    let series = CandleSeries::from_candles(candles);
    if series.is_empty() {
        return Err(LoadError::NoData);
    }

    debug!(candles = series.len(), "normalized vendor payload");
    Ok(series)
}

fn object_list(payload: &Value) -> Result<Vec<Candle>, LoadError> {
    let rows = non_empty_array(payload.get("values"))?;

    let mut candles = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        match ObjectRow::deserialize(row).ok().and_then(ObjectRow::into_candle) {
            Some(candle) => candles.push(candle),
            None => warn!(index, "skipping malformed candle row"),
        }
    }
    Ok(candles)
}

fn parallel_arrays(payload: &Value) -> Result<Vec<Candle>, LoadError> {
    if payload.get("s").and_then(Value::as_str) == Some("no_data") {
        return Err(LoadError::NoData);
    }

    let closes = non_empty_array(payload.get("c"))?;
    let column = |key: &str| payload.get(key).and_then(Value::as_array);
    let (Some(times), Some(opens), Some(highs), Some(lows)) =
        (column("t"), column("o"), column("h"), column("l"))
    else {
        return Err(LoadError::NoData);
    };
    let volumes = column("v");

    let mut candles = Vec::with_capacity(closes.len());
    for index in 0..closes.len() {
        let cell = |column: &Vec<Value>| column.get(index).and_then(number);
        let candle = times.get(index).and_then(time_value).and_then(|time| {
            build_candle(
                time,
                cell(opens)?,
                cell(highs)?,
                cell(lows)?,
                cell(closes)?,
                volumes.and_then(|v| cell(v)),
            )
        });

        match candle {
            Some(candle) => candles.push(candle),
            None => warn!(index, "skipping malformed candle row"),
        }
    }
    Ok(candles)
}

fn non_empty_array(field: Option<&Value>) -> Result<&Vec<Value>, LoadError> {
    match field.and_then(Value::as_array) {
        Some(rows) if !rows.is_empty() => Ok(rows),
        _ => Err(LoadError::NoData),
    }
}

fn build_candle(
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: Option<f64>,
) -> Option<Candle> {
    // Reject timestamps chrono cannot represent so `iso_time` is always defined.
    DateTime::from_timestamp(time, 0)?;
    // "NaN" and "inf" parse as floats; a bar carrying one is unusable.
    if ![open, high, low, close].iter().all(|v| v.is_finite()) {
        return None;
    }
    let volume = volume.filter(|v| v.is_finite());
    Some(Candle {
        time,
        open,
        high,
        low,
        close,
        volume,
    })
}

fn orient(mut candles: Vec<Candle>, order: SeriesOrder) -> Vec<Candle> {
    let descending = match order {
        SeriesOrder::Ascending => false,
        SeriesOrder::Descending => true,
        SeriesOrder::Detect => matches!(
            (candles.first(), candles.last()),
            (Some(first), Some(last)) if first.time > last.time
        ),
    };
    if descending {
        candles.reverse();
    }
    candles
}

/// `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`, read as UTC.
fn parse_datetime(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
}

fn number(value: &Value) -> Option<f64> {
    deserialize_f64_lenient(value).ok().flatten()
}

fn time_value(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| number(value).map(|t| t as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OBJECT_LIST: VendorShape = VendorShape::ObjectList {
        order: SeriesOrder::Detect,
    };
    const PARALLEL: VendorShape = VendorShape::ParallelArrays {
        order: SeriesOrder::Detect,
    };

    #[test]
    fn object_list_newest_first_is_reversed() {
        let payload = json!({
            "meta": { "symbol": "AAPL" },
            "values": [
                { "datetime": "2024-01-04", "open": "3", "high": "3.5", "low": "2.5", "close": "3.2", "volume": "1000" },
                { "datetime": "2024-01-03", "open": "2", "high": "2.5", "low": "1.5", "close": "2.2", "volume": "900" },
                { "datetime": "2024-01-02", "open": "1", "high": "1.5", "low": "0.5", "close": "1.2" }
            ],
            "status": "ok"
        });

        let series = normalize(&payload, OBJECT_LIST).unwrap();
        assert_eq!(series.len(), 3);
        assert!(series.windows(2).all(|w| w[0].time < w[1].time));
        assert_eq!(series[0].time, 1_704_153_600);
        assert_eq!(series[0].close, 1.2);
        assert_eq!(series[0].volume, None);
        assert_eq!(series[2].volume, Some(1000.0));
    }

    #[test]
    fn explicit_order_flag_overrides_detection() {
        let payload = json!({
            "values": [
                { "timestamp": 100, "open": 1, "high": 1, "low": 1, "close": 1 },
                { "timestamp": 200, "open": 2, "high": 2, "low": 2, "close": 2 }
            ]
        });
        let shape = VendorShape::ObjectList {
            order: SeriesOrder::Ascending,
        };

        let series = normalize(&payload, shape).unwrap();
        assert_eq!(series.iter().map(|c| c.time).collect::<Vec<_>>(), vec![100, 200]);
    }

    #[test]
    fn intraday_datetimes_are_parsed_as_utc() {
        let payload = json!({
            "values": [
                { "datetime": "2024-01-02 15:30:00", "open": 1, "high": 1, "low": 1, "close": 1 }
            ]
        });

        let series = normalize(&payload, OBJECT_LIST).unwrap();
        assert_eq!(series[0].time, 1_704_153_600 + 15 * 3600 + 30 * 60);
    }

    #[test]
    fn missing_or_empty_values_is_no_data() {
        for payload in [
            json!({ "code": 400, "message": "symbol not found", "status": "error" }),
            json!({ "values": [] }),
            json!({ "values": "nope" }),
        ] {
            assert_eq!(normalize(&payload, OBJECT_LIST), Err(LoadError::NoData));
        }
    }

    #[test]
    fn all_rows_malformed_is_no_data() {
        let payload = json!({ "values": [ { "datetime": "yesterday", "close": "1" } ] });
        assert_eq!(normalize(&payload, OBJECT_LIST), Err(LoadError::NoData));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let payload = json!({
            "values": [
                { "datetime": "2024-01-03", "open": "2", "high": "2", "low": "2", "close": "oops" },
                { "datetime": "2024-01-02", "open": "1", "high": "1", "low": "1", "close": "1" }
            ]
        });

        let series = normalize(&payload, OBJECT_LIST).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].close, 1.0);
    }

    #[test]
    fn non_finite_prices_are_skipped() {
        let payload = json!({
            "values": [
                { "datetime": "2024-01-04", "open": "NaN", "high": "inf", "low": "1", "close": "NaN" },
                { "datetime": "2024-01-03", "open": "2", "high": "2", "low": "2", "close": "infinity" },
                { "datetime": "2024-01-02", "open": "1", "high": "1", "low": "1", "close": "1", "volume": "NaN" }
            ]
        });

        let series = normalize(&payload, OBJECT_LIST).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].close, 1.0);
        assert_eq!(series[0].volume, None);

        let only_bad = json!({ "values": [ { "timestamp": 1, "open": "NaN", "high": 1, "low": 1, "close": 1 } ] });
        assert_eq!(normalize(&only_bad, OBJECT_LIST), Err(LoadError::NoData));
    }

    #[test]
    fn parallel_arrays_are_zipped() {
        let payload = json!({
            "s": "ok",
            "t": [100, 200, 300],
            "o": [1.0, 2.0, 3.0],
            "h": [1.5, 2.5, 3.5],
            "l": [0.5, 1.5, 2.5],
            "c": [1.2, 2.2, 3.2],
            "v": [10, null, 30]
        });

        let series = normalize(&payload, PARALLEL).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[1].high, 2.5);
        assert_eq!(series[1].volume, None);
        assert_eq!(series[2].volume, Some(30.0));
    }

    #[test]
    fn parallel_arrays_without_volume_column() {
        let payload = json!({
            "t": [300, 200],
            "o": [3, 2],
            "h": [3, 2],
            "l": [3, 2],
            "c": [3, 2]
        });

        let series = normalize(&payload, PARALLEL).unwrap();
        assert_eq!(series[0].time, 200);
        assert!(series.iter().all(|c| c.volume.is_none()));
    }

    #[test]
    fn parallel_no_data_status() {
        assert_eq!(normalize(&json!({ "s": "no_data" }), PARALLEL), Err(LoadError::NoData));
        assert_eq!(
            normalize(&json!({ "s": "ok", "t": [1], "c": 5 }), PARALLEL),
            Err(LoadError::NoData)
        );
    }
}
