/// Failures while turning a vendor response into a candle series.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("vendor returned no usable series")]
    NoData,

    #[error("vendor error: {0}")]
    Vendor(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),
}

/// Failures while deriving metrics from a candle series.
///
/// `InvalidReference` never escapes a successful [`SymbolMetrics`] record; the
/// change helpers fold it into a `None` field.
///
/// [`SymbolMetrics`]: crate::metrics::SymbolMetrics
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    #[error("insufficient history: need {needed} candles, got {available}")]
    InsufficientHistory { needed: usize, available: usize },

    #[error("reference candle missing or has a zero close")]
    InvalidReference,

    #[error(transparent)]
    Load(#[from] LoadError),
}
