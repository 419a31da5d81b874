//! Candle representation and series validation.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }
}

/// Column views over a candle series, in the shape the indicator functions take.
#[derive(Debug, Clone, Default)]
pub struct PriceColumns {
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
}

impl PriceColumns {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut cols = PriceColumns {
            closes: Vec::with_capacity(candles.len()),
            highs: Vec::with_capacity(candles.len()),
            lows: Vec::with_capacity(candles.len()),
        };
        for c in candles {
            cols.closes.push(c.close);
            cols.highs.push(c.high);
            cols.lows.push(c.low);
        }
        cols
    }
}

/// Fails if timestamps are not strictly increasing.
pub fn validate_series(candles: &[Candle]) -> Result<(), EngineError> {
    for (i, pair) in candles.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(EngineError::UnorderedCandles { index: i + 1 });
        }
    }
    Ok(())
}

/// The finite candles of a series and where each one sat in the input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanSeries {
    pub candles: Vec<Candle>,
    /// `source_index[i]` is the input position of `candles[i]`.
    pub source_index: Vec<usize>,
}

impl CleanSeries {
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

/// Drops candles carrying any non-finite OHLCV value.
pub fn sanitize(candles: &[Candle]) -> CleanSeries {
    let mut clean = CleanSeries {
        candles: Vec::with_capacity(candles.len()),
        source_index: Vec::with_capacity(candles.len()),
    };
    for (index, candle) in candles.iter().enumerate() {
        if candle.is_finite() {
            clean.candles.push(*candle);
            clean.source_index.push(index);
        } else {
            warn!(index, timestamp = candle.timestamp, "dropping malformed candle");
        }
    }
    clean
}
