//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with the SMA of the first n closes, then
//! EMA[i] = EMA[i-1]*(1-k) + C[i]*k.
//! Output length: len - n + 1 (empty when len < n).

use crate::domain::indicator::{IndicatorSeries, IndicatorType};

pub fn ema(closes: &[f64], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ema(period);
    if period == 0 || closes.len() < period {
        return IndicatorSeries::new(indicator_type, Vec::new());
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut values = Vec::with_capacity(closes.len() - period + 1);

    let mut prev = closes[..period].iter().sum::<f64>() / period as f64;
    values.push(prev);

    for &price in &closes[period..] {
        prev = prev * (1.0 - k) + price * k;
        values.push(prev);
    }

    IndicatorSeries::new(indicator_type, values)
}
