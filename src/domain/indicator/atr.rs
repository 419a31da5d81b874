//! Average True Range with Wilder smoothing.
//!
//! True range starts at the second candle (it needs the previous close), so
//! the seed is the mean of the first n true ranges and lands on candle n.
//! Output length: len - n.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};

fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Atr(period);
    let len = closes.len().min(highs.len()).min(lows.len());
    if period == 0 || len <= period {
        return IndicatorSeries::new(indicator_type, Vec::new());
    }

    let tr: Vec<f64> = (1..len)
        .map(|i| true_range(highs[i], lows[i], closes[i - 1]))
        .collect();

    let n = period as f64;
    let mut prev = tr[..period].iter().sum::<f64>() / n;
    let mut values = Vec::with_capacity(len - period);
    values.push(prev);

    for &range in &tr[period..] {
        prev = (prev * (n - 1.0) + range) / n;
        values.push(prev);
    }

    IndicatorSeries::new(indicator_type, values)
}
