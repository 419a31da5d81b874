//! Candle source port.

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;

/// Supplies ascending-timestamp candles for one symbol and timeframe.
///
/// `Sync` so that a multi-symbol scan can share one source across workers.
pub trait DataPort: Sync {
    /// Most recent `limit` candles, oldest first.
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError>;

    fn list_symbols(&self, timeframe: &str) -> Result<Vec<String>, EngineError>;
}
