//! Backtest report output port.

use crate::domain::backtest::BacktestResult;
use crate::domain::candle::Candle;
use crate::domain::error::EngineError;

/// Port for writing backtest results for an external plotter.
pub trait ReportPort {
    fn write(
        &self,
        symbol: &str,
        candles: &[Candle],
        result: &BacktestResult,
        output_path: &str,
    ) -> Result<(), EngineError>;
}
