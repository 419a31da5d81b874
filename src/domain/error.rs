//! Domain error types.

/// Top-level error type for pivotrader.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("invalid candle: {reason}")]
    InvalidCandle { reason: String },

    #[error("candles out of order at index {index}: timestamps must be strictly increasing")]
    UnorderedCandles { index: usize },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("a position is already open")]
    PositionAlreadyOpen,

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error("worker pool error: {reason}")]
    WorkerPool { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Insufficient data is a per-symbol outcome, not a run failure.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, EngineError::InsufficientData { .. })
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) | EngineError::Report { .. } | EngineError::WorkerPool { .. } => {
                1
            }
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::DataSource { .. } => 3,
            EngineError::InvalidCandle { .. }
            | EngineError::UnorderedCandles { .. }
            | EngineError::PositionAlreadyOpen => 4,
            EngineError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
