// THEORY:
// Every stage of the engine fails in one of a small number of ways, and every
// failure is local to the frame that produced it. The pipeline catches these
// errors, logs them and degrades that frame's output; nothing here ever aborts
// the processing of the next frame.

/// Errors produced by the scanning stages.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// The requested sampling point lies outside the frame.
    #[error("sampling point ({x}, {y}) is outside the {width}x{height} frame")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },
    /// A region reached a stage that needs at least one point.
    #[error("region has no points")]
    DegenerateRegion,
    /// The pixel buffer does not match the declared frame dimensions.
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    InvalidFrame { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors raised while loading a `PipelineConfig`.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}
