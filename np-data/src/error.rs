use thiserror::Error;

/// Errors raised while loading reference data or synthesizing readings.
///
/// All of these are configuration problems: a missing or malformed dataset
/// must be reported rather than masked by a default noise level.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// The historical dataset has no points.
    #[error("historical dataset is empty")]
    EmptyDataset,

    /// A row of the historical CSV could not be parsed.
    #[error("historical dataset line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// The base noise level handed to the synthesizer is not a finite number.
    #[error("base noise level is undefined (no historical data available)")]
    UndefinedBaseNoise,
}
