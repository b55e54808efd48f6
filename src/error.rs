use thiserror::Error;

/// Failures raised while filtering, deriving or rendering a candidate table.
///
/// Row numbers are the 0-based positions of the records in the loaded file.
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("column '{column}', row {row}: '{value}' is not numeric")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("row {row}: '{value}' is not a 64-bit hexadecimal multiplier")]
    InvalidMultiplier { row: usize, value: String },

    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("rendering report table")]
    Render(#[from] arrow::error::ArrowError),
}

pub type Result<T> = std::result::Result<T, CandidateError>;
