/// Errors that can occur while writing or reading result tables
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from the CSV encoder or decoder
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from the Arrow library during array operations
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Error from the Parquet library
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Error serializing footer metadata
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A table does not have the expected layout
    #[error("Invalid data: {0}")]
    InvalidData(String),
}
