//! Error types for featurization and batching

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    /// Bad or missing configuration / source files. Surfaced at construction.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed structure input. Aborts the record being featurized.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Atomic species or index not present in a table.
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Inconsistent tensor shapes during collation.
    #[error("Shape error: {0}")]
    Shape(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DataError>;
