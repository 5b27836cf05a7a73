//! Result and error types for linecov.

use thiserror::Error;

/// Result type for linecov operations
pub type CoverageResult<T> = Result<T, CoverageError>;

/// Errors that can occur while merging or persisting coverage data
///
/// Run-time counting and filter retraction never produce errors; only
/// operations that run after the instrumented program has quiesced do.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// Two stores for different classes were merged
    #[error("Cannot merge coverage of class {actual} into class {expected}")]
    ClassMismatch {
        /// Class name of the receiving store
        expected: String,
        /// Class name of the store being merged in
        actual: String,
    },

    /// Branch or switch structure of a line differs between merge inputs
    #[error("Line {line}: branch structure mismatch: {message}")]
    ShapeMismatch {
        /// Source line number
        line: u32,
        /// What differed
        message: String,
    },

    /// Class name index not present in the string dictionary
    #[error("Unknown dictionary index {index}")]
    UnknownDictionaryIndex {
        /// Index read from the report
        index: u32,
    },

    /// Report stream does not follow the expected layout
    #[error("Malformed coverage report: {message}")]
    MalformedReport {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Primitive encoding or decoding failed
    #[error("Encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

impl CoverageError {
    /// Create a shape mismatch error
    pub fn shape_mismatch(line: u32, message: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            line,
            message: message.into(),
        }
    }

    /// Create a malformed report error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedReport {
            message: message.into(),
        }
    }
}
