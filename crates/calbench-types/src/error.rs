//! Error types for bench file parsing in calbench-types.

use thiserror::Error;

/// Fatal, file-level failures when parsing a bench file.
///
/// Row-level problems are not errors: they are reported as
/// [`ParseWarning`](crate::ParseWarning)s and the affected row is skipped.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The sensor header line (line 2) is absent.
    #[error("Missing sensor header line")]
    MissingHeader,

    /// The header line has no usable serial number.
    #[error("Missing serial number in sensor header")]
    MissingSerial,

    /// The first reading row could not be parsed.
    #[error("Invalid first reading at line {line}: {reason}")]
    FirstReading {
        /// 1-based line number in the source file.
        line: usize,
        /// What was wrong with the row.
        reason: String,
    },

    /// The file contained no reading rows.
    #[error("No readings found")]
    NoReadings,

    /// Generic malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using calbench-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
