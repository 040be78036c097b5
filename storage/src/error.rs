//! Error types for storage operations

use core::fmt;

/// Result type for storage operations
pub type Result<T> = core::result::Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// I/O error talking to the backing medium
    Io,

    /// Logical range falls outside the device
    OutOfBounds,

    /// Caller buffer smaller than the requested transfer
    BufferTooSmall,

    /// Named flash region or device not found
    NotFound,

    /// Streaming store size query failed
    StreamSize,

    /// Could not read GPT data from the medium
    GptRead,

    /// GPT data read but failed validation
    GptParse,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "I/O error on backing medium"),
            Self::OutOfBounds => write!(f, "Logical range out of bounds"),
            Self::BufferTooSmall => write!(f, "Buffer smaller than transfer"),
            Self::NotFound => write!(f, "Region or device not found"),
            Self::StreamSize => write!(f, "Stream size query failed"),
            Self::GptRead => write!(f, "GPT read failed"),
            Self::GptParse => write!(f, "GPT validation failed"),
        }
    }
}
