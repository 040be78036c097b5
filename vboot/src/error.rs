//! Error types for verified-boot operations

use core::fmt;

/// Result type for verified-boot operations
pub type Result<T> = core::result::Result<T, VbootError>;

/// Errors that can occur during verified-boot operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VbootError {
    /// Kernel secure-storage space could not be written
    SecdataKernelWrite,

    /// Firmware secure-storage space could not be written
    SecdataFirmwareWrite,

    /// Caller passed something the operation cannot accept
    InvalidParameter,

    /// Operation failed for an unclassified reason
    Unknown,

    /// Requested resource does not exist or could not be read
    ReadResourceIndex,

    /// Requested range falls outside the resource
    ReadResourceSize,
}

impl fmt::Display for VbootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecdataKernelWrite => write!(f, "Kernel secdata write failed"),
            Self::SecdataFirmwareWrite => write!(f, "Firmware secdata write failed"),
            Self::InvalidParameter => write!(f, "Invalid parameter"),
            Self::Unknown => write!(f, "Unknown error"),
            Self::ReadResourceIndex => write!(f, "Resource not readable"),
            Self::ReadResourceSize => write!(f, "Resource range out of bounds"),
        }
    }
}

/// Nonzero hardware-specific code reported by a secure-storage or NVRAM
/// backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwError(pub u32);

impl fmt::Display for HwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hardware error {:#x}", self.0)
    }
}
