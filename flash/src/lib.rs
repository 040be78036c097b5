//! Flash access layer
//!
//! Byte-granular access to the boot flash window plus the FMAP table that
//! names regions inside it. Everything above this crate addresses flash
//! through named regions; only the implementations in here know where the
//! window actually lives.

#![no_std]

extern crate alloc;

pub mod fmap;
pub mod memmapped;

pub use fmap::{Fmap, FmapArea};
pub use memmapped::MemMappedFlash;

use core::fmt;

/// Result type for flash operations
pub type Result<T> = core::result::Result<T, FlashError>;

/// Errors that can occur during flash operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Access past the end of the flash window
    OutOfBounds,

    /// Write attempted while write protect is enabled
    WriteProtected,

    /// Malformed FMAP structure
    InvalidFmap,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "Out of bounds flash access"),
            Self::WriteProtected => write!(f, "Flash is write protected"),
            Self::InvalidFmap => write!(f, "Malformed FMAP structure"),
        }
    }
}

/// Raw access to the flash window.
///
/// Offsets are relative to the window base. An access is either fully in
/// bounds or rejected whole; nothing is clamped and a rejected access has
/// no side effects.
pub trait Flash {
    /// Window size in bytes.
    fn size(&self) -> u32;

    /// Borrow `size` bytes at `offset`. The returned slice aliases the
    /// window itself; callers copy if they need the data to outlive the
    /// borrow.
    fn read(&self, offset: u32, size: u32) -> Result<&[u8]>;

    /// Program `data` at `offset`, returning the number of bytes written.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<usize>;

    /// Toggle the controller-level write protect.
    fn set_write_protect(&mut self, enable: bool) -> Result<()>;
}

/// Shared bounds check: `offset + size` must stay inside a window of
/// `window_size` bytes.
pub(crate) fn check_bounds(window_size: u32, offset: u32, size: u32) -> Result<()> {
    let end = (offset as u64) + (size as u64);
    if offset as u64 > window_size as u64 || end > window_size as u64 {
        charon_base::log_error!(
            "out of bounds flash access: offset={:#x} size={:#x} window={:#x}",
            offset,
            size,
            window_size
        );
        return Err(FlashError::OutOfBounds);
    }
    Ok(())
}
