//! Boot-control helpers: shutdown switch sampling and payload
//! decompression.

use charon_base::Power;

use crate::error::{Result, VbootError};

pub const SHUTDOWN_REQUEST_LID_CLOSED: u32 = 1 << 1;
pub const SHUTDOWN_REQUEST_POWER_BUTTON: u32 = 1 << 2;

/// Boolean signal sources sampled by the boot-control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Lid switch; true means the lid is open.
    Lid,
    /// Power button; true means pressed.
    Power,
}

/// A signal source could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagError;

pub trait FlagSource {
    fn fetch(&mut self, flag: Flag) -> core::result::Result<bool, FlagError>;
}

/// What to do when a switch cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagErrorPolicy {
    /// Unreadable switches leave no safe answer; stop the machine.
    Halt,
    /// Treat unreadable switches as a shutdown request.
    AssumeShutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownConfig {
    /// Detachables route the power button through the keyboard instead,
    /// so it is not sampled here.
    pub detachable: bool,
    pub missing_flag_policy: FlagErrorPolicy,
}

/// Sample the shutdown switches, returning a `SHUTDOWN_REQUEST_*` mask.
pub fn is_shutdown_requested(
    flags: &mut dyn FlagSource,
    config: &ShutdownConfig,
    power: &dyn Power,
) -> u32 {
    let lid = flags.fetch(Flag::Lid);
    let pwr = if config.detachable {
        Ok(false)
    } else {
        flags.fetch(Flag::Power)
    };

    let (lid_open, pwr_pressed) = match (lid, pwr) {
        (Ok(lid), Ok(pwr)) => (lid, pwr),
        _ => {
            charon_base::log_error!("failed to fetch lid or power switch flag");
            match config.missing_flag_policy {
                FlagErrorPolicy::Halt => {
                    power.halt("cannot read shutdown switches");
                }
                FlagErrorPolicy::AssumeShutdown => {
                    return SHUTDOWN_REQUEST_LID_CLOSED | SHUTDOWN_REQUEST_POWER_BUTTON;
                }
            }
        }
    };

    let mut request = 0;
    if !lid_open {
        charon_base::log_info!("lid is closed");
        request |= SHUTDOWN_REQUEST_LID_CLOSED;
    }
    if pwr_pressed {
        charon_base::log_info!("power key pressed");
        request |= SHUTDOWN_REQUEST_POWER_BUTTON;
    }
    request
}

// Compression tags as they arrive from image headers.
pub const COMPRESS_NONE: u32 = 0;
pub const COMPRESS_EFI1: u32 = 1;
pub const COMPRESS_LZMA1: u32 = 2;

/// External LZMA1 decompressor.
pub trait LzmaDecoder {
    /// Decompress `inbuf` into `outbuf`, returning the output size. Zero
    /// means the stream could not be decoded.
    fn decompress(&mut self, inbuf: &[u8], outbuf: &mut [u8]) -> usize;
}

/// Decompress a payload according to its numeric compression tag. Unknown
/// tags are rejected before any output is written.
pub fn decompress(
    decoder: &mut dyn LzmaDecoder,
    compression_type: u32,
    inbuf: &[u8],
    outbuf: &mut [u8],
) -> Result<usize> {
    match compression_type {
        COMPRESS_NONE => {
            if outbuf.len() < inbuf.len() {
                return Err(VbootError::InvalidParameter);
            }
            outbuf[..inbuf.len()].copy_from_slice(inbuf);
            Ok(inbuf.len())
        }
        COMPRESS_EFI1 => {
            charon_base::log_error!("EFIv1 compression not supported");
            Err(VbootError::Unknown)
        }
        COMPRESS_LZMA1 => {
            let out_size = decoder.decompress(inbuf, outbuf);
            if out_size == 0 {
                charon_base::log_error!("error doing LZMA decompression");
                return Err(VbootError::Unknown);
            }
            Ok(out_size)
        }
        other => {
            charon_base::log_error!("unrecognized compression type {}", other);
            Err(VbootError::InvalidParameter)
        }
    }
}
