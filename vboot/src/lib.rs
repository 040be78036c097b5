//! Charon verified-boot glue
//!
//! The state the boot-control loop persists across attempts and the
//! commit protocol that writes it out: hardware-backed secure storage for
//! rollback protection (kernel and firmware spaces) plus the non-volatile
//! boot-request data that carries recovery requests to the next boot.
//! Also the small helpers the loop samples on every iteration (shutdown
//! switches, payload decompression, flash-resident resources).
//!
//! Hardware access is entirely behind traits; board crates supply the
//! TPM, NVRAM, switch and decompressor implementations.

#![no_std]

extern crate alloc;

pub mod commit;
pub mod context;
pub mod error;
pub mod misc;
pub mod nvdata;
pub mod resources;
pub mod secdata;

pub use commit::commit_data;
pub use context::{Context, RecoveryReason, CONTEXT_NVDATA_CHANGED, CONTEXT_RECOVERY_MODE};
pub use error::{HwError, Result, VbootError};
pub use misc::{
    decompress, is_shutdown_requested, Flag, FlagError, FlagErrorPolicy, FlagSource, LzmaDecoder,
    ShutdownConfig, COMPRESS_EFI1, COMPRESS_LZMA1, COMPRESS_NONE,
    SHUTDOWN_REQUEST_LID_CLOSED, SHUTDOWN_REQUEST_POWER_BUTTON,
};
pub use nvdata::NvdataBackend;
pub use resources::{read_resource, Resource};
pub use secdata::SecdataBackend;
