//! Charon storage subsystem
//!
//! Block device abstraction for the boot payload plus the virtual
//! GPT-over-SPI device: a block view synthesized over a GPT image kept in
//! a named flash region, with a device tree fixup that exports the
//! partition map to the kernel.
//!
//! # Architecture
//!
//! The subsystem is layered:
//! 1. **Controllers** - bring up media and synthesize devices lazily
//! 2. **Devices** - expose read/write/stream in logical blocks
//! 3. **Registries** - fixed and removable lists owned by
//!    [`StorageSubsystem`], populated during bring-up and read-only after
//!
//! There are no process-wide lists; one `StorageSubsystem` owns all of it.

#![no_std]

extern crate alloc;

pub mod blockdev;
pub mod error;
pub mod spi_gpt;
pub mod stream;

pub use blockdev::{
    BlockDev, BlockDevClass, BlockDevCtrlr, DeviceRegistry, SharedBlockDev, StorageSubsystem,
};
pub use error::{Result, StorageError};
pub use spi_gpt::{SpiGptCtrlr, SpiGptDev, BLOCK_SHIFT, BLOCK_SIZE};
pub use stream::{Stream, StreamCtrlr};
