// Non-volatile boot-request data. This blob is the only channel for
// requesting recovery mode on the next boot, which is why the commit
// protocol treats its write failure as fatal outside recovery.

use crate::context::Context;
use crate::error::HwError;

pub const NVDATA_SIZE: usize = 16;

// Blob layout offsets. The commit protocol only touches the recovery
// request bytes; everything else belongs to the boot-control loop.
pub const NV_OFFS_RECOVERY: usize = 2;
pub const NV_OFFS_RECOVERY_SUBCODE: usize = 6;

/// Backend for the nvdata blob (CMOS, EC-backed NVRAM, a flash sector).
pub trait NvdataBackend {
    fn write(&mut self, ctx: &Context) -> Result<(), HwError>;
}
