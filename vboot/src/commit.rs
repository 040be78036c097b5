//! Secure-storage commit protocol
//!
//! `commit_data` is called once per save point in the boot-control flow
//! and pushes out, in order: kernel secdata, firmware secdata, nvdata.
//! The order is load-bearing for power safety. Secdata carries no request
//! state, so a crash after a secdata write simply retries with the same
//! content next boot; nvdata carries the recovery request and therefore
//! goes last.
//!
//! Failure policy is asymmetric. A secdata write failure is recoverable:
//! outside recovery mode it records a recovery request (so the *next*
//! boot deals with it) and escalates; inside recovery mode it only
//! escalates, since re-requesting recovery from recovery would loop. An
//! nvdata write failure outside recovery mode is unrecoverable by
//! construction, because nvdata is the only way to request recovery; the
//! machine halts. Inside recovery mode the same failure is ignored
//! entirely and the commit reports success.

use charon_base::Power;

use crate::context::{Context, RecoveryReason, CONTEXT_NVDATA_CHANGED};
use crate::error::{HwError, Result, VbootError};
use crate::nvdata::NvdataBackend;
use crate::secdata::SecdataBackend;

pub fn commit_data(
    ctx: &mut Context,
    secdata: &mut dyn SecdataBackend,
    nvdata: &mut dyn NvdataBackend,
    power: &dyn Power,
) -> Result<()> {
    let mut rv = Ok(());

    // Write secdata spaces. The two writes are independent; a kernel
    // space failure must not keep the firmware space from being pushed.

    if let Err(HwError(code)) = secdata.kernel_write(ctx) {
        charon_base::log_error!("commit: write kernel secdata returned {:#x}", code);
        if !ctx.recovery_mode() {
            ctx.fail(RecoveryReason::TpmWriteError, code);
        }
        rv = Err(VbootError::SecdataKernelWrite);
    }

    if let Err(HwError(code)) = secdata.firmware_write(ctx) {
        charon_base::log_error!("commit: write firmware secdata returned {:#x}", code);
        if !ctx.recovery_mode() {
            ctx.fail(RecoveryReason::TpmWriteError, code);
        }
        rv = Err(VbootError::SecdataFirmwareWrite);
    }

    if let Err(HwError(code)) = nvdata.write(ctx) {
        charon_base::log_error!("commit: write nvdata returned {:#x}", code);
        // Recovery mode can only be requested through nvdata. If that
        // write is gone there is nothing left to fall back to.
        if !ctx.recovery_mode() {
            power.halt("cannot write recovery request to nvdata");
        }
        // Already in recovery: ignore the failure and report success.
        return Ok(());
    }
    ctx.flags &= !CONTEXT_NVDATA_CHANGED;

    rv
}
