// Hardware-backed secure storage: two rollback-protected spaces (kernel
// and firmware) with independent failure domains. There is no cross-space
// transaction; each write stands alone.

use crate::context::Context;
use crate::error::HwError;

/// Backend for the rollback-protected storage spaces, typically TPM NV
/// indexes. Each write serializes the matching buffer out of the context.
pub trait SecdataBackend {
    fn kernel_write(&mut self, ctx: &Context) -> Result<(), HwError>;

    fn firmware_write(&mut self, ctx: &Context) -> Result<(), HwError>;
}
