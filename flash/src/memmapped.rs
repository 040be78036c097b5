// Memory-mapped flash window

use crate::{check_bounds, Flash, FlashError, Result};

/// Flash exposed directly in the address space. Reads borrow the mapping;
/// writes go straight through, gated only by the write-protect flag.
pub struct MemMappedFlash {
    window: &'static mut [u8],
    write_protected: bool,
}

impl MemMappedFlash {
    pub fn new(window: &'static mut [u8]) -> Self {
        Self {
            window,
            write_protected: false,
        }
    }

    /// Map a raw window.
    ///
    /// # Safety
    /// `base` must point to `size` bytes that stay valid and exclusively
    /// owned by this flash for the rest of the program.
    pub unsafe fn from_raw(base: *mut u8, size: u32) -> Self {
        Self::new(core::slice::from_raw_parts_mut(base, size as usize))
    }

    pub fn write_protected(&self) -> bool {
        self.write_protected
    }
}

impl Flash for MemMappedFlash {
    fn size(&self) -> u32 {
        self.window.len() as u32
    }

    fn read(&self, offset: u32, size: u32) -> Result<&[u8]> {
        check_bounds(self.size(), offset, size)?;
        Ok(&self.window[offset as usize..(offset + size) as usize])
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<usize> {
        if self.write_protected {
            charon_base::log_error!("flash write at {:#x} blocked by write protect", offset);
            return Err(FlashError::WriteProtected);
        }
        check_bounds(self.size(), offset, data.len() as u32)?;
        self.window[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn set_write_protect(&mut self, enable: bool) -> Result<()> {
        self.write_protected = enable;
        Ok(())
    }
}
