// Read-only resources kept in named flash regions.

use charon_flash::{Flash, Fmap};

use crate::error::{Result, VbootError};

/// Resources the verified-boot library may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// The Google Binary Block: keys and bitmaps baked into RO flash.
    Gbb,
}

impl Resource {
    fn fmap_name(self) -> &'static str {
        match self {
            Resource::Gbb => "GBB",
        }
    }
}

/// Copy `buf.len()` bytes at `offset` inside the resource into `buf`.
pub fn read_resource(
    flash: &dyn Flash,
    fmap: &Fmap,
    resource: Resource,
    offset: u32,
    buf: &mut [u8],
) -> Result<()> {
    let name = resource.fmap_name();
    let area = fmap.find_area(name).ok_or_else(|| {
        charon_base::log_error!("couldn't find {} region", name);
        VbootError::ReadResourceIndex
    })?;

    let size = buf.len() as u32;
    if (offset as u64) + (size as u64) > area.size as u64 {
        charon_base::log_error!("offset outside of {} region", name);
        return Err(VbootError::ReadResourceSize);
    }

    let flash_offset = area
        .offset
        .checked_add(offset)
        .ok_or(VbootError::ReadResourceSize)?;
    let data = flash
        .read(flash_offset, size)
        .map_err(|_| VbootError::ReadResourceIndex)?;
    buf.copy_from_slice(data);
    Ok(())
}
