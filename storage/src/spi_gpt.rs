//! Virtual GPT block device over SPI flash
//!
//! Some boards keep the kernel partitions on streaming media whose GPT
//! cannot live in ordinary data blocks. Instead a GPT-formatted image sits
//! in a named flash region and this controller synthesizes a block device
//! view over it: logical block reads and writes translate to flash
//! accesses inside the region, while streams open against the full
//! streaming store the partitions actually index into.
//!
//! When a device tree path is configured, a fixup is registered that
//! parses the GPT and exports one partition node per used entry, with
//! partition 0 spanning the whole streaming range.

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

use charon_base::device_tree::{DeviceTree, DeviceTreeFixup, DeviceTreeNode, DtError, FixupList};
use charon_flash::{Flash, Fmap, FmapArea};
use gpt_disk_io::{BlockIo, Disk};
use gpt_disk_types::{BlockSize, GptHeader, GptPartitionEntry, Lba};

use crate::blockdev::{BlockDev, BlockDevCtrlr, DeviceRegistry};
use crate::stream::{Stream, StreamCtrlr};
use crate::{Result, StorageError};

/// Block size is arbitrary for the flash-backed view; any size works once
/// the region is a whole number of blocks. Partitions only have to align
/// to erase blocks, which the partitioning tool enforces rather than the
/// on-device format.
pub const BLOCK_SHIFT: u32 = 9;
pub const BLOCK_SIZE: u32 = 1 << BLOCK_SHIFT;

/// The synthesized device. Reads and writes stay inside the flash region;
/// streams go to the streaming store.
pub struct SpiGptDev {
    flash: Rc<RefCell<dyn Flash>>,
    stream: Rc<RefCell<dyn StreamCtrlr>>,
    area: FmapArea,
    block_count: u64,
    stream_block_count: u64,
}

impl SpiGptDev {
    /// Translate a block range into a byte range inside the region,
    /// rejecting anything that does not fit entirely.
    fn byte_range(&self, start: u64, count: u64, op: &str) -> Result<(u64, u64)> {
        let start_byte = start
            .checked_mul(BLOCK_SIZE as u64)
            .ok_or(StorageError::OutOfBounds)?;
        let count_byte = count
            .checked_mul(BLOCK_SIZE as u64)
            .ok_or(StorageError::OutOfBounds)?;
        let end = start_byte
            .checked_add(count_byte)
            .ok_or(StorageError::OutOfBounds)?;
        if end > self.area.size as u64 {
            charon_base::log_error!(
                "{} out of bounds: start={:#x} count={:#x} spi size={:#x}",
                op,
                start,
                count,
                self.area.size
            );
            return Err(StorageError::OutOfBounds);
        }
        Ok((start_byte, count_byte))
    }
}

impl BlockDev for SpiGptDev {
    fn name(&self) -> &str {
        "virtual_spi_gpt"
    }

    fn block_size(&self) -> u32 {
        BLOCK_SIZE
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn stream_block_count(&self) -> u64 {
        self.stream_block_count
    }

    fn external_gpt(&self) -> bool {
        true
    }

    fn read(&mut self, start: u64, count: u64, buf: &mut [u8]) -> Result<u64> {
        let (start_byte, count_byte) = self.byte_range(start, count, "read")?;
        if (buf.len() as u64) < count_byte {
            return Err(StorageError::BufferTooSmall);
        }
        let offset = self
            .area
            .offset
            .checked_add(start_byte as u32)
            .ok_or(StorageError::OutOfBounds)?;
        let flash = self.flash.borrow();
        let data = flash
            .read(offset, count_byte as u32)
            .map_err(|_| StorageError::Io)?;
        buf[..count_byte as usize].copy_from_slice(data);
        Ok(count)
    }

    fn write(&mut self, start: u64, count: u64, buf: &[u8]) -> Result<u64> {
        let (start_byte, count_byte) = self.byte_range(start, count, "write")?;
        if (buf.len() as u64) < count_byte {
            return Err(StorageError::BufferTooSmall);
        }
        let offset = self
            .area
            .offset
            .checked_add(start_byte as u32)
            .ok_or(StorageError::OutOfBounds)?;
        let mut flash = self.flash.borrow_mut();
        let written = flash
            .write(offset, &buf[..count_byte as usize])
            .map_err(|_| StorageError::Io)?;
        Ok(written as u64 >> BLOCK_SHIFT)
    }

    fn new_stream(&mut self, start: u64, count: u64) -> Result<Box<dyn Stream>> {
        // Streams address the streaming store, not the flash region.
        let start_byte = start
            .checked_mul(BLOCK_SIZE as u64)
            .ok_or(StorageError::OutOfBounds)?;
        let count_byte = count
            .checked_mul(BLOCK_SIZE as u64)
            .ok_or(StorageError::OutOfBounds)?;
        self.stream.borrow_mut().open(start_byte, count_byte)
    }
}

/// Controller that synthesizes the virtual device on the first
/// enumeration pass.
pub struct SpiGptCtrlr {
    fmap_region: String,
    flash: Rc<RefCell<dyn Flash>>,
    fmap: Rc<Fmap>,
    stream: Rc<RefCell<dyn StreamCtrlr>>,
    dt_path: Option<String>,
    need_update: bool,
    dev: Option<Rc<RefCell<SpiGptDev>>>,
}

impl SpiGptCtrlr {
    pub fn new(
        fmap_region: &str,
        flash: Rc<RefCell<dyn Flash>>,
        fmap: Rc<Fmap>,
        stream: Rc<RefCell<dyn StreamCtrlr>>,
        dt_path: Option<&str>,
    ) -> Self {
        Self {
            fmap_region: String::from(fmap_region),
            flash,
            fmap,
            stream,
            dt_path: dt_path.map(String::from),
            need_update: true,
            dev: None,
        }
    }

    pub fn device(&self) -> Option<Rc<RefCell<SpiGptDev>>> {
        self.dev.clone()
    }
}

impl BlockDevCtrlr for SpiGptCtrlr {
    fn update(&mut self, devices: &mut DeviceRegistry, fixups: &mut FixupList) -> Result<()> {
        if !self.need_update {
            return Ok(());
        }

        let area = self.fmap.find_area(&self.fmap_region).ok_or_else(|| {
            charon_base::log_error!("fmap area {} not found", self.fmap_region);
            StorageError::NotFound
        })?;
        // Fails if flash initialization failed underneath the stream.
        let stream_size = self.stream.borrow_mut().size()?;

        let dev = Rc::new(RefCell::new(SpiGptDev {
            flash: Rc::clone(&self.flash),
            stream: Rc::clone(&self.stream),
            area,
            block_count: area.size as u64 >> BLOCK_SHIFT,
            stream_block_count: stream_size >> BLOCK_SHIFT,
        }));

        devices.register_fixed(dev.clone());
        self.need_update = false;

        if let Some(path) = &self.dt_path {
            fixups.register(Box::new(SpiGptFixup {
                dev: Rc::clone(&dev),
                dt_path: path.clone(),
            }));
        }
        self.dev = Some(dev);
        Ok(())
    }

    fn need_update(&self) -> bool {
        self.need_update
    }
}

/// `gpt_disk_io` adapter over the synthesized device. GPT headers live in
/// the flash region, so the disk size is the region's block count, not the
/// streaming range.
struct SpiGptBlockIo<'a> {
    dev: &'a mut SpiGptDev,
}

impl BlockIo for SpiGptBlockIo<'_> {
    type Error = StorageError;

    fn block_size(&self) -> BlockSize {
        BlockSize::BS_512
    }

    fn num_blocks(&mut self) -> core::result::Result<u64, StorageError> {
        Ok(self.dev.block_count)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> core::result::Result<(), StorageError> {
        let count = dst.len() as u64 >> BLOCK_SHIFT;
        let read = self.dev.read(start_lba.to_u64(), count, dst)?;
        if read != count {
            return Err(StorageError::Io);
        }
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> core::result::Result<(), StorageError> {
        let count = src.len() as u64 >> BLOCK_SHIFT;
        let written = self.dev.write(start_lba.to_u64(), count, src)?;
        if written != count {
            return Err(StorageError::Io);
        }
        Ok(())
    }

    fn flush(&mut self) -> core::result::Result<(), StorageError> {
        Ok(())
    }
}

fn read_valid_header<B: BlockIo>(
    disk: &mut Disk<B>,
    block_buf: &mut [u8],
    primary: bool,
) -> Option<GptHeader> {
    let header = if primary {
        disk.read_primary_gpt_header(block_buf).ok()?
    } else {
        disk.read_secondary_gpt_header(block_buf).ok()?
    };
    if !header.is_signature_valid() {
        return None;
    }
    let mut check = header.clone();
    check.update_header_crc32();
    if check.header_crc32 != header.header_crc32 {
        return None;
    }
    Some(header)
}

/// Read and validate the GPT from the flash region, falling back to the
/// secondary header when the primary is bad. The parse is read-only and
/// owns all its working buffers, so nothing has to be released on the
/// failure paths.
fn read_gpt(dev: &mut SpiGptDev) -> Result<Vec<GptPartitionEntry>> {
    let io = SpiGptBlockIo { dev };
    let mut disk = Disk::new(io).map_err(|_| StorageError::GptRead)?;
    let mut block_buf = [0u8; BLOCK_SIZE as usize];

    let header = match read_valid_header(&mut disk, &mut block_buf, true) {
        Some(h) => h,
        None => match read_valid_header(&mut disk, &mut block_buf, false) {
            Some(h) => h,
            None => {
                charon_base::log_error!("no valid GPT header in flash region");
                return Err(StorageError::GptParse);
            }
        },
    };

    let layout = header
        .get_partition_entry_array_layout()
        .map_err(|_| StorageError::GptParse)?;

    let mut entry_buf = vec![0u8; 16384];
    let entry_array = disk
        .read_gpt_partition_entry_array(layout, &mut entry_buf)
        .map_err(|_| StorageError::GptRead)?;
    if entry_array.calculate_crc32() != header.partition_entry_array_crc32 {
        charon_base::log_error!("GPT partition entry array CRC mismatch");
        return Err(StorageError::GptParse);
    }

    let mut entries = Vec::new();
    for i in 0..layout.num_entries {
        if let Some(entry) = entry_array.get_partition_entry(i) {
            entries.push(entry.clone());
        }
    }
    Ok(entries)
}

/// Device tree name for a partition entry; GPT names are UTF-16LE and may
/// be empty, in which case the partition index stands in.
fn partition_name(entry: &GptPartitionEntry, index: usize) -> String {
    let raw = entry.name.to_string();
    let name = raw.split('\0').next().unwrap_or("").trim();
    if name.is_empty() {
        format!("part{}", index)
    } else {
        String::from(name)
    }
}

fn fits_cells(value: u64, cells: u32) -> bool {
    cells >= 2 || value >> (32 * cells) == 0
}

/// Exports the partition map: one child per used GPT entry under the
/// configured node, after partition 0 covering the whole streaming range.
struct SpiGptFixup {
    dev: Rc<RefCell<SpiGptDev>>,
    dt_path: String,
}

impl DeviceTreeFixup for SpiGptFixup {
    fn fixup(&mut self, tree: &mut DeviceTree) -> core::result::Result<(), DtError> {
        let (node, addr_cells, size_cells) = match tree.find_node_by_path(&self.dt_path) {
            Some(found) => found,
            None => {
                charon_base::log_error!("device node not found at path {}", self.dt_path);
                return Err(DtError::NodeNotFound);
            }
        };

        // The partition map owns the node's children: index 0 is the
        // whole-device partition and every used GPT entry keeps an index
        // equal to its position in the child list. A node that already
        // has children cannot satisfy that.
        if !node.children.is_empty() {
            charon_base::log_error!(
                "partition index mismatch at {}: node already has {} children",
                self.dt_path,
                node.children.len()
            );
            return Err(DtError::FixupFailed);
        }

        let mut dev = self.dev.borrow_mut();
        let entries = match read_gpt(&mut dev) {
            Ok(entries) => entries,
            Err(_) => {
                charon_base::log_error!("SPI GPT read failed");
                return Err(DtError::FixupFailed);
            }
        };

        // Collect and validate everything before touching the tree, so a
        // bad table never leaves a partial partition map behind.
        let mut partitions: Vec<DeviceTreeNode> = Vec::new();

        // Partition 0 goes over the whole device
        let stream_bytes = dev.stream_block_count << BLOCK_SHIFT;
        if !fits_cells(stream_bytes, addr_cells) || !fits_cells(stream_bytes, size_cells) {
            charon_base::log_error!(
                "device range does not fit cell widths, addrc={} sizec={}",
                addr_cells,
                size_cells
            );
            return Err(DtError::CellOverflow);
        }
        let mut device_part = DeviceTreeNode::new("device");
        device_part.add_reg_prop(&[(0, stream_bytes)], addr_cells, size_cells)?;
        partitions.push(device_part);

        // Partitions 1 and beyond are from the GPT; unused slots do not
        // take a partition index.
        for (i, entry) in entries.iter().enumerate() {
            if !entry.is_used() {
                continue;
            }
            let part_idx = partitions.len();

            let first = entry.starting_lba.to_u64();
            let last = entry.ending_lba.to_u64();
            if last < first {
                charon_base::log_error!("GPT entry {} has ending LBA before starting LBA", i + 1);
                return Err(DtError::FixupFailed);
            }
            let blocks = (last - first)
                .checked_add(1)
                .ok_or(DtError::CellOverflow)?;
            let (start, size) = match (
                first.checked_mul(BLOCK_SIZE as u64),
                blocks.checked_mul(BLOCK_SIZE as u64),
            ) {
                (Some(start), Some(size)) => (start, size),
                _ => return Err(DtError::CellOverflow),
            };
            let end = start.checked_add(size).ok_or(DtError::CellOverflow)?;
            if !fits_cells(start, addr_cells)
                || !fits_cells(size, size_cells)
                || !fits_cells(end, addr_cells)
            {
                charon_base::log_error!(
                    "partition {} does not fit cell widths, addrc={} sizec={}",
                    part_idx,
                    addr_cells,
                    size_cells
                );
                return Err(DtError::CellOverflow);
            }

            let mut part = DeviceTreeNode::new(&partition_name(entry, part_idx));
            part.add_reg_prop(&[(start, size)], addr_cells, size_cells)?;
            partitions.push(part);
        }

        node.children.extend(partitions);
        Ok(())
    }
}
