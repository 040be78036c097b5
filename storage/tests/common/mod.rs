//! Common test utilities: an in-memory block device and a builder that
//! stamps a GPT image the way the partitioning tool would.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use charon_flash::{Flash, Fmap, MemMappedFlash};
use charon_storage::{
    BlockDevClass, SpiGptCtrlr, StorageSubsystem, Stream, StreamCtrlr, StorageError,
};
use gpt_disk_io::{BlockIo, Disk};
use gpt_disk_types::{
    guid, BlockSize, GptHeader, GptPartitionEntryArray, GptPartitionType, Lba, LbaLe, U32Le,
};

pub const BLOCK_SIZE: usize = 512;
pub const REGION_BLOCKS: u64 = 128;
pub const REGION_OFFSET: u32 = 0x4000;

/// In-memory block device for testing
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
}

impl MemoryBlockDevice {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            block_size: BLOCK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryBlockIoError;

impl std::fmt::Display for MemoryBlockIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "memory block I/O error")
    }
}

impl BlockIo for &mut MemoryBlockDevice {
    type Error = MemoryBlockIoError;

    fn block_size(&self) -> BlockSize {
        BlockSize::BS_512
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        let off = start_lba.to_u64() as usize * self.block_size;
        if off + dst.len() > self.data.len() {
            return Err(MemoryBlockIoError);
        }
        dst.copy_from_slice(&self.data[off..off + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        let off = start_lba.to_u64() as usize * self.block_size;
        if off + src.len() > self.data.len() {
            return Err(MemoryBlockIoError);
        }
        self.data[off..off + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// One used GPT entry, addressed in stream space.
#[derive(Debug, Clone, Copy)]
pub struct PartSpec {
    pub start_lba: u64,
    pub end_lba: u64,
    pub name: &'static str,
}

/// Build a GPT image covering `REGION_BLOCKS` blocks. `parts[i]` fills
/// table slot `i`; `None` leaves the slot unused.
pub fn build_gpt_image(stream_blocks: u64, parts: &[Option<PartSpec>]) -> Vec<u8> {
    let num_entries = 128u32;
    let entry_bytes = num_entries as u64 * 128;
    let entries_sectors = (entry_bytes + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64;

    let mut dev = MemoryBlockDevice::new(vec![0u8; REGION_BLOCKS as usize * BLOCK_SIZE]);

    let mut header = GptHeader {
        my_lba: LbaLe::from_u64(1),
        alternate_lba: LbaLe::from_u64(REGION_BLOCKS - 1),
        first_usable_lba: LbaLe::from_u64(0x40),
        last_usable_lba: LbaLe::from_u64(stream_blocks.saturating_sub(1)),
        disk_guid: guid!("b9f24b65-1b30-4560-b8c3-d0ddbbd4b1f2"),
        partition_entry_lba: LbaLe::from_u64(2),
        number_of_partition_entries: U32Le::from_u32(num_entries),
        ..Default::default()
    };

    let mut entry_buf = vec![0u8; 16384];
    {
        let layout = header.get_partition_entry_array_layout().unwrap();
        let mut entry_array =
            GptPartitionEntryArray::new(layout, BlockSize::BS_512, &mut entry_buf).unwrap();
        for (i, part) in parts.iter().enumerate() {
            let Some(part) = part else { continue };
            let entry = entry_array.get_partition_entry_mut(i as u32).unwrap();
            entry.partition_type_guid =
                GptPartitionType(guid!("fe3a2a5d-4f32-41a7-b725-accc3285a309"));
            entry.unique_partition_guid = guid!("c07a8343-312e-4d41-b5a9-4b0e6c54b9a6");
            entry.starting_lba = LbaLe::from_u64(part.start_lba);
            entry.ending_lba = LbaLe::from_u64(part.end_lba);
        }
    }
    // The entry array API leaves names zeroed; poke the UTF-16LE names
    // straight into the raw buffer before computing the CRC.
    for (i, part) in parts.iter().enumerate() {
        let Some(part) = part else { continue };
        let name_off = i * 128 + 56;
        for (j, unit) in part.name.encode_utf16().enumerate() {
            let off = name_off + 2 * j;
            entry_buf[off..off + 2].copy_from_slice(&unit.to_le_bytes());
        }
    }

    let layout = header.get_partition_entry_array_layout().unwrap();
    let entry_array =
        GptPartitionEntryArray::new(layout, BlockSize::BS_512, &mut entry_buf).unwrap();
    header.partition_entry_array_crc32 = entry_array.calculate_crc32();
    header.update_header_crc32();

    let mut block_buf = [0u8; BLOCK_SIZE];
    let mut disk = Disk::new(&mut dev).unwrap();
    disk.write_protective_mbr(&mut block_buf).unwrap();
    disk.write_primary_gpt_header(&header, &mut block_buf).unwrap();
    disk.write_gpt_partition_entry_array(&entry_array).unwrap();

    // Secondary copy at the end of the region, entries just below the
    // header (swap my_lba and alternate_lba, recompute the header CRC).
    let mut secondary = header.clone();
    secondary.my_lba = header.alternate_lba;
    secondary.alternate_lba = header.my_lba;
    secondary.partition_entry_lba = LbaLe::from_u64(REGION_BLOCKS - 1 - entries_sectors);
    secondary.update_header_crc32();
    disk.write_secondary_gpt_header(&secondary, &mut block_buf).unwrap();

    let secondary_layout = secondary.get_partition_entry_array_layout().unwrap();
    let mut secondary_buf = vec![0u8; 16384];
    secondary_buf.copy_from_slice(&entry_buf);
    let secondary_array =
        GptPartitionEntryArray::new(secondary_layout, BlockSize::BS_512, &mut secondary_buf)
            .unwrap();
    disk.write_gpt_partition_entry_array(&secondary_array).unwrap();
    disk.flush().unwrap();
    drop(disk);

    dev.data
}

/// Deterministic stream controller: byte N of the store reads as
/// `N % 251`. `fail_size` simulates flash bring-up failure underneath.
pub struct TestStreamCtrlr {
    pub size_bytes: u64,
    pub fail_size: bool,
}

pub struct TestStream {
    pos: u64,
    end: u64,
}

impl Stream for TestStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        let remaining = (self.end - self.pos).min(buf.len() as u64) as usize;
        for b in buf[..remaining].iter_mut() {
            *b = (self.pos % 251) as u8;
            self.pos += 1;
        }
        Ok(remaining)
    }
}

impl StreamCtrlr for TestStreamCtrlr {
    fn size(&mut self) -> Result<u64, StorageError> {
        if self.fail_size {
            return Err(StorageError::StreamSize);
        }
        Ok(self.size_bytes)
    }

    fn open(&mut self, start_byte: u64, count_byte: u64) -> Result<Box<dyn Stream>, StorageError> {
        if start_byte + count_byte > self.size_bytes {
            return Err(StorageError::OutOfBounds);
        }
        Ok(Box::new(TestStream {
            pos: start_byte,
            end: start_byte + count_byte,
        }))
    }
}

/// A storage subsystem with one SPI-GPT controller over an in-memory
/// flash window holding the built GPT image.
pub struct TestRig {
    pub subsys: StorageSubsystem,
    pub flash: Rc<RefCell<MemMappedFlash>>,
    pub region_offset: u32,
    pub region_size: u32,
    pub stream_blocks: u64,
}

pub fn setup_spi_gpt(
    stream_blocks: u64,
    parts: &[Option<PartSpec>],
    dt_path: Option<&str>,
) -> TestRig {
    let image = build_gpt_image(stream_blocks, parts);
    let region_size = image.len() as u32;

    let window = Vec::leak(vec![0u8; REGION_OFFSET as usize + image.len()]);
    window[REGION_OFFSET as usize..].copy_from_slice(&image);
    let flash = Rc::new(RefCell::new(MemMappedFlash::new(window)));

    let mut fmap = Fmap::new();
    fmap.add_area("RW_GPT", REGION_OFFSET, region_size);

    let stream = TestStreamCtrlr {
        size_bytes: stream_blocks * BLOCK_SIZE as u64,
        fail_size: false,
    };

    let ctrlr = SpiGptCtrlr::new(
        "RW_GPT",
        flash.clone(),
        Rc::new(fmap),
        Rc::new(RefCell::new(stream)),
        dt_path,
    );

    let mut subsys = StorageSubsystem::new();
    subsys.register_ctrlr(BlockDevClass::Fixed, Box::new(ctrlr));

    TestRig {
        subsys,
        flash,
        region_offset: REGION_OFFSET,
        region_size,
        stream_blocks,
    }
}

/// Corrupt `len` bytes of flash at `offset` (relative to the window).
pub fn corrupt_flash(rig: &TestRig, offset: u32, len: usize) {
    rig.flash
        .borrow_mut()
        .write(offset, &vec![0xa5u8; len])
        .unwrap();
}
