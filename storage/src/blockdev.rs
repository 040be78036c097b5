//! Block device abstraction
//!
//! Devices expose a capability interface (read, write, open a stream) in
//! logical blocks; controllers own the bring-up and may synthesize their
//! devices lazily on the first enumeration pass. Both live in registries
//! split by removability, owned by a single [`StorageSubsystem`] that is
//! passed to enumeration calls instead of living in globals.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use charon_base::device_tree::FixupList;

use crate::stream::Stream;
use crate::Result;

/// A block device. Logical block addresses are zero-based; the byte
/// address of block N is `N * block_size`.
pub trait BlockDev {
    fn name(&self) -> &str;

    /// Block size in bytes, a power of two.
    fn block_size(&self) -> u32;

    /// Logical capacity in blocks.
    fn block_count(&self) -> u64;

    /// Full addressable range for streams. Equals `block_count` unless the
    /// device fronts a larger streaming store.
    fn stream_block_count(&self) -> u64 {
        self.block_count()
    }

    fn removable(&self) -> bool {
        false
    }

    /// True when this device's GPT is synthesized from a subordinate
    /// region rather than stored in ordinary data blocks.
    fn external_gpt(&self) -> bool {
        false
    }

    /// Read `count` blocks starting at `start` into `buf`. Returns the
    /// number of blocks read.
    fn read(&mut self, start: u64, count: u64, buf: &mut [u8]) -> Result<u64>;

    /// Write `count` blocks starting at `start` from `buf`. Returns the
    /// number of blocks written.
    fn write(&mut self, start: u64, count: u64, buf: &[u8]) -> Result<u64>;

    /// Open a byte stream over `count` blocks starting at `start`, in
    /// stream space.
    fn new_stream(&mut self, start: u64, count: u64) -> Result<Box<dyn Stream>>;
}

/// A storage controller. All hooks default to no-ops so simple controllers
/// only implement what they have.
pub trait BlockDevCtrlr {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }

    /// Synthesize or re-scan this controller's devices, registering them
    /// with `devices` (and device tree fixups with `fixups`).
    fn update(&mut self, _devices: &mut DeviceRegistry, _fixups: &mut FixupList) -> Result<()> {
        Ok(())
    }

    /// Whether `update` still needs to run. Controllers clear this after a
    /// successful synthesis so later enumeration passes skip them.
    fn need_update(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDevClass {
    Fixed,
    Removable,
}

pub type SharedBlockDev = Rc<RefCell<dyn BlockDev>>;

/// Registered devices, split by removability. Registration prepends:
/// enumeration order is most-recently-registered first.
#[derive(Default)]
pub struct DeviceRegistry {
    fixed: Vec<SharedBlockDev>,
    removable: Vec<SharedBlockDev>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_fixed(&mut self, dev: SharedBlockDev) {
        self.fixed.insert(0, dev);
    }

    pub fn register_removable(&mut self, dev: SharedBlockDev) {
        self.removable.insert(0, dev);
    }

    pub fn devices(&self, class: BlockDevClass) -> &[SharedBlockDev] {
        match class {
            BlockDevClass::Fixed => &self.fixed,
            BlockDevClass::Removable => &self.removable,
        }
    }
}

/// The storage subsystem context: controller registries, device
/// registries and the device tree fixup list. Populated during board
/// bring-up; treated as append-only afterwards.
#[derive(Default)]
pub struct StorageSubsystem {
    fixed_ctrlrs: Vec<Box<dyn BlockDevCtrlr>>,
    removable_ctrlrs: Vec<Box<dyn BlockDevCtrlr>>,
    pub devices: DeviceRegistry,
    pub fixups: FixupList,
}

impl StorageSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_ctrlr(&mut self, class: BlockDevClass, ctrlr: Box<dyn BlockDevCtrlr>) {
        match class {
            BlockDevClass::Fixed => self.fixed_ctrlrs.insert(0, ctrlr),
            BlockDevClass::Removable => self.removable_ctrlrs.insert(0, ctrlr),
        }
    }

    /// Init every controller. A failing controller does not stop the
    /// others; the first failure is reported once all have run.
    pub fn init_all(&mut self) -> Result<()> {
        let mut res = Ok(());
        for ctrlr in self
            .fixed_ctrlrs
            .iter_mut()
            .chain(self.removable_ctrlrs.iter_mut())
        {
            if let Err(e) = ctrlr.init() {
                charon_base::log_error!("block device controller init failed: {}", e);
                if res.is_ok() {
                    res = Err(e);
                }
            }
        }
        res
    }

    /// Refresh every controller, with the same aggregation as `init_all`.
    pub fn refresh_all(&mut self) -> Result<()> {
        let mut res = Ok(());
        for ctrlr in self
            .fixed_ctrlrs
            .iter_mut()
            .chain(self.removable_ctrlrs.iter_mut())
        {
            if let Err(e) = ctrlr.refresh() {
                charon_base::log_error!("block device controller refresh failed: {}", e);
                if res.is_ok() {
                    res = Err(e);
                }
            }
        }
        res
    }

    /// Run `update` on every controller of `class` that still needs it,
    /// with the same aggregation as `init_all`.
    pub fn update_all(&mut self, class: BlockDevClass) -> Result<()> {
        let ctrlrs = match class {
            BlockDevClass::Fixed => &mut self.fixed_ctrlrs,
            BlockDevClass::Removable => &mut self.removable_ctrlrs,
        };
        let mut res = Ok(());
        for ctrlr in ctrlrs.iter_mut() {
            if !ctrlr.need_update() {
                continue;
            }
            if let Err(e) = ctrlr.update(&mut self.devices, &mut self.fixups) {
                charon_base::log_error!("block device controller update failed: {}", e);
                if res.is_ok() {
                    res = Err(e);
                }
            }
        }
        res
    }

    pub fn bdevs(&self, class: BlockDevClass) -> &[SharedBlockDev] {
        self.devices.devices(class)
    }
}
