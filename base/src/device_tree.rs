//! Device tree support
//!
//! An owned, mutable device tree the payload edits before handing it to
//! the kernel, plus the fixup list: deferred callbacks that patch the tree
//! with runtime-discovered information during finalization.
//!
//! Only the pieces the payload actually edits are modeled. Property values
//! are raw big-endian byte strings, matching the flattened-tree encoding,
//! so a flattening pass can emit them unchanged.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Cell widths used for `reg` properties when no `#address-cells` /
/// `#size-cells` properties are present on the path.
const DEFAULT_ADDR_CELLS: u32 = 2;
const DEFAULT_SIZE_CELLS: u32 = 1;

/// Result type for device tree edits
pub type Result<T> = core::result::Result<T, DtError>;

/// Errors that can occur while editing the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtError {
    /// No node at the requested path
    NodeNotFound,

    /// A value does not fit the configured cell width
    CellOverflow,

    /// A fixup could not complete
    FixupFailed,
}

impl fmt::Display for DtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound => write!(f, "Node not found"),
            Self::CellOverflow => write!(f, "Value does not fit cell width"),
            Self::FixupFailed => write!(f, "Fixup failed"),
        }
    }
}

/// A single property. The value is stored in flattened-tree encoding
/// (big-endian words for numeric properties).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTreeProperty {
    pub name: String,
    pub value: Vec<u8>,
}

impl DeviceTreeProperty {
    pub fn u32(name: &str, value: u32) -> Self {
        Self {
            name: String::from(name),
            value: value.to_be_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceTreeNode {
    pub name: String,
    pub props: Vec<DeviceTreeProperty>,
    pub children: Vec<DeviceTreeNode>,
}

impl DeviceTreeNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            props: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn find_child(&mut self, name: &str) -> Option<&mut DeviceTreeNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Read a property holding a single 32-bit big-endian word.
    pub fn u32_prop(&self, name: &str) -> Option<u32> {
        let prop = self.props.iter().find(|p| p.name == name)?;
        let bytes: [u8; 4] = prop.value.as_slice().try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    pub fn set_u32_prop(&mut self, name: &str, value: u32) {
        if let Some(prop) = self.props.iter_mut().find(|p| p.name == name) {
            prop.value = value.to_be_bytes().to_vec();
        } else {
            self.props.push(DeviceTreeProperty::u32(name, value));
        }
    }

    /// Add a `reg` property of `(address, size)` pairs encoded with the
    /// given cell widths. Fails if any value needs more cells than
    /// configured; nothing is written in that case.
    pub fn add_reg_prop(
        &mut self,
        regs: &[(u64, u64)],
        addr_cells: u32,
        size_cells: u32,
    ) -> Result<()> {
        let mut value = Vec::new();
        for &(addr, size) in regs {
            encode_cells(&mut value, addr, addr_cells)?;
            encode_cells(&mut value, size, size_cells)?;
        }
        self.props.push(DeviceTreeProperty {
            name: String::from("reg"),
            value,
        });
        Ok(())
    }
}

/// Append `value` as `cells` 32-bit big-endian words, most significant
/// word first.
fn encode_cells(out: &mut Vec<u8>, value: u64, cells: u32) -> Result<()> {
    if cells < 2 && value >> (32 * cells) != 0 {
        return Err(DtError::CellOverflow);
    }
    for i in (0..cells).rev() {
        let word = if i >= 2 { 0 } else { (value >> (32 * i)) as u32 };
        out.extend_from_slice(&word.to_be_bytes());
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct DeviceTree {
    pub root: DeviceTreeNode,
}

impl DeviceTree {
    pub fn new() -> Self {
        Self {
            root: DeviceTreeNode::new(""),
        }
    }

    /// Walk `path` ("/soc/nand@0" style) from the root. On success returns
    /// the node together with the `#address-cells` / `#size-cells` in
    /// effect for its children, picking up overrides along the walk.
    pub fn find_node_by_path(&mut self, path: &str) -> Option<(&mut DeviceTreeNode, u32, u32)> {
        let mut addr_cells = DEFAULT_ADDR_CELLS;
        let mut size_cells = DEFAULT_SIZE_CELLS;

        let mut node = &mut self.root;
        if let Some(c) = node.u32_prop("#address-cells") {
            addr_cells = c;
        }
        if let Some(c) = node.u32_prop("#size-cells") {
            size_cells = c;
        }

        for comp in path.split('/').filter(|c| !c.is_empty()) {
            node = node.children.iter_mut().find(|c| c.name == comp)?;
            if let Some(c) = node.u32_prop("#address-cells") {
                addr_cells = c;
            }
            if let Some(c) = node.u32_prop("#size-cells") {
                size_cells = c;
            }
        }

        Some((node, addr_cells, size_cells))
    }
}

/// A deferred tree edit, run once during finalization.
pub trait DeviceTreeFixup {
    fn fixup(&mut self, tree: &mut DeviceTree) -> Result<()>;
}

/// Registered fixups. Registration prepends, so the most recently
/// registered fixup runs first.
#[derive(Default)]
pub struct FixupList {
    fixups: Vec<Box<dyn DeviceTreeFixup>>,
}

impl FixupList {
    pub const fn new() -> Self {
        Self { fixups: Vec::new() }
    }

    pub fn register(&mut self, fixup: Box<dyn DeviceTreeFixup>) {
        self.fixups.insert(0, fixup);
    }

    pub fn len(&self) -> usize {
        self.fixups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixups.is_empty()
    }

    /// Run every fixup against `tree`, stopping at the first failure.
    pub fn apply(&mut self, tree: &mut DeviceTree) -> Result<()> {
        for fixup in self.fixups.iter_mut() {
            fixup.fixup(tree)?;
        }
        Ok(())
    }
}
