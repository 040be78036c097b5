//! FMAP region table
//!
//! The flashmap structure names areas inside the flash window so callers
//! can address "GBB" or "RW_GPT" instead of raw offsets. The table is
//! usually parsed out of the image itself; boards that hardcode their
//! layout build one with [`Fmap::add_area`].

use alloc::string::String;
use alloc::vec::Vec;

use crate::{FlashError, Result};

const FMAP_SIGNATURE: &[u8; 8] = b"__FMAP__";
const FMAP_VER_MAJOR: u8 = 1;

// Fixed-size binary layout: 56-byte header, 42-byte area records.
const FMAP_HEADER_LEN: usize = 56;
const FMAP_AREA_LEN: usize = 42;
const FMAP_NAME_LEN: usize = 32;

/// A named region of the flash window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmapArea {
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug)]
struct FmapEntry {
    name: String,
    area: FmapArea,
}

/// The parsed region table.
#[derive(Debug, Default)]
pub struct Fmap {
    entries: Vec<FmapEntry>,
}

impl Fmap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register an area by hand, replacing any existing area of the same
    /// name.
    pub fn add_area(&mut self, name: &str, offset: u32, size: u32) {
        let area = FmapArea { offset, size };
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            entry.area = area;
        } else {
            self.entries.push(FmapEntry {
                name: String::from(name),
                area,
            });
        }
    }

    pub fn find_area(&self, name: &str) -> Option<FmapArea> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.area)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the standard flashmap binary layout: signature, version,
    /// base/size, table name, then the area records.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FMAP_HEADER_LEN || &data[..8] != FMAP_SIGNATURE {
            charon_base::log_error!("no FMAP signature");
            return Err(FlashError::InvalidFmap);
        }
        if data[8] != FMAP_VER_MAJOR {
            charon_base::log_error!("unsupported FMAP version {}.{}", data[8], data[9]);
            return Err(FlashError::InvalidFmap);
        }

        let nareas = u16::from_le_bytes([data[54], data[55]]) as usize;
        let mut fmap = Fmap::new();
        for i in 0..nareas {
            let base = FMAP_HEADER_LEN + i * FMAP_AREA_LEN;
            let record = data
                .get(base..base + FMAP_AREA_LEN)
                .ok_or(FlashError::InvalidFmap)?;
            let offset = u32::from_le_bytes(record[0..4].try_into().unwrap());
            let size = u32::from_le_bytes(record[4..8].try_into().unwrap());
            let name = fixed_name(&record[8..8 + FMAP_NAME_LEN]);
            fmap.entries.push(FmapEntry {
                name,
                area: FmapArea { offset, size },
            });
        }
        Ok(fmap)
    }

    /// Serialize back to the binary layout. Used by tests and by tooling
    /// that stamps a layout into a fresh image.
    pub fn to_bytes(&self, base: u64, size: u32, name: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(FMAP_HEADER_LEN + self.entries.len() * FMAP_AREA_LEN);
        out.extend_from_slice(FMAP_SIGNATURE);
        out.push(FMAP_VER_MAJOR);
        out.push(0); // ver_minor
        out.extend_from_slice(&base.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&padded_name(name));
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.area.offset.to_le_bytes());
            out.extend_from_slice(&entry.area.size.to_le_bytes());
            out.extend_from_slice(&padded_name(&entry.name));
            out.extend_from_slice(&0u16.to_le_bytes()); // flags
        }
        out
    }
}

fn fixed_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn padded_name(name: &str) -> [u8; FMAP_NAME_LEN] {
    let mut out = [0u8; FMAP_NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(FMAP_NAME_LEN - 1);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}
