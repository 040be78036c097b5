//! Charon base services
//!
//! Shared plumbing for the payload crates: the global log buffer, the
//! machine power interface, and the device tree the payload hands to the
//! kernel. Nothing in here touches hardware directly.

#![no_std]

extern crate alloc;

pub mod device_tree;
pub mod logger;
pub mod power;

pub use device_tree::{
    DeviceTree, DeviceTreeFixup, DeviceTreeNode, DeviceTreeProperty, DtError, FixupList,
};
pub use power::Power;
