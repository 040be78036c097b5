// Byte streams over streaming media (NAND behind a SPI controller and
// friends). Block devices that front such media hand out streams for
// sequential reads that bypass the block cache entirely.

use alloc::boxed::Box;

use crate::Result;

/// A byte stream opened over a fixed range.
pub trait Stream {
    /// Read up to `buf.len()` bytes. Returns the number of bytes read;
    /// zero means the range is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Factory for streams over one backing store.
pub trait StreamCtrlr {
    /// Total byte size of the streaming store. Fails when the backing
    /// medium never came up.
    fn size(&mut self) -> Result<u64>;

    /// Open a stream covering `count_byte` bytes at `start_byte`.
    fn open(&mut self, start_byte: u64, count_byte: u64) -> Result<Box<dyn Stream>>;
}
