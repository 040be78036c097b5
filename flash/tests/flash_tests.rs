//! Flash window and FMAP tests

use charon_flash::{Flash, FlashError, Fmap, MemMappedFlash};

fn test_flash(size: usize) -> MemMappedFlash {
    MemMappedFlash::new(Vec::leak(vec![0xffu8; size]))
}

#[test]
fn read_within_bounds() {
    let mut flash = test_flash(0x1000);
    flash.write(0x100, &[1, 2, 3, 4]).unwrap();
    assert_eq!(flash.read(0x100, 4).unwrap(), &[1, 2, 3, 4]);
}

#[test]
fn read_rejects_out_of_bounds() {
    let flash = test_flash(0x1000);
    assert_eq!(flash.read(0x1000, 1).unwrap_err(), FlashError::OutOfBounds);
    assert_eq!(flash.read(0xfff, 2).unwrap_err(), FlashError::OutOfBounds);
    // offset + size wrapping around u32 must not slip past the check
    assert_eq!(
        flash.read(0xffff_ffff, 2).unwrap_err(),
        FlashError::OutOfBounds
    );
    // a zero-length read at the very end is still inside the window
    assert!(flash.read(0x1000, 0).is_ok());
}

#[test]
fn write_rejects_out_of_bounds() {
    let mut flash = test_flash(0x100);
    let err = flash.write(0xfe, &[0, 1, 2]).unwrap_err();
    assert_eq!(err, FlashError::OutOfBounds);
    // nothing was clamped or partially written
    assert_eq!(flash.read(0xfe, 2).unwrap(), &[0xff, 0xff]);
}

#[test]
fn write_protect_blocks_writes() {
    let mut flash = test_flash(0x100);
    flash.set_write_protect(true).unwrap();
    assert_eq!(
        flash.write(0, &[0xaa]).unwrap_err(),
        FlashError::WriteProtected
    );
    assert_eq!(flash.read(0, 1).unwrap(), &[0xff]);

    flash.set_write_protect(false).unwrap();
    assert_eq!(flash.write(0, &[0xaa]).unwrap(), 1);
    assert_eq!(flash.read(0, 1).unwrap(), &[0xaa]);
}

#[test]
fn fmap_round_trip() {
    let mut fmap = Fmap::new();
    fmap.add_area("RW_GPT", 0x4000, 0x8000);
    fmap.add_area("GBB", 0x1000, 0x2000);

    let blob = fmap.to_bytes(0, 0x0010_0000, "FMAP");
    let parsed = Fmap::parse(&blob).unwrap();
    assert_eq!(parsed.len(), 2);

    let gpt = parsed.find_area("RW_GPT").unwrap();
    assert_eq!(gpt.offset, 0x4000);
    assert_eq!(gpt.size, 0x8000);
    assert!(parsed.find_area("RO_VPD").is_none());
}

#[test]
fn fmap_rejects_bad_signature() {
    let mut fmap = Fmap::new();
    fmap.add_area("GBB", 0, 0x1000);
    let mut blob = fmap.to_bytes(0, 0x1000, "FMAP");
    blob[0] = b'X';
    assert_eq!(Fmap::parse(&blob).unwrap_err(), FlashError::InvalidFmap);
}

#[test]
fn fmap_rejects_truncated_area_table() {
    let mut fmap = Fmap::new();
    fmap.add_area("GBB", 0, 0x1000);
    let blob = fmap.to_bytes(0, 0x1000, "FMAP");
    let truncated = &blob[..blob.len() - 4];
    assert_eq!(Fmap::parse(truncated).unwrap_err(), FlashError::InvalidFmap);
}

#[test]
fn add_area_replaces_existing() {
    let mut fmap = Fmap::new();
    fmap.add_area("GBB", 0, 0x1000);
    fmap.add_area("GBB", 0x2000, 0x800);
    assert_eq!(fmap.len(), 1);
    assert_eq!(fmap.find_area("GBB").unwrap().offset, 0x2000);
}
