use std::io::Cursor;
use std::path::PathBuf;

use tempfile::TempDir;
use zvfs::compact::compact_file;
use zvfs::header::{DATA_START, FILE_TABLE_OFFSET};
use zvfs::{Container, ContainerOptions, ErrorKind, Header, SlotState};

fn scratch() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.zvfs");
    (dir, path)
}

fn memory() -> Container<Cursor<Vec<u8>>> {
    Container::format(Cursor::new(Vec::new()), ContainerOptions::default()).unwrap()
}

#[test]
fn test_fresh_container_header() {
    let (_dir, path) = scratch();
    let mut fs = Container::create(&path).unwrap();
    let h = fs.header().unwrap();
    assert_eq!(h.file_count, 0);
    assert_eq!(h.flags, 0);
    assert_eq!(h.free_entry_offset, 64);
    assert_eq!(h.next_free_offset, 2112);
    assert_eq!(h.data_start_offset, 2112);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), u64::from(DATA_START));
    assert!(fs.entries().unwrap().iter().all(|e| e.state() == SlotState::Empty));
}

#[test]
fn test_create_existing_fails() {
    let (_dir, path) = scratch();
    Container::create(&path).unwrap();
    let err = Container::create(&path).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Exists);
}

#[test]
fn test_open_missing_and_foreign_files() {
    let (dir, path) = scratch();
    assert_eq!(Container::open(&path).err().unwrap().kind(), ErrorKind::NotFound);

    let foreign = dir.path().join("notes.txt");
    std::fs::write(&foreign, vec![b'x'; 4096]).unwrap();
    assert_eq!(Container::open(&foreign).err().unwrap().kind(), ErrorKind::Format);

    let short = dir.path().join("short.zvfs");
    std::fs::write(&short, b"ZVFS").unwrap();
    assert_eq!(Container::open(&short).err().unwrap().kind(), ErrorKind::Format);
}

#[test]
fn test_insert_fetch_roundtrip_and_alignment() {
    let (_dir, path) = scratch();
    let mut fs = Container::create(&path).unwrap();

    let a = fs.insert("a.txt", b"hello").unwrap();
    let b = fs.insert("b.bin", &[7u8; 130]).unwrap();
    let c = fs.insert("c.empty", b"").unwrap();

    assert_eq!(a.start, 2112);
    assert_eq!(a.entry_offset, FILE_TABLE_OFFSET);
    assert_eq!(b.start, 2176);
    assert_eq!(b.entry_offset, FILE_TABLE_OFFSET + 64);
    assert_eq!(c.start, 2176 + 192);
    for r in [&a, &b, &c] {
        assert_eq!(r.start % 64, 0);
    }

    drop(fs);
    let mut fs = Container::open(&path).unwrap();
    assert_eq!(fs.fetch("a.txt").unwrap(), b"hello");
    assert_eq!(fs.fetch("b.bin").unwrap(), vec![7u8; 130]);
    assert!(fs.fetch("c.empty").unwrap().is_empty());

    let h = fs.header().unwrap();
    assert_eq!(h.file_count, 3);
    assert_eq!(h.next_free_offset, 2368);
    // Payload padding lands on disk.
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 2368);
}

#[test]
fn test_invalid_names() {
    let mut fs = memory();
    assert_eq!(fs.insert("", b"x").unwrap_err().kind(), ErrorKind::Validation);
    let long = "n".repeat(32);
    assert_eq!(fs.insert(&long, b"x").unwrap_err().kind(), ErrorKind::Validation);
    assert_eq!(fs.header().unwrap().file_count, 0);
}

#[test]
fn test_duplicate_active_name_then_reuse_after_delete() {
    let mut fs = memory();
    fs.insert("dup.txt", b"one").unwrap();
    assert_eq!(fs.insert("dup.txt", b"two").unwrap_err().kind(), ErrorKind::Exists);

    fs.delete("dup.txt").unwrap();
    let again = fs.insert("dup.txt", b"two").unwrap();
    assert_eq!(again.entry_offset, FILE_TABLE_OFFSET + 64, "tombstoned slot is not reused");

    // Fetch scans slot order and ignores the flag, so the tombstone wins.
    assert_eq!(fs.fetch("dup.txt").unwrap(), b"one");
    assert_eq!(fs.dump("dup.txt").unwrap(), "two");
}

#[test]
fn test_delete_absent_or_tombstoned() {
    let mut fs = memory();
    assert_eq!(fs.delete("ghost").unwrap_err().kind(), ErrorKind::NotFound);

    fs.insert("once.txt", b"data").unwrap();
    fs.delete("once.txt").unwrap();
    assert_eq!(fs.delete("once.txt").unwrap_err().kind(), ErrorKind::NotFound);

    let h = fs.header().unwrap();
    assert_eq!(h.file_count, 0);
    assert_eq!(h.deleted_files, 1);
}

#[test]
fn test_delete_keeps_allocator_cursors() {
    let mut fs = memory();
    fs.insert("x", &[1u8; 100]).unwrap();
    let before = fs.header().unwrap();
    fs.delete("x").unwrap();
    let after = fs.header().unwrap();
    assert_eq!(before.next_free_offset, after.next_free_offset);
    assert_eq!(before.free_entry_offset, after.free_entry_offset);
    assert_eq!(fs.entries().unwrap()[0].state(), SlotState::Deleted);
}

#[test]
fn test_tombstone_visibility() {
    let mut fs = memory();
    fs.insert("old.log", b"recover me").unwrap();
    fs.delete("old.log").unwrap();

    assert_eq!(fs.fetch("old.log").unwrap(), b"recover me");
    assert_eq!(fs.dump("old.log").unwrap_err().kind(), ErrorKind::NotFound);
    assert!(fs.list().unwrap().files.is_empty());
    assert_eq!(fs.fetch("never").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_table_full_is_capacity_error() {
    let mut fs = memory();
    for i in 0..32 {
        fs.insert(&format!("f{i:02}"), &[i as u8]).unwrap();
    }
    let h = fs.header().unwrap();
    assert_eq!(h.free_entry_offset, 0);
    assert!(h.is_table_full());
    assert_eq!(fs.inspect().unwrap().free_slots, 0);

    assert_eq!(fs.insert("one-more", b"").unwrap_err().kind(), ErrorKind::Capacity);

    // Tombstones do not free a slot.
    fs.delete("f00").unwrap();
    assert_eq!(fs.insert("one-more", b"").unwrap_err().kind(), ErrorKind::Capacity);
}

#[test]
fn test_data_ceiling_is_capacity_error() {
    let mut store = Cursor::new(Vec::new());
    Container::format(&mut store, ContainerOptions::default()).unwrap();
    let near_ceiling = Header::with_cursors(u32::MAX - 63, FILE_TABLE_OFFSET).unwrap();
    store.get_mut()[..64].copy_from_slice(&near_ceiling.to_bytes());

    let mut fs = Container::from_store(store, ContainerOptions::default()).unwrap();
    let err = fs.insert("big", b"x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(fs.header().unwrap().file_count, 0);
}

fn with_header(header: &Header) -> Cursor<Vec<u8>> {
    let mut store = Cursor::new(Vec::new());
    Container::format(&mut store, ContainerOptions::default()).unwrap();
    store.get_mut()[..64].copy_from_slice(&header.to_bytes());
    store
}

#[test]
fn test_entry_cursor_at_data_start_refuses_insert() {
    let store = with_header(&Header::with_cursors(DATA_START, DATA_START).unwrap());
    let mut fs = Container::from_store(store, ContainerOptions::default()).unwrap();

    assert_eq!(fs.inspect().unwrap().free_slots, 0);
    let err = fs.insert("a.txt", &[0xAA; 64]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(fs.header().unwrap().file_count, 0);
    assert!(fs.entries().unwrap().iter().all(|e| e.state() == SlotState::Empty));
}

#[test]
fn test_entry_cursor_off_slot_boundary_is_rejected() {
    let mut header = Header::new();
    header.free_entry_offset = 164;
    let store = with_header(&header);
    let err = Container::from_store(store, ContainerOptions::default()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_list_and_inspect() {
    let mut fs = memory();
    fs.insert("keep.txt", b"12345").unwrap();
    fs.insert("drop.txt", b"1234567890").unwrap();
    fs.delete("drop.txt").unwrap();

    let listing = fs.list().unwrap();
    assert_eq!(listing.capacity, 32);
    assert_eq!(listing.free_slots, 30);
    assert_eq!(listing.files.len(), 1);
    assert_eq!(listing.files[0].name, "keep.txt");
    assert_eq!(listing.files[0].length, 5);
    assert_eq!(listing.files[0].slot, 0);

    let info = fs.inspect().unwrap();
    assert_eq!(info.file_count, 1);
    assert_eq!(info.free_slots, 30);
    assert_eq!(info.deleted_files, 1);
    // Tombstoned bytes still count until compaction.
    assert_eq!(info.total_space_used, 15);
}

#[test]
fn test_compaction_preserves_survivors() {
    let (_dir, path) = scratch();
    let mut fs = Container::create(&path).unwrap();
    fs.insert("a", &[1u8; 70]).unwrap();
    fs.insert("b", &[2u8; 10]).unwrap();
    fs.insert("c", b"").unwrap();
    fs.insert("d", &[4u8; 200]).unwrap();
    fs.delete("b").unwrap();
    fs.delete("d").unwrap();
    let before = fs.list().unwrap();
    drop(fs);

    let report = compact_file(&path, ContainerOptions::default()).unwrap();
    assert_eq!(report.removed, 2);
    assert_eq!(report.bytes_freed, 210);
    assert_eq!(report.file_count, 2);
    assert_eq!(report.next_free_offset, 2112 + 128);

    let mut fs = Container::open(&path).unwrap();
    let h = fs.header().unwrap();
    assert_eq!(h.deleted_files, 0);
    assert_eq!(h.file_count, 2);
    assert_eq!(h.free_entry_offset, FILE_TABLE_OFFSET + 128);
    assert!(fs.entries().unwrap().iter().all(|e| e.state() != SlotState::Deleted));

    let after = fs.list().unwrap();
    assert_eq!(after.files.len(), 2);
    for (old, new) in before.files.iter().zip(&after.files) {
        assert_eq!(old.name, new.name);
        assert_eq!(old.length, new.length);
        assert_eq!(old.created, new.created);
    }
    assert_eq!(fs.fetch("a").unwrap(), vec![1u8; 70]);
    assert!(fs.fetch("c").unwrap().is_empty());
    assert_eq!(fs.fetch("b").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(after.free_slots, 30);
}

#[test]
fn test_compaction_without_tombstones_is_noop() {
    let (_dir, path) = scratch();
    let mut fs = Container::create(&path).unwrap();
    fs.insert("only.txt", b"stay").unwrap();
    drop(fs);
    let before = std::fs::read(&path).unwrap();

    let report = compact_file(&path, ContainerOptions::default()).unwrap();
    assert_eq!(report.removed, 0);
    assert_eq!(report.bytes_freed, 0);
    assert_eq!(report.file_count, 1);
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn test_compaction_reclaims_full_table() {
    let mut fs = memory();
    for i in 0..32 {
        fs.insert(&format!("f{i}"), &[i as u8; 3]).unwrap();
    }
    for i in 0..16 {
        fs.delete(&format!("f{i}")).unwrap();
    }
    let (mut out, report) = fs.compact_to(Cursor::new(Vec::new())).unwrap();
    assert_eq!(report.removed, 16);
    assert_eq!(report.bytes_freed, 48);
    assert_eq!(report.file_count, 16);

    assert_eq!(out.inspect().unwrap().free_slots, 16);
    out.insert("f0", b"new").unwrap();
    assert_eq!(out.fetch("f0").unwrap(), b"new");
    assert_eq!(out.fetch("f31").unwrap(), vec![31u8; 3]);
}

#[test]
fn test_end_to_end() {
    let (dir, path) = scratch();
    let host = dir.path().join("a.txt");
    std::fs::write(&host, b"hello").unwrap();

    let mut fs = Container::create(&path).unwrap();
    fs.insert("a.txt", &std::fs::read(&host).unwrap()).unwrap();
    let info = fs.inspect().unwrap();
    assert_eq!(info.file_count, 1);
    assert_eq!(info.free_slots, 31);

    fs.delete("a.txt").unwrap();
    let info = fs.inspect().unwrap();
    assert_eq!(info.file_count, 0);
    assert_eq!(info.deleted_files, 1);
    drop(fs);

    let report = compact_file(&path, ContainerOptions::default()).unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(report.bytes_freed, 5);
    assert_eq!(report.file_count, 0);
    assert_eq!(report.next_free_offset, 2112);
}
