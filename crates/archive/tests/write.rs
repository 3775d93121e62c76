//! Integration tests for first-time writes.
//!
//! A write appends payload at the end of the file, points the entry at it,
//! and rewrites the whole descriptor table from the tree. Old table bytes
//! become dead space; the header must track the fresh table exactly.

mod common;

use archive::{Archive, ArchiveError};
use common::{RECORD_LEN, WadBuilder, read_header_fields, read_table};
use tempfile::TempDir;

fn archive_with_empty_file(dir: &TempDir) -> std::path::PathBuf {
    let path = WadBuilder::new().write_into(dir);
    let mut wad = Archive::load(&path).expect("load archive");
    wad.create_directory("/AB").expect("create /AB");
    wad.create_file("/AB/hi").expect("create /AB/hi");
    path
}

// ============================================================================
// First Write
// ============================================================================

#[test]
fn write_then_reload_round_trips_the_payload() {
    let dir = TempDir::new().expect("create tempdir");
    let path = archive_with_empty_file(&dir);

    let mut wad = Archive::load(&path).expect("load archive");
    let written = wad.write("/AB/hi", b"hello", 0).expect("write payload");
    assert_eq!(written, 5);
    drop(wad);

    let mut reloaded = Archive::load(&path).expect("reload archive");
    assert_eq!(reloaded.size("/AB/hi"), Some(5));
    let mut buf = [0u8; 5];
    let read = reloaded.read("/AB/hi", &mut buf, 0).expect("read back");
    assert_eq!(read, 5);
    assert_eq!(&buf, b"hello");
}

#[test]
fn write_places_the_table_past_the_appended_payload() {
    let dir = TempDir::new().expect("create tempdir");
    let path = archive_with_empty_file(&dir);
    let len_before = std::fs::metadata(&path).expect("stat").len();

    let mut wad = Archive::load(&path).expect("load archive");
    wad.write("/AB/hi", b"hello", 0).expect("write payload");

    let (count, table_offset) = read_header_fields(&path);
    // Payload lands where the file used to end; the table directly after.
    assert_eq!(u64::from(table_offset), len_before + 5);
    let len_after = std::fs::metadata(&path).expect("stat").len();
    assert_eq!(
        len_after,
        u64::from(table_offset) + u64::from(count) * RECORD_LEN as u64
    );

    let table = read_table(&path);
    assert_eq!(
        table,
        vec![
            (0, 0, "AB_START".to_owned()),
            (table_offset - 5, 5, "hi".to_owned()),
            (0, 0, "AB_END".to_owned()),
        ]
    );
}

#[test]
fn second_write_is_an_accepted_no_op() {
    let dir = TempDir::new().expect("create tempdir");
    let path = archive_with_empty_file(&dir);

    let mut wad = Archive::load(&path).expect("load archive");
    wad.write("/AB/hi", b"hello", 0).expect("first write");
    let image_after_first = std::fs::read(&path).expect("snapshot");

    let written = wad.write("/AB/hi", b"other", 0).expect("second write");
    assert_eq!(written, 0);
    assert_eq!(std::fs::read(&path).expect("re-read"), image_after_first);

    let mut buf = [0u8; 5];
    wad.read("/AB/hi", &mut buf, 0).expect("read back");
    assert_eq!(&buf, b"hello");
}

#[test]
fn write_offset_is_ignored_on_an_empty_file() {
    let dir = TempDir::new().expect("create tempdir");
    let path = archive_with_empty_file(&dir);

    let mut wad = Archive::load(&path).expect("load archive");
    let written = wad.write("/AB/hi", b"hello", 42).expect("offset write");
    assert_eq!(written, 5);

    let mut buf = [0u8; 5];
    let read = wad.read("/AB/hi", &mut buf, 0).expect("read back");
    assert_eq!(read, 5);
    assert_eq!(&buf, b"hello");
}

#[test]
fn write_refuses_directories_and_missing_paths() {
    let dir = TempDir::new().expect("create tempdir");
    let path = archive_with_empty_file(&dir);

    let mut wad = Archive::load(&path).expect("load archive");

    assert!(matches!(
        wad.write("/AB", b"x", 0),
        Err(ArchiveError::NotContent(_))
    ));
    assert!(matches!(
        wad.write("/NOPE", b"x", 0),
        Err(ArchiveError::NotFound(_))
    ));
}

// ============================================================================
// Table Re-serialization
// ============================================================================

#[test]
fn rewrite_preserves_pre_existing_lumps() {
    let dir = TempDir::new().expect("create tempdir");
    let path = WadBuilder::new()
        .marker("F1_START")
        .lump("OLD", b"abcd")
        .marker("F1_END")
        .write_into(&dir);

    let mut wad = Archive::load(&path).expect("load archive");
    wad.create_file("/F1/NEW").expect("create /F1/NEW");
    wad.write("/F1/NEW", b"xy", 0).expect("write /F1/NEW");
    drop(wad);

    let mut reloaded = Archive::load(&path).expect("reload archive");
    assert_eq!(reloaded.list("/F1").expect("list"), vec!["OLD", "NEW"]);

    // The old payload is still addressed at its original location.
    let mut buf = [0u8; 4];
    reloaded.read("/F1/OLD", &mut buf, 0).expect("read old");
    assert_eq!(&buf, b"abcd");
    let mut buf = [0u8; 2];
    reloaded.read("/F1/NEW", &mut buf, 0).expect("read new");
    assert_eq!(&buf, b"xy");
}

#[test]
fn rewrite_brackets_every_non_root_directory() {
    let dir = TempDir::new().expect("create tempdir");
    let path = WadBuilder::new().write_into(&dir);

    let mut wad = Archive::load(&path).expect("load archive");
    wad.create_directory("/A").expect("create /A");
    wad.create_directory("/A/B").expect("create /A/B");
    wad.create_file("/A/B/F").expect("create /A/B/F");
    wad.write("/A/B/F", b"data", 0).expect("write /A/B/F");

    let names: Vec<String> = read_table(&path).into_iter().map(|(_, _, n)| n).collect();
    assert_eq!(
        names,
        vec!["A_START", "B_START", "F", "B_END", "A_END"]
    );
}

#[test]
fn old_table_bytes_become_dead_space() {
    let dir = TempDir::new().expect("create tempdir");
    let path = archive_with_empty_file(&dir);
    let (_, table_before) = read_header_fields(&path);
    let image_before = std::fs::read(&path).expect("snapshot");

    let mut wad = Archive::load(&path).expect("load archive");
    wad.write("/AB/hi", b"hello", 0).expect("write payload");

    // Nothing before the old table moved; the file only grew.
    let image_after = std::fs::read(&path).expect("re-read");
    assert!(image_after.len() > image_before.len());
    assert_eq!(
        &image_after[12..table_before as usize],
        &image_before[12..table_before as usize]
    );

    let (_, table_after) = read_header_fields(&path);
    assert!(table_after > table_before);
}

#[test]
fn empty_write_keeps_the_file_writable_layout_consistent() {
    // Writing zero bytes still rewrites the table; the entry stays at
    // size zero.
    let dir = TempDir::new().expect("create tempdir");
    let path = archive_with_empty_file(&dir);

    let mut wad = Archive::load(&path).expect("load archive");
    let written = wad.write("/AB/hi", b"", 0).expect("empty write");
    assert_eq!(written, 0);

    let reloaded = Archive::load(&path).expect("reload archive");
    assert_eq!(reloaded.size("/AB/hi"), Some(0));
    assert!(reloaded.is_directory("/AB"));
}
