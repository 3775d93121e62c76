//! Shared helpers for building scratch archives on disk.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Length in bytes of one descriptor record.
pub const RECORD_LEN: usize = 16;

/// Builds a syntactically valid archive image in memory.
///
/// Lumps append their bytes to the payload region and record the matching
/// offset/size pair; markers record zero offset and size. The header is
/// derived at build time: the table starts right after the payload.
pub struct WadBuilder {
    magic: [u8; 4],
    payload: Vec<u8>,
    records: Vec<(u32, u32, [u8; 8])>,
}

impl WadBuilder {
    pub fn new() -> Self {
        Self {
            magic: *b"IWAD",
            payload: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn magic(mut self, magic: &[u8; 4]) -> Self {
        self.magic = *magic;
        self
    }

    /// Appends a marker record (zero offset and size).
    pub fn marker(self, name: &str) -> Self {
        self.record(0, 0, name)
    }

    /// Appends a content lump, placing `data` in the payload region.
    pub fn lump(mut self, name: &str, data: &[u8]) -> Self {
        let offset = 12 + self.payload.len() as u32;
        self.payload.extend_from_slice(data);
        self.record(offset, data.len() as u32, name)
    }

    /// Appends a record with an explicit offset/size pair.
    pub fn record(mut self, offset: u32, size: u32, name: &str) -> Self {
        let mut field = [0u8; 8];
        let bytes = name.as_bytes();
        assert!(bytes.len() <= 8, "test names must fit the record field");
        field[..bytes.len()].copy_from_slice(bytes);
        self.records.push((offset, size, field));
        self
    }

    /// Appends a record with a raw, possibly padded name field.
    pub fn raw_record(mut self, offset: u32, size: u32, name: [u8; 8]) -> Self {
        self.records.push((offset, size, name));
        self
    }

    /// Renders the archive image: header, payload, descriptor table.
    pub fn build(&self) -> Vec<u8> {
        let table_offset = 12 + self.payload.len() as u32;
        let mut image = Vec::new();
        image.extend_from_slice(&self.magic);
        image.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        image.extend_from_slice(&table_offset.to_le_bytes());
        image.extend_from_slice(&self.payload);
        for (offset, size, name) in &self.records {
            image.extend_from_slice(&offset.to_le_bytes());
            image.extend_from_slice(&size.to_le_bytes());
            image.extend_from_slice(name);
        }
        image
    }

    /// Writes the image into `dir` and returns its path.
    pub fn write_into(&self, dir: &TempDir) -> PathBuf {
        let path = dir.path().join("scratch.wad");
        fs::write(&path, self.build()).expect("write scratch archive");
        path
    }
}

/// Decodes the on-disk descriptor table of an archive file into
/// `(offset, size, canonical_name)` triples, for asserting byte-level
/// layout after mutations.
pub fn read_table(path: &Path) -> Vec<(u32, u32, String)> {
    let image = fs::read(path).expect("read archive back");
    let count = u32::from_le_bytes(image[4..8].try_into().unwrap()) as usize;
    let table_offset = u32::from_le_bytes(image[8..12].try_into().unwrap()) as usize;

    let table = &image[table_offset..table_offset + count * RECORD_LEN];
    table
        .chunks_exact(RECORD_LEN)
        .map(|record| {
            let offset = u32::from_le_bytes(record[0..4].try_into().unwrap());
            let size = u32::from_le_bytes(record[4..8].try_into().unwrap());
            let nul = record[8..].iter().position(|&b| b == 0).unwrap_or(8);
            let name = String::from_utf8_lossy(&record[8..8 + nul])
                .trim_end_matches(' ')
                .to_owned();
            (offset, size, name)
        })
        .collect()
}

/// Reads the `(N, D)` header fields of an archive file.
pub fn read_header_fields(path: &Path) -> (u32, u32) {
    let image = fs::read(path).expect("read archive back");
    (
        u32::from_le_bytes(image[4..8].try_into().unwrap()),
        u32::from_le_bytes(image[8..12].try_into().unwrap()),
    )
}
