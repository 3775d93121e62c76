//! crates/archive/src/codec.rs
//!
//! On-disk encoding of the archive header and descriptor records.
//!
//! The archive starts with a fixed 12-byte header: a 4-byte magic tag
//! carried verbatim, the descriptor count, and the byte offset of the
//! descriptor table. The table itself is a run of 16-byte records, each
//! naming either a content lump or a directory marker. All integers are
//! little-endian.

use std::io::{self, Read, Write};

use byteorder::{LE, ReadBytesExt, WriteBytesExt};

/// Length in bytes of the archive header.
pub const HEADER_LEN: usize = 12;

/// Length in bytes of one descriptor record.
pub const RECORD_LEN: usize = 16;

/// Length in bytes of the name field inside a descriptor record.
pub const NAME_LEN: usize = 8;

/// The fixed 12-byte prefix of an archive file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    /// Magic tag, exposed verbatim and never interpreted.
    pub magic: [u8; 4],
    /// Number of 16-byte records in the descriptor table.
    pub count: u32,
    /// Byte offset of the descriptor table.
    pub table_offset: u32,
}

impl Header {
    /// Reads a header from the start of `reader`.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        let count = reader.read_u32::<LE>()?;
        let table_offset = reader.read_u32::<LE>()?;
        Ok(Self {
            magic,
            count,
            table_offset,
        })
    }

    /// Writes the full 12-byte header, magic tag included.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_u32::<LE>(self.count)?;
        writer.write_u32::<LE>(self.table_offset)
    }
}

/// A descriptor record as it appears on disk, name field unstripped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawRecord {
    /// Byte offset of the lump payload (0 for markers and fresh files).
    pub offset: u32,
    /// Byte length of the lump payload (0 for markers and fresh files).
    pub size: u32,
    /// Name field, right-padded with NUL bytes and/or spaces.
    pub name: [u8; NAME_LEN],
}

impl RawRecord {
    /// Reads one 16-byte record from `reader`.
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let offset = reader.read_u32::<LE>()?;
        let size = reader.read_u32::<LE>()?;
        let mut name = [0u8; NAME_LEN];
        reader.read_exact(&mut name)?;
        Ok(Self { offset, size, name })
    }

    /// Returns the canonical form of the name field.
    ///
    /// Everything from the first NUL byte onward is dropped, then trailing
    /// spaces are stripped. A record whose canonical name is empty is
    /// skipped by the parser.
    pub fn canonical_name(&self) -> String {
        canonical_name(&self.name)
    }
}

/// Canonicalizes a raw name field: drop from the first NUL, strip trailing
/// spaces.
pub fn canonical_name(raw: &[u8]) -> String {
    let unpadded = raw
        .iter()
        .position(|&b| b == 0)
        .map_or(raw, |nul| &raw[..nul]);
    let end = unpadded
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(0, |last| last + 1);
    String::from_utf8_lossy(&unpadded[..end]).into_owned()
}

/// Appends one encoded 16-byte record to `out`.
///
/// The name is padded with NUL bytes to [`NAME_LEN`] and truncated beyond
/// it; callers that accept user-supplied names validate lengths before
/// encoding.
pub fn encode_record(offset: u32, size: u32, name: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    let mut field = [0u8; NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(NAME_LEN);
    field[..len].copy_from_slice(&bytes[..len]);
    out.extend_from_slice(&field);
}
