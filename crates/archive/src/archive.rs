//! crates/archive/src/archive.rs
//!
//! The archive engine: load, query surface, and the mutating rewrite
//! algorithms that keep the on-disk descriptor table consistent with the
//! in-memory tree.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LE, WriteBytesExt};
use tracing::debug;

use crate::codec::{self, Header, RECORD_LEN, RawRecord};
use crate::error::{ArchiveError, ArchiveResult};
use crate::name::{MAX_DIR_NAME_LEN, MAX_NAME_LEN, end_marker, is_reserved_map_name, start_marker};
use crate::parse::{Descriptor, build_tree};
use crate::tree::{Entry, EntryId, Tree, canonical_path, split_parent};

/// An open archive: the exclusive file handle, the decoded header fields,
/// and the in-memory tree with its path index.
///
/// The engine is single-threaded and runs every operation to completion;
/// file positioning is re-established per operation. Mutations write
/// payload bytes first, then the descriptor table, then the header, and
/// flush before returning, so a crash mid-mutation leaves at worst orphan
/// payload bytes in a still-valid archive.
#[derive(Debug)]
pub struct Archive {
    file: std::fs::File,
    magic: [u8; 4],
    descriptor_count: u32,
    table_offset: u32,
    tree: Tree,
}

impl Archive {
    /// Opens an archive read-write and parses its descriptor table into a
    /// tree.
    ///
    /// Records whose canonical name is empty are skipped. The handle stays
    /// open for the engine's lifetime.
    pub fn load(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                ArchiveError::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to open archive '{}': {}", path.display(), e),
                ))
            })?;

        let header = Header::read_from(&mut file)?;
        file.seek(SeekFrom::Start(u64::from(header.table_offset)))?;

        let mut descriptors = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            let record = RawRecord::read_from(&mut file)?;
            let name = record.canonical_name();
            if !name.is_empty() {
                descriptors.push(Descriptor {
                    name,
                    offset: record.offset,
                    size: record.size,
                });
            }
        }

        let tree = build_tree(&descriptors);
        debug!(
            path = %path.display(),
            records = header.count,
            entries = descriptors.len(),
            "archive loaded"
        );

        Ok(Self {
            file,
            magic: header.magic,
            descriptor_count: header.count,
            table_offset: header.table_offset,
            tree,
        })
    }

    /// The raw 4-byte magic tag from the start of the file.
    #[must_use]
    pub fn magic(&self) -> &[u8; 4] {
        &self.magic
    }

    /// Returns `true` iff the path resolves to a content entry.
    #[must_use]
    pub fn is_content(&self, path: &str) -> bool {
        self.tree
            .resolve(path)
            .is_some_and(|id| !self.tree.entry(id).is_directory())
    }

    /// Returns `true` iff the path resolves to a directory entry.
    #[must_use]
    pub fn is_directory(&self, path: &str) -> bool {
        self.tree
            .resolve(path)
            .is_some_and(|id| self.tree.entry(id).is_directory())
    }

    /// Payload size of a content entry, or `None` for directories and
    /// missing paths.
    #[must_use]
    pub fn size(&self, path: &str) -> Option<u32> {
        let entry = self.tree.entry(self.tree.resolve(path)?);
        if entry.is_directory() {
            None
        } else {
            Some(entry.size)
        }
    }

    /// Copies payload bytes into `buf`, starting `offset` bytes into the
    /// entry's payload.
    ///
    /// Returns `Ok(0)` once `offset` reaches the payload size; otherwise
    /// copies `min(buf.len(), size - offset)` bytes and returns the count.
    pub fn read(&mut self, path: &str, buf: &mut [u8], offset: u64) -> ArchiveResult<usize> {
        let path = canonical_path(path);
        let id = self
            .tree
            .resolve(path)
            .ok_or_else(|| ArchiveError::NotFound(path.to_owned()))?;
        let entry = self.tree.entry(id);
        if entry.is_directory() {
            return Err(ArchiveError::NotContent(path.to_owned()));
        }

        let size = u64::from(entry.size);
        if offset >= size {
            return Ok(0);
        }
        let wanted = buf.len().min((size - offset) as usize);
        self.file
            .seek(SeekFrom::Start(u64::from(entry.offset) + offset))?;
        self.file.read_exact(&mut buf[..wanted])?;
        Ok(wanted)
    }

    /// Child canonical names of a directory, in archive order.
    pub fn list(&self, path: &str) -> ArchiveResult<Vec<String>> {
        let path = canonical_path(path);
        let id = self
            .tree
            .resolve(path)
            .ok_or_else(|| ArchiveError::NotFound(path.to_owned()))?;
        if !self.tree.entry(id).is_directory() {
            return Err(ArchiveError::NotDirectory(path.to_owned()));
        }
        Ok(self.tree.child_names(id))
    }

    /// Creates a directory by splicing a `<name>_START`/`<name>_END` pair
    /// into the on-disk table immediately before the parent's end marker.
    ///
    /// The directory name is limited to [`MAX_DIR_NAME_LEN`] characters so
    /// its markers fit the 8-byte name field. The table moves forward by
    /// two records; the descriptor count grows by two.
    pub fn create_directory(&mut self, path: &str) -> ArchiveResult<()> {
        let path = canonical_path(path).to_owned();
        let (parent_path, dir_name) = split_parent(&path)
            .ok_or_else(|| ArchiveError::InvalidName(format!("'{path}' is not absolute")))?;
        let parent = self.mutable_parent(parent_path)?;
        if self.tree.resolve(&path).is_some() {
            return Err(ArchiveError::AlreadyExists(path));
        }
        if dir_name.len() > MAX_DIR_NAME_LEN {
            return Err(ArchiveError::InvalidName(format!(
                "directory name '{dir_name}' exceeds {MAX_DIR_NAME_LEN} characters"
            )));
        }

        let mut records = Vec::with_capacity(2 * RECORD_LEN);
        codec::encode_record(0, 0, &start_marker(dir_name), &mut records);
        codec::encode_record(0, 0, &end_marker(dir_name), &mut records);
        let table = self.splice_into_table(parent, &records)?;

        self.descriptor_count += 2;
        self.table_offset += (2 * RECORD_LEN) as u32;
        self.rewrite_table_and_header(&table)?;

        self.tree.attach(parent, Entry::directory(dir_name));
        debug!(path = %path, "directory created");
        Ok(())
    }

    /// Creates an empty file by splicing a single zero record into the
    /// on-disk table immediately before the parent's end marker.
    ///
    /// The descriptor table is rewritten at the current end of file and the
    /// header's table offset re-derived from it, which can leave dead bytes
    /// between the old and new tables.
    pub fn create_file(&mut self, path: &str) -> ArchiveResult<()> {
        let path = canonical_path(path).to_owned();
        let (parent_path, file_name) = split_parent(&path)
            .ok_or_else(|| ArchiveError::InvalidName(format!("'{path}' is not absolute")))?;
        let parent = self.mutable_parent(parent_path)?;
        if self.tree.resolve(&path).is_some() {
            return Err(ArchiveError::AlreadyExists(path));
        }
        if file_name.len() > MAX_NAME_LEN {
            return Err(ArchiveError::InvalidName(format!(
                "file name '{file_name}' exceeds {MAX_NAME_LEN} characters"
            )));
        }
        if is_reserved_map_name(file_name) {
            return Err(ArchiveError::InvalidName(format!(
                "'{file_name}' is reserved for map-group headers"
            )));
        }

        let mut record = Vec::with_capacity(RECORD_LEN);
        codec::encode_record(0, 0, file_name, &mut record);
        let table = self.splice_into_table(parent, &record)?;

        self.descriptor_count += 1;
        let end = self.file.seek(SeekFrom::End(0))?;
        self.table_offset = end as u32;
        self.rewrite_table_and_header(&table)?;

        self.tree.attach(parent, Entry::content(file_name, 0, 0));
        debug!(path = %path, "file created");
        Ok(())
    }

    /// First-time write: appends `data` to the end of the file, points the
    /// entry at it, and rewrites the whole descriptor table from the tree.
    ///
    /// Only content entries whose recorded size is still zero accept
    /// payload; a second write returns `Ok(0)` without touching the
    /// archive. The `offset` argument is accepted for the caller's
    /// convenience and ignored: the write always starts at the payload
    /// beginning.
    pub fn write(&mut self, path: &str, data: &[u8], _offset: u64) -> ArchiveResult<usize> {
        let path = canonical_path(path);
        let id = self
            .tree
            .resolve(path)
            .ok_or_else(|| ArchiveError::NotFound(path.to_owned()))?;
        let entry = self.tree.entry(id);
        if entry.is_directory() {
            return Err(ArchiveError::NotContent(path.to_owned()));
        }
        if entry.size != 0 {
            return Ok(0);
        }

        let payload_offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(data)?;

        let target = self.tree.entry_mut(id);
        target.offset = payload_offset as u32;
        target.size = data.len() as u32;

        let mut table = Vec::new();
        self.tree.serialize_table(&mut table);

        let table_offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&table)?;
        self.descriptor_count = (table.len() / RECORD_LEN) as u32;
        self.table_offset = table_offset as u32;
        self.write_header()?;
        self.file.sync_all()?;

        debug!(path = %path, bytes = data.len(), "payload written");
        Ok(data.len())
    }

    /// Resolves and validates the parent of a mutation target.
    fn mutable_parent(&self, parent_path: &str) -> ArchiveResult<EntryId> {
        let id = self
            .tree
            .resolve(parent_path)
            .ok_or_else(|| ArchiveError::NotFound(parent_path.to_owned()))?;
        if !self.tree.entry(id).is_directory() {
            return Err(ArchiveError::NotDirectory(parent_path.to_owned()));
        }
        Ok(id)
    }

    /// Reads the current on-disk table and splices `records` in
    /// immediately before the parent's `_END` marker, returning the new
    /// table image.
    ///
    /// The root has no end marker; its insertions append at the table end.
    /// A non-root parent without a marker (a map group that has never been
    /// normalized by a write) yields [`ArchiveError::MarkerMissing`].
    fn splice_into_table(&mut self, parent: EntryId, records: &[u8]) -> ArchiveResult<Vec<u8>> {
        let mut table = vec![0u8; self.descriptor_count as usize * RECORD_LEN];
        self.file
            .seek(SeekFrom::Start(u64::from(self.table_offset)))?;
        self.file.read_exact(&mut table)?;

        let parent_entry = self.tree.entry(parent);
        let marker = end_marker(&parent_entry.name);
        let position = table
            .chunks_exact(RECORD_LEN)
            .position(|record| codec::canonical_name(&record[8..]) == marker);

        let index = match position {
            Some(index) => index,
            None if parent == self.tree.root() => self.descriptor_count as usize,
            None => return Err(ArchiveError::MarkerMissing(parent_entry.name.clone())),
        };

        let at = index * RECORD_LEN;
        table.splice(at..at, records.iter().copied());
        Ok(table)
    }

    /// Writes `table` at the current table offset, then the header, then
    /// flushes.
    fn rewrite_table_and_header(&mut self, table: &[u8]) -> ArchiveResult<()> {
        self.file
            .seek(SeekFrom::Start(u64::from(self.table_offset)))?;
        self.file.write_all(table)?;
        self.write_header()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Rewrites the descriptor count and table offset at their fixed header
    /// positions; the magic tag is never touched.
    fn write_header(&mut self) -> ArchiveResult<()> {
        self.file.seek(SeekFrom::Start(4))?;
        self.file.write_u32::<LE>(self.descriptor_count)?;
        self.file.write_u32::<LE>(self.table_offset)?;
        Ok(())
    }
}
