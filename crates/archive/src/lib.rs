#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Engine for reading and mutating legacy WAD game archives.
//!
//! An archive is a single file holding a flat table of 16-byte descriptor
//! records plus a payload region. Directory structure is implied by naming
//! conventions rather than stored explicitly: `<dir>_START`/`<dir>_END`
//! marker pairs bracket directories, and 4-character map headers such as
//! `E1M1` open groups that own the following ten descriptors. This crate
//! reconstructs a rooted tree from that flat table, indexes every entry by
//! its canonical absolute path, and services the restricted mutation set
//! (directory creation, file creation, first-time write) by rewriting the
//! table and header in place.
//!
//! # Archive Layout
//!
//! ```text
//! offset 0   : 4-byte magic tag (opaque, preserved verbatim)
//! offset 4   : u32 LE  N       (number of descriptor records)
//! offset 8   : u32 LE  D       (byte offset of the descriptor table)
//! offset 12  : payload region (D - 12 bytes, append-only)
//! offset D   : N x 16-byte descriptor records
//! ```
//!
//! Payload bytes are never moved or reclaimed: mutations append payload at
//! the end of the file and rewrite the table after it, leaving the old
//! table behind as dead space. Within a mutation the write order is always
//! payload, then table, then header, so an interrupted mutation leaves at
//! worst orphan bytes in a still-valid archive.
//!
//! # Example
//!
//! ```no_run
//! use archive::Archive;
//!
//! let mut wad = Archive::load("doom.wad")?;
//! assert_eq!(wad.magic(), b"IWAD");
//!
//! for name in wad.list("/")? {
//!     println!("{name}");
//! }
//!
//! wad.create_directory("/MY")?;
//! wad.create_file("/MY/NOTES")?;
//! wad.write("/MY/NOTES", b"hello", 0)?;
//! # Ok::<(), archive::ArchiveError>(())
//! ```

mod archive;

/// On-disk encoding of the header and descriptor records.
pub mod codec;

mod error;

/// Classification of canonical descriptor names.
pub mod name;

/// Tree builder: folds the flat descriptor sequence into a rooted tree.
pub mod parse;

/// The in-memory entry tree and its path index.
pub mod tree;

pub use archive::Archive;
pub use error::{ArchiveError, ArchiveResult};
pub use tree::{Entry, EntryId, EntryKind, Tree};
