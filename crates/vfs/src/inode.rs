//! crates/vfs/src/inode.rs
//!
//! Mapping between FUSE inode numbers and canonical archive paths.

use rustc_hash::FxHashMap;

/// Inode number of the filesystem root.
pub const ROOT_INO: u64 = 1;

/// Bidirectional inode table for one mount session.
///
/// Inode numbers are assigned lazily the first time a path is seen and
/// stay stable for the lifetime of the table; nothing is ever unlinked, so
/// numbers are never reused.
#[derive(Debug)]
pub struct InodeTable {
    paths: Vec<String>,
    index: FxHashMap<String, u64>,
}

impl InodeTable {
    /// Creates a table holding only the root, at [`ROOT_INO`].
    pub fn new() -> Self {
        let mut index = FxHashMap::default();
        index.insert("/".to_owned(), ROOT_INO);
        Self {
            paths: vec!["/".to_owned()],
            index,
        }
    }

    /// The canonical path behind an inode number, if assigned.
    #[must_use]
    pub fn path(&self, ino: u64) -> Option<&str> {
        let slot = usize::try_from(ino.checked_sub(1)?).ok()?;
        self.paths.get(slot).map(String::as_str)
    }

    /// Returns the inode for `path`, assigning the next free number on
    /// first sight.
    pub fn assign(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.index.get(path) {
            return ino;
        }
        self.paths.push(path.to_owned());
        let ino = self.paths.len() as u64;
        self.index.insert(path.to_owned(), ino);
        ino
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Joins a parent path and a child name into a canonical absolute path.
#[must_use]
pub fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}
