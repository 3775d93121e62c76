//! crates/archive/src/tree.rs
//!
//! The in-memory entry tree and its string-keyed path index.
//!
//! Entries live in a handle-based arena so that children can hold parent
//! back-references without ownership cycles. The path index maps canonical
//! absolute paths to entry handles; the root is keyed exactly `"/"`.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{DenseSlotMap, new_key_type};

use crate::codec::encode_record;
use crate::name::{end_marker, start_marker};

new_key_type! {
    /// Handle of an entry in the tree arena.
    pub struct EntryId;
}

/// Whether an entry is a directory or a content lump.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryKind {
    /// A directory: bracket pair, map group, or the root.
    Directory,
    /// A content leaf referencing payload bytes.
    Content,
}

/// One node of the archive tree.
#[derive(Clone, Debug)]
pub struct Entry {
    /// Canonical name; `"/"` only for the root.
    pub name: String,
    /// Directory or content.
    pub kind: EntryKind,
    /// Payload byte offset; 0 for directories and unwritten files.
    pub offset: u32,
    /// Payload byte length; 0 for directories and unwritten files.
    pub size: u32,
    /// Owning parent, absent only for the root.
    pub parent: Option<EntryId>,
    /// Children in archive order.
    pub children: Vec<EntryId>,
}

impl Entry {
    /// Creates a directory entry with no payload.
    pub fn directory(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: EntryKind::Directory,
            offset: 0,
            size: 0,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Creates a content entry referencing `size` payload bytes at `offset`.
    pub fn content(name: &str, offset: u32, size: u32) -> Self {
        Self {
            name: name.to_owned(),
            kind: EntryKind::Content,
            offset,
            size,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Returns `true` for directory entries.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Strips a single trailing slash from a non-root path.
///
/// `"/F1/"` and `"/F1"` resolve identically; the root stays `"/"`.
#[must_use]
pub fn canonical_path(path: &str) -> &str {
    if path.len() > 1 && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

/// Splits a canonical absolute path into parent path and leaf name.
///
/// Returns `None` for paths without any slash; the leaf of `"/"` is the
/// empty string with parent `"/"`.
#[must_use]
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let slash = path.rfind('/')?;
    let parent = if slash == 0 { "/" } else { &path[..slash] };
    Some((parent, &path[slash + 1..]))
}

/// The rooted entry tree plus the canonical-path index.
#[derive(Debug)]
pub struct Tree {
    entries: DenseSlotMap<EntryId, Entry>,
    root: EntryId,
    index: FxHashMap<String, EntryId>,
}

impl Tree {
    /// Creates a tree holding only the root directory, indexed at `"/"`.
    pub fn new() -> Self {
        let mut entries = DenseSlotMap::with_key();
        let root = entries.insert(Entry::directory("/"));
        let mut index = FxHashMap::default();
        index.insert("/".to_owned(), root);
        Self {
            entries,
            root,
            index,
        }
    }

    /// Handle of the root directory.
    #[must_use]
    pub fn root(&self) -> EntryId {
        self.root
    }

    /// Borrows the entry behind a handle.
    #[must_use]
    pub fn entry(&self, id: EntryId) -> &Entry {
        &self.entries[id]
    }

    /// Mutably borrows the entry behind a handle.
    pub fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        &mut self.entries[id]
    }

    /// Resolves a path to an entry handle after canonicalization.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<EntryId> {
        self.index.get(canonical_path(path)).copied()
    }

    /// Attaches `entry` as the last child of `parent` and indexes its
    /// canonical absolute path. Duplicate paths overwrite the index slot;
    /// the last attachment wins, matching how malformed archives are
    /// tolerated.
    pub fn attach(&mut self, parent: EntryId, mut entry: Entry) -> EntryId {
        entry.parent = Some(parent);
        let id = self.entries.insert(entry);
        self.entries[parent].children.push(id);
        let path = self.full_path(id);
        self.index.insert(path, id);
        id
    }

    /// Computes the canonical absolute path of an entry by joining ancestor
    /// names from the root. A visited set short-circuits if a parent chain
    /// ever revisits a node; a well-formed tree cannot cycle.
    #[must_use]
    pub fn full_path(&self, id: EntryId) -> String {
        let entry = &self.entries[id];
        if entry.parent.is_none() {
            return "/".to_owned();
        }

        let mut path = entry.name.clone();
        let mut current = entry.parent;
        let mut visited = FxHashSet::default();
        while let Some(ancestor) = current {
            let node = &self.entries[ancestor];
            if node.parent.is_none() {
                break;
            }
            if !visited.insert(ancestor) {
                break;
            }
            path = format!("{}/{}", node.name, path);
            current = node.parent;
        }
        format!("/{path}")
    }

    /// Child canonical names of a directory, in archive order.
    #[must_use]
    pub fn child_names(&self, id: EntryId) -> Vec<String> {
        self.entries[id]
            .children
            .iter()
            .map(|&child| self.entries[child].name.clone())
            .collect()
    }

    /// Re-serializes the whole descriptor table from the tree into `out`.
    ///
    /// Every non-root directory is emitted as a `<name>_START` record, its
    /// children in order, then `<name>_END`; content entries emit a single
    /// record with their current offset and size. The root emits no
    /// markers. Map groups come out bracketed like ordinary directories,
    /// which changes their on-disk shape the first time a table is
    /// rewritten.
    pub fn serialize_table(&self, out: &mut Vec<u8>) {
        self.serialize_subtree(self.root, out);
    }

    fn serialize_subtree(&self, id: EntryId, out: &mut Vec<u8>) {
        let entry = &self.entries[id];
        match entry.kind {
            EntryKind::Directory => {
                let is_root = entry.parent.is_none();
                if !is_root {
                    encode_record(0, 0, &start_marker(&entry.name), out);
                }
                for &child in &entry.children {
                    self.serialize_subtree(child, out);
                }
                if !is_root {
                    encode_record(0, 0, &end_marker(&entry.name), out);
                }
            }
            EntryKind::Content => encode_record(entry.offset, entry.size, &entry.name, out),
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}
