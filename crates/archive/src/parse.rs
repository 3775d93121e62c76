//! crates/archive/src/parse.rs
//!
//! Tree builder: folds the flat descriptor sequence into a rooted tree.

use tracing::trace;

use crate::name::{MAP_GROUP_LEN, NameClass, classify};
use crate::tree::{Entry, Tree};

/// A decoded descriptor with a non-empty canonical name, in file order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Descriptor {
    /// Canonical name, pad bytes already stripped.
    pub name: String,
    /// Payload byte offset.
    pub offset: u32,
    /// Payload byte length.
    pub size: u32,
}

/// Builds the entry tree from descriptors in file order.
///
/// Directory markers bracket ordinary directories: a start marker descends
/// into a new directory and pushes the previous namespace onto a stack; an
/// end marker pops it. Unmatched end markers are ignored; unmatched start
/// markers leave their frame open, so later descriptors attach to the
/// deepest live frame.
///
/// A map-group header also descends, but without touching the stack: the
/// group is closed by counting [`MAP_GROUP_LEN`] attached leaves rather
/// than by a marker.
pub fn build_tree(descriptors: &[Descriptor]) -> Tree {
    let mut tree = Tree::new();
    let mut namespace = tree.root();
    let mut stack = Vec::new();
    let mut in_map = false;
    let mut map_elements = 0usize;

    for descriptor in descriptors {
        match classify(&descriptor.name) {
            NameClass::DirStart(dir_name) => {
                let dir = tree.attach(namespace, Entry::directory(dir_name));
                stack.push(namespace);
                namespace = dir;
            }
            NameClass::DirEnd(_) => {
                if let Some(previous) = stack.pop() {
                    namespace = previous;
                }
            }
            NameClass::MapHeader => {
                let map = tree.attach(namespace, Entry::directory(&descriptor.name));
                in_map = true;
                map_elements = 0;
                namespace = map;
            }
            NameClass::Leaf => {
                let leaf = Entry::content(&descriptor.name, descriptor.offset, descriptor.size);
                tree.attach(namespace, leaf);
                if in_map && map_elements < MAP_GROUP_LEN {
                    map_elements += 1;
                    if map_elements == MAP_GROUP_LEN {
                        if let Some(parent) = tree.entry(namespace).parent {
                            namespace = parent;
                        }
                        in_map = false;
                    }
                }
            }
        }
        trace!(name = %descriptor.name, "descriptor consumed");
    }

    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(name: &str) -> Descriptor {
        Descriptor {
            name: name.to_owned(),
            offset: 0,
            size: 0,
        }
    }

    fn leaf(name: &str) -> Descriptor {
        Descriptor {
            name: name.to_owned(),
            offset: 12,
            size: 4,
        }
    }

    #[test]
    fn brackets_nest() {
        let tree = build_tree(&[
            marker("F1_START"),
            marker("F2_START"),
            leaf("DEEP"),
            marker("F2_END"),
            marker("F1_END"),
            leaf("TOP"),
        ]);

        assert!(tree.resolve("/F1/F2/DEEP").is_some());
        assert!(tree.resolve("/TOP").is_some());
        assert!(tree.resolve("/F1/TOP").is_none());
    }

    #[test]
    fn map_group_owns_exactly_ten_leaves() {
        let mut descriptors = vec![marker("E1M1")];
        for i in 0..10 {
            descriptors.push(leaf(&format!("A{i}")));
        }
        descriptors.push(leaf("Z0"));

        let tree = build_tree(&descriptors);

        assert!(tree.resolve("/E1M1/A0").is_some());
        assert!(tree.resolve("/E1M1/A9").is_some());
        assert!(tree.resolve("/Z0").is_some());
        assert!(tree.resolve("/E1M1/Z0").is_none());
    }

    #[test]
    fn unmatched_end_markers_are_ignored() {
        let tree = build_tree(&[marker("F1_END"), leaf("TOP")]);

        assert!(tree.resolve("/TOP").is_some());
    }

    #[test]
    fn unmatched_start_leaves_a_dangling_frame() {
        let tree = build_tree(&[marker("F1_START"), leaf("IN")]);

        // Entries after the dangling start attach to the deepest live frame.
        assert!(tree.resolve("/F1/IN").is_some());
    }

    #[test]
    fn bracket_inside_map_group_keeps_counting() {
        let mut descriptors = vec![marker("E1M1"), leaf("A0"), marker("F1_START")];
        for i in 1..10 {
            descriptors.push(leaf(&format!("A{i}")));
        }
        descriptors.push(leaf("AFTER"));

        let tree = build_tree(&descriptors);

        assert!(tree.resolve("/E1M1/A0").is_some());
        // Leaves attach under the started directory while the counter runs.
        assert!(tree.resolve("/E1M1/F1/A1").is_some());
        assert!(tree.resolve("/E1M1/F1/A9").is_some());
        // The tenth element closes the group relative to the current frame.
        assert!(tree.resolve("/E1M1/AFTER").is_some());
    }
}
