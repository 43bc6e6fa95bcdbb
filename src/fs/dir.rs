use super::inode::{INodeKind, InodeId, InodeStore};
use crate::error::{Error, Result};
use indexmap::IndexMap;

/// Entries of a directory in insertion order.
///
/// Slot 0 is always `.` and slot 1 always `..`. `size` is the total length
/// of all names, both of those included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Directory {
    entries: IndexMap<Vec<u8>, InodeId>,
    size: u64,
}

pub(crate) fn is_dot(name: &[u8]) -> bool {
    name == b"." || name == b".."
}

impl Directory {
    pub(crate) fn new(id: InodeId, parent: InodeId) -> Self {
        let mut entries = IndexMap::with_capacity(2);
        entries.insert(b".".to_vec(), id);
        entries.insert(b"..".to_vec(), parent);
        Directory { entries, size: 3 }
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn parent(&self) -> InodeId {
        self.entries[1]
    }

    pub(crate) fn set_parent(&mut self, parent: InodeId) {
        self.entries[1] = parent;
    }

    pub(crate) fn lookup(&self, name: &[u8]) -> Option<InodeId> {
        self.entries.get(name).copied()
    }

    /// Make room for one more entry without inserting it.
    pub(crate) fn reserve(&mut self) -> Result<()> {
        self.entries
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory)
    }

    /// Append an entry. The name must not already be present.
    pub(crate) fn push(&mut self, name: &[u8], id: InodeId) -> Result<()> {
        debug_assert!(!self.entries.contains_key(name));
        self.reserve()?;
        self.entries.insert(name.to_vec(), id);
        self.size += name.len() as u64;
        Ok(())
    }

    /// Point an existing entry at another inode, keeping its slot.
    pub(crate) fn replace(&mut self, name: &[u8], id: InodeId) -> Option<InodeId> {
        self.entries
            .get_mut(name)
            .map(|slot| std::mem::replace(slot, id))
    }

    /// Remove an entry, keeping the order of the rest.
    pub(crate) fn remove(&mut self, name: &[u8]) -> Option<InodeId> {
        if is_dot(name) {
            return None;
        }
        let id = self.entries.shift_remove(name)?;
        self.size -= name.len() as u64;
        Some(id)
    }

    /// Only `.` and `..` remain.
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.len() <= 2
    }

    /// Entry count, `.` and `..` included.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entry_at(&self, index: usize) -> Option<(&[u8], InodeId)> {
        self.entries
            .get_index(index)
            .map(|(name, id)| (name.as_slice(), *id))
    }

    /// Entries other than `.` and `..`.
    pub(crate) fn children(&self) -> impl Iterator<Item = (&[u8], InodeId)> + '_ {
        self.entries
            .iter()
            .skip(2)
            .map(|(name, id)| (name.as_slice(), *id))
    }

    /// Name under which `id` appears, if it does.
    pub(crate) fn name_of(&self, id: InodeId) -> Option<&[u8]> {
        self.children()
            .find(|(_, child)| *child == id)
            .map(|(name, _)| name)
    }
}

/// Whether `candidate` is `dir` or lies beneath it.
///
/// Walks `..` upward from `candidate`; the walk is bounded by the inode count
/// so a damaged parent chain cannot spin forever.
pub(crate) fn is_in_self(
    inodes: &InodeStore,
    root: InodeId,
    dir: InodeId,
    candidate: InodeId,
) -> bool {
    let mut cur = candidate;
    for _ in 0..=inodes.len() {
        if cur == dir {
            return true;
        }
        if cur == root {
            return false;
        }
        match inodes.get(cur).map(|n| &n.kind) {
            Some(INodeKind::Directory(d)) => cur = d.parent(),
            _ => return false,
        }
    }
    false
}
