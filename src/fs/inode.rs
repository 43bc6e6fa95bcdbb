use super::data::RegularData;
use super::dir::Directory;
use crate::error::{Error, Result};
use crate::flags::{S_IFDIR, S_IFLNK, S_IFMT, S_IFREG};
use crate::time::Timespec;

/// Inode number. The root directory is always 0.
pub type InodeId = u64;

/// Symlink payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Symlink {
    /// Path as written by the caller.
    pub(crate) data: Vec<u8>,
    /// Absolute, lexically normalized form of `data` at creation time.
    pub(crate) target: Vec<u8>,
}

#[derive(Debug, Clone)]
pub(crate) enum INodeKind {
    Regular(RegularData),
    Directory(Directory),
    Symlink(Symlink),
}

/// A file, directory or symlink. Names live in directories, not here.
#[derive(Debug, Clone)]
pub(crate) struct INode {
    pub(crate) id: InodeId,
    /// Directory entries naming this inode. For directories this counts `.`
    /// and the `..` of every subdirectory.
    pub(crate) nlink: u64,
    /// Type bits plus permission bits.
    pub(crate) mode: u32,
    pub(crate) btime: Timespec,
    pub(crate) ctime: Timespec,
    pub(crate) mtime: Timespec,
    pub(crate) atime: Timespec,
    pub(crate) kind: INodeKind,
}

impl INode {
    fn with_kind(id: InodeId, mode: u32, nlink: u64, now: Timespec, kind: INodeKind) -> Self {
        INode {
            id,
            nlink,
            mode,
            btime: now,
            ctime: now,
            mtime: now,
            atime: now,
            kind,
        }
    }

    /// A regular file with one link.
    pub(crate) fn regular(id: InodeId, perm: u32, now: Timespec) -> Self {
        Self::with_kind(
            id,
            S_IFREG | (perm & 0o777),
            1,
            now,
            INodeKind::Regular(RegularData::default()),
        )
    }

    /// A directory holding only `.` and `..`.
    pub(crate) fn directory(id: InodeId, parent: InodeId, perm: u32, now: Timespec) -> Self {
        Self::with_kind(
            id,
            S_IFDIR | (perm & 0o777),
            2,
            now,
            INodeKind::Directory(Directory::new(id, parent)),
        )
    }

    pub(crate) fn symlink(id: InodeId, link: Symlink, now: Timespec) -> Self {
        Self::with_kind(id, S_IFLNK | 0o777, 1, now, INodeKind::Symlink(link))
    }

    pub(crate) fn file_type(&self) -> u32 {
        self.mode & S_IFMT
    }

    pub(crate) fn is_dir(&self) -> bool {
        matches!(self.kind, INodeKind::Directory(_))
    }

    pub(crate) fn is_symlink(&self) -> bool {
        matches!(self.kind, INodeKind::Symlink(_))
    }

    pub(crate) fn size(&self) -> u64 {
        match &self.kind {
            INodeKind::Regular(data) => data.size,
            INodeKind::Directory(dir) => dir.size(),
            INodeKind::Symlink(link) => link.data.len() as u64,
        }
    }

    /// Bytes of memory backing the content.
    pub(crate) fn stored_bytes(&self) -> u64 {
        match &self.kind {
            INodeKind::Regular(data) => data.stored_bytes(),
            _ => self.size(),
        }
    }

    /// No directory entry refers to this inode any more.
    pub(crate) fn is_unused(&self) -> bool {
        match self.kind {
            INodeKind::Directory(_) => self.nlink <= 1,
            _ => self.nlink == 0,
        }
    }

    /// Check the owner rwx bits against an `R_OK | W_OK | X_OK` mask.
    pub(crate) fn permits(&self, access: i32) -> bool {
        let bits = (self.mode >> 6) & 0o7;
        bits & (access as u32) == access as u32
    }

    pub(crate) fn touch_modified(&mut self, now: Timespec) {
        self.mtime = now;
        self.ctime = now;
    }
}

/// All inodes, kept sorted by id.
///
/// Ids are dense: a new inode takes the smallest id not in use, so after a
/// removal the next creation fills the gap.
#[derive(Debug, Default)]
pub(crate) struct InodeStore {
    nodes: Vec<INode>,
}

impl InodeStore {
    /// Rebuild from a sorted, id-unique list.
    pub(crate) fn from_sorted(nodes: Vec<INode>) -> Self {
        debug_assert!(nodes.windows(2).all(|w| w[0].id < w[1].id));
        InodeStore { nodes }
    }

    /// Smallest id not currently in use.
    pub(crate) fn next_id(&self) -> InodeId {
        let (mut lo, mut hi) = (0, self.nodes.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.nodes[mid].id == mid as InodeId {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo as InodeId
    }

    pub(crate) fn reserve(&mut self) -> Result<()> {
        self.nodes.try_reserve(1)?;
        Ok(())
    }

    /// Insert a node built with [`InodeStore::next_id`].
    pub(crate) fn insert(&mut self, node: INode) -> Result<InodeId> {
        let slot = match self.slot(node.id) {
            Ok(_) => return Err(Error::Exists),
            Err(slot) => slot,
        };
        self.nodes.try_reserve(1)?;
        let id = node.id;
        self.nodes.insert(slot, node);
        Ok(id)
    }

    /// Position of `id` in the table, which is also its snapshot index.
    pub(crate) fn slot(&self, id: InodeId) -> std::result::Result<usize, usize> {
        self.nodes.binary_search_by_key(&id, |n| n.id)
    }

    pub(crate) fn get(&self, id: InodeId) -> Option<&INode> {
        self.slot(id).ok().map(|slot| &self.nodes[slot])
    }

    pub(crate) fn get_mut(&mut self, id: InodeId) -> Option<&mut INode> {
        self.slot(id).ok().map(|slot| &mut self.nodes[slot])
    }

    pub(crate) fn remove(&mut self, id: InodeId) -> Option<INode> {
        self.slot(id).ok().map(|slot| self.nodes.remove(slot))
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, INode> {
        self.nodes.iter()
    }
}
