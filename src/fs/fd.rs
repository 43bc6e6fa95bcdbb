use super::inode::InodeId;
use crate::error::{Error, Result};
use crate::flags::{
    O_ACCMODE, O_APPEND, O_EXCL, O_NOATIME, O_RDONLY, O_RDWR, O_TMPFILE, O_WRONLY,
};

/// An open file description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpenFile {
    pub(crate) fd: i32,
    pub(crate) inode: InodeId,
    pub(crate) flags: i32,
    /// Byte offset for files, entry index for directories.
    pub(crate) pos: u64,
}

impl OpenFile {
    pub(crate) fn readable(&self) -> bool {
        matches!(self.flags & O_ACCMODE, O_RDONLY | O_RDWR)
    }

    pub(crate) fn writable(&self) -> bool {
        matches!(self.flags & O_ACCMODE, O_WRONLY | O_RDWR)
    }

    pub(crate) fn append(&self) -> bool {
        self.flags & O_APPEND != 0
    }

    pub(crate) fn noatime(&self) -> bool {
        self.flags & O_NOATIME != 0
    }

    /// An unnamed file opened with `O_TMPFILE` and without `O_EXCL` may be
    /// given a name.
    pub(crate) fn linkable(&self) -> bool {
        self.flags & O_TMPFILE == O_TMPFILE && self.flags & O_EXCL == 0
    }
}

/// Open descriptors sorted by fd. New descriptors take the lowest free
/// number, starting at 0.
#[derive(Debug, Default)]
pub(crate) struct FdTable {
    files: Vec<OpenFile>,
}

impl FdTable {
    fn next_fd(&self) -> i32 {
        let (mut lo, mut hi) = (0, self.files.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.files[mid].fd == mid as i32 {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo as i32
    }

    fn slot(&self, fd: i32) -> Result<usize> {
        self.files
            .binary_search_by_key(&fd, |f| f.fd)
            .map_err(|_| Error::BadDescriptor)
    }

    pub(crate) fn reserve(&mut self) -> Result<()> {
        self.files.try_reserve(1)?;
        Ok(())
    }

    pub(crate) fn insert(&mut self, inode: InodeId, flags: i32, pos: u64) -> Result<i32> {
        let fd = self.next_fd();
        self.files.try_reserve(1)?;
        self.files.insert(
            fd as usize,
            OpenFile {
                fd,
                inode,
                flags,
                pos,
            },
        );
        Ok(fd)
    }

    pub(crate) fn get(&self, fd: i32) -> Result<&OpenFile> {
        let slot = self.slot(fd)?;
        Ok(&self.files[slot])
    }

    pub(crate) fn get_mut(&mut self, fd: i32) -> Result<&mut OpenFile> {
        let slot = self.slot(fd)?;
        Ok(&mut self.files[slot])
    }

    pub(crate) fn remove(&mut self, fd: i32) -> Result<OpenFile> {
        let slot = self.slot(fd)?;
        Ok(self.files.remove(slot))
    }

    /// Whether any descriptor refers to `inode`.
    pub(crate) fn references(&self, inode: InodeId) -> bool {
        self.files.iter().any(|f| f.inode == inode)
    }

    pub(crate) fn len(&self) -> usize {
        self.files.len()
    }
}
