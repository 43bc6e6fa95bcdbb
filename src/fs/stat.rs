use super::inode::{INode, InodeId};
use super::path::bytes;
use super::{Fs, Vfs};
use crate::error::{Error, Result};
use crate::flags::{
    AT_EMPTY_PATH, AT_FDCWD, AT_SYMLINK_NOFOLLOW, STATX_ATIME, STATX_BLOCKS, STATX_BTIME,
    STATX_CTIME, STATX_INO, STATX_MODE, STATX_MTIME, STATX_NLINK, STATX_SIZE, STATX_SUPPORTED,
    STATX_TYPE, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG,
};
use crate::time::{Timespec, UTIME_NOW, UTIME_OMIT};
use crate::TRACING_TARGET;
use std::path::Path;

/// Preferred I/O size reported by `stat`.
const BLKSIZE: u64 = 4096;

/// Inode attributes, as returned by the `stat` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub ino: InodeId,
    /// Type and permission bits.
    pub mode: u32,
    pub nlink: u64,
    pub size: u64,
    /// Stored bytes in 512-byte units. Holes take none.
    pub blocks: u64,
    pub blksize: u64,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
    pub btime: Timespec,
}

impl Stat {
    fn of(node: &INode) -> Self {
        Stat {
            ino: node.id,
            mode: node.mode,
            nlink: node.nlink,
            size: node.size(),
            blocks: node.stored_bytes().div_ceil(512),
            blksize: BLKSIZE,
            atime: node.atime,
            mtime: node.mtime,
            ctime: node.ctime,
            btime: node.btime,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & S_IFMT == S_IFLNK
    }
}

/// Attributes selected by a `statx` mask. Fields outside `mask` are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statx {
    /// The `STATX_*` bits that were filled in.
    pub mask: u32,
    pub ino: InodeId,
    pub mode: u32,
    pub nlink: u64,
    pub size: u64,
    pub blocks: u64,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
    pub btime: Timespec,
}

impl Statx {
    fn of(node: &INode, want: u32) -> Self {
        let st = Stat::of(node);
        let mask = want & STATX_SUPPORTED;
        let pick = |bit: u32| mask & bit != 0;
        let mut mode = 0;
        if pick(STATX_TYPE) {
            mode |= st.mode & S_IFMT;
        }
        if pick(STATX_MODE) {
            mode |= st.mode & !S_IFMT;
        }
        Statx {
            mask,
            ino: if pick(STATX_INO) { st.ino } else { 0 },
            mode,
            nlink: if pick(STATX_NLINK) { st.nlink } else { 0 },
            size: if pick(STATX_SIZE) { st.size } else { 0 },
            blocks: if pick(STATX_BLOCKS) { st.blocks } else { 0 },
            atime: if pick(STATX_ATIME) { st.atime } else { Timespec::ZERO },
            mtime: if pick(STATX_MTIME) { st.mtime } else { Timespec::ZERO },
            ctime: if pick(STATX_CTIME) { st.ctime } else { Timespec::ZERO },
            btime: if pick(STATX_BTIME) { st.btime } else { Timespec::ZERO },
        }
    }
}

impl Vfs {
    /// Attributes of `path`, following a final symlink.
    pub fn stat<P: AsRef<Path>>(&self, path: P) -> Result<Stat> {
        self.fstatat(AT_FDCWD, path, 0)
    }

    /// Attributes of `path` itself, even if it is a symlink.
    pub fn lstat<P: AsRef<Path>>(&self, path: P) -> Result<Stat> {
        self.fstatat(AT_FDCWD, path, AT_SYMLINK_NOFOLLOW)
    }

    pub fn fstat(&self, fd: i32) -> Result<Stat> {
        self.call("fstat", |fs| {
            let id = fs.fds.get(fd)?.inode;
            Ok(Stat::of(fs.node(id)?))
        })
    }

    /// `stat` relative to `dirfd`. Accepts `AT_SYMLINK_NOFOLLOW` and
    /// `AT_EMPTY_PATH`.
    pub fn fstatat<P: AsRef<Path>>(&self, dirfd: i32, path: P, flags: i32) -> Result<Stat> {
        let path = bytes(path.as_ref());
        self.call("stat", |fs| {
            let id = fs.target(dirfd, path, flags)?;
            Ok(Stat::of(fs.node(id)?))
        })
    }

    /// Selected attributes. Unsupported bits in `mask` are ignored and left
    /// out of the returned mask.
    pub fn statx<P: AsRef<Path>>(
        &self,
        dirfd: i32,
        path: P,
        flags: i32,
        mask: u32,
    ) -> Result<Statx> {
        let path = bytes(path.as_ref());
        self.call("statx", |fs| {
            let id = fs.target(dirfd, path, flags)?;
            Ok(Statx::of(fs.node(id)?, mask))
        })
    }

    /// Replace the permission bits, following symlinks.
    pub fn chmod<P: AsRef<Path>>(&self, path: P, mode: u32) -> Result<()> {
        self.fchmodat(AT_FDCWD, path, mode, 0)
    }

    pub fn fchmod(&self, fd: i32, mode: u32) -> Result<()> {
        self.call("fchmod", |fs| {
            let id = fs.fds.get(fd)?.inode;
            fs.set_mode(id, mode)
        })
    }

    /// Changing the mode of a symlink itself is not supported, so
    /// `AT_SYMLINK_NOFOLLOW` on a symlink fails with `InvalidArgument`.
    pub fn fchmodat<P: AsRef<Path>>(
        &self,
        dirfd: i32,
        path: P,
        mode: u32,
        flags: i32,
    ) -> Result<()> {
        let path = bytes(path.as_ref());
        self.call("chmod", |fs| {
            if flags & !AT_SYMLINK_NOFOLLOW != 0 {
                return Err(Error::InvalidArgument);
            }
            let id = fs.target(dirfd, path, flags)?;
            if fs.node(id)?.is_symlink() {
                return Err(Error::InvalidArgument);
            }
            fs.set_mode(id, mode)
        })
    }

    /// Set access and modification times.
    ///
    /// `None` sets both to now. Each entry may be [`Timespec::now_marker`]
    /// or [`Timespec::omit_marker`]. `ctime` is updated unless both are
    /// omitted.
    pub fn utimensat<P: AsRef<Path>>(
        &self,
        dirfd: i32,
        path: P,
        times: Option<[Timespec; 2]>,
        flags: i32,
    ) -> Result<()> {
        let path = bytes(path.as_ref());
        self.call("utimensat", |fs| {
            let id = fs.target(dirfd, path, flags)?;
            fs.set_times(id, times)
        })
    }

    pub fn futimens(&self, fd: i32, times: Option<[Timespec; 2]>) -> Result<()> {
        self.call("futimens", |fs| {
            let id = fs.fds.get(fd)?.inode;
            fs.set_times(id, times)
        })
    }

    /// Check `R_OK | W_OK | X_OK` against the owner bits, or existence with
    /// `F_OK`.
    pub fn access<P: AsRef<Path>>(&self, path: P, mode: i32) -> Result<()> {
        self.faccessat(AT_FDCWD, path, mode, 0)
    }

    pub fn faccessat<P: AsRef<Path>>(
        &self,
        dirfd: i32,
        path: P,
        mode: i32,
        flags: i32,
    ) -> Result<()> {
        let path = bytes(path.as_ref());
        self.call("access", |fs| {
            if mode & !0o7 != 0 || flags & !(AT_SYMLINK_NOFOLLOW | AT_EMPTY_PATH) != 0 {
                return Err(Error::InvalidArgument);
            }
            let id = fs.target(dirfd, path, flags)?;
            fs.require(id, mode)
        })
    }
}

impl Fs {
    /// Inode named by a `*at` style (dirfd, path, flags) triple.
    fn target(&self, dirfd: i32, path: &[u8], flags: i32) -> Result<InodeId> {
        if flags & !(AT_SYMLINK_NOFOLLOW | AT_EMPTY_PATH) != 0 {
            return Err(Error::InvalidArgument);
        }
        if path.is_empty() && flags & AT_EMPTY_PATH != 0 {
            return if dirfd == AT_FDCWD {
                Ok(self.cwd)
            } else {
                Ok(self.fds.get(dirfd)?.inode)
            };
        }
        let base = self.base_for(dirfd, path)?;
        let follow = flags & AT_SYMLINK_NOFOLLOW == 0;
        self.resolve(base, path, follow)?
            .inode
            .ok_or(Error::NotFound)
    }

    fn set_mode(&mut self, id: InodeId, mode: u32) -> Result<()> {
        let now = self.now();
        let node = self.node_mut(id)?;
        node.mode = (node.mode & S_IFMT) | (mode & 0o777);
        node.ctime = now;
        tracing::debug!(target: TRACING_TARGET, inode = id, mode = node.mode, "chmod");
        Ok(())
    }

    fn set_times(&mut self, id: InodeId, times: Option<[Timespec; 2]>) -> Result<()> {
        let now = self.now();
        let [atime, mtime] = times.unwrap_or([Timespec::now_marker(); 2]);
        if !atime.is_valid_utime() || !mtime.is_valid_utime() {
            return Err(Error::InvalidArgument);
        }
        let resolve = |t: Timespec| match t.nsec {
            UTIME_OMIT => None,
            UTIME_NOW => Some(now),
            _ => Some(t),
        };
        let (atime, mtime) = (resolve(atime), resolve(mtime));
        if atime.is_none() && mtime.is_none() {
            return Ok(());
        }
        let node = self.node_mut(id)?;
        if let Some(atime) = atime {
            node.atime = atime;
        }
        if let Some(mtime) = mtime {
            node.mtime = mtime;
        }
        node.ctime = now;
        tracing::debug!(target: TRACING_TARGET, inode = id, "utimens");
        Ok(())
    }
}
