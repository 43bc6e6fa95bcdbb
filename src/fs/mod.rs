//! The filesystem instance and its shared handle.
//!
//! All state lives in [`Fs`]: the inode table, the descriptor table and the
//! current directory. A [`Vfs`] is a cheap, clonable handle to one `Fs`
//! behind a mutex. Every public operation takes the lock exactly once and
//! runs to completion before releasing it, so operations are atomic with
//! respect to each other no matter how many threads share the handle.
//!
//! Internal helpers operate on `&mut Fs` and never lock.

mod data;
mod dir;
mod fd;
mod inode;
mod io;
mod namei;
mod open;
mod path;
mod persist;
mod stat;

pub use inode::InodeId;
pub use io::{Dirent, DirentIter};
pub use stat::{Stat, Statx};

use crate::error::{Error, Result};
use crate::flags::{AT_FDCWD, W_OK, X_OK};
use crate::time::Timespec;
use crate::{FsConfig, TRACING_TARGET};
use dir::Directory;
use fd::FdTable;
use inode::{INode, INodeKind, InodeStore};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Inode id of the root directory.
pub(crate) const ROOT: InodeId = 0;

/// A handle to an in-memory filesystem instance.
///
/// Clones share the instance; [`Vfs::new`] creates an independent one. The
/// handle is `Send + Sync` and can be moved to worker threads freely.
///
/// ```
/// use memvfs::flags::{O_CREAT, O_RDWR};
///
/// let vfs = memvfs::Vfs::new();
/// let fd = vfs.open("/greeting", O_CREAT | O_RDWR, 0o644)?;
/// vfs.write(fd, b"hello")?;
/// assert_eq!(vfs.pread(fd, &mut [0; 5], 0)?, 5);
/// vfs.close(fd)?;
/// # Ok::<(), memvfs::Error>(())
/// ```
#[derive(Clone)]
pub struct Vfs {
    inner: Arc<Mutex<Fs>>,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Vfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.lock(|fs| {
            f.debug_struct("Vfs")
                .field("inodes", &fs.inodes.len())
                .field("open_files", &fs.fds.len())
                .field("cwd", &fs.cwd)
                .finish()
        })
    }
}

impl Vfs {
    /// A fresh instance holding only the root directory.
    pub fn new() -> Self {
        Self::with_config(FsConfig::default())
    }

    pub fn with_config(config: FsConfig) -> Self {
        Self::from_fs(Fs::new(config))
    }

    pub(crate) fn from_fs(fs: Fs) -> Self {
        Vfs {
            inner: Arc::new(Mutex::new(fs)),
        }
    }

    /// Whether two handles refer to the same instance.
    pub fn same_instance(&self, other: &Vfs) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` with exclusive access to the instance.
    ///
    /// A panic while the lock was held cannot leave the tables half-updated
    /// in a way later calls depend on, so a poisoned lock is recovered.
    fn lock<R>(&self, f: impl FnOnce(&mut Fs) -> R) -> R {
        let mut fs = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut fs)
    }

    /// Run one operation under the lock, logging failures.
    pub(crate) fn call<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Fs) -> Result<T>,
    ) -> Result<T> {
        self.lock(f).inspect_err(|err| {
            tracing::trace!(target: TRACING_TARGET, op, errno = err.to_errno(), %err, "failed");
        })
    }
}

/// Filesystem state. Only reachable through a locked [`Vfs`].
pub(crate) struct Fs {
    pub(crate) inodes: InodeStore,
    pub(crate) fds: FdTable,
    pub(crate) cwd: InodeId,
    pub(crate) config: FsConfig,
}

impl Fs {
    pub(crate) fn new(config: FsConfig) -> Self {
        let now = config.clock.now();
        let root = INode::directory(ROOT, ROOT, config.root_mode, now);
        Fs {
            inodes: InodeStore::from_sorted(vec![root]),
            fds: FdTable::default(),
            cwd: ROOT,
            config,
        }
    }

    pub(crate) fn now(&self) -> Timespec {
        self.config.clock.now()
    }

    pub(crate) fn node(&self, id: InodeId) -> Result<&INode> {
        self.inodes.get(id).ok_or(Error::NotFound)
    }

    pub(crate) fn node_mut(&mut self, id: InodeId) -> Result<&mut INode> {
        self.inodes.get_mut(id).ok_or(Error::NotFound)
    }

    pub(crate) fn dir(&self, id: InodeId) -> Result<&Directory> {
        match &self.node(id)?.kind {
            INodeKind::Directory(dir) => Ok(dir),
            _ => Err(Error::NotDirectory),
        }
    }

    pub(crate) fn dir_mut(&mut self, id: InodeId) -> Result<&mut Directory> {
        match &mut self.node_mut(id)?.kind {
            INodeKind::Directory(dir) => Ok(dir),
            _ => Err(Error::NotDirectory),
        }
    }

    /// Fail with `PermissionDenied` unless the owner bits of `id` grant
    /// every bit of `access`.
    pub(crate) fn require(&self, id: InodeId, access: i32) -> Result<()> {
        if self.node(id)?.permits(access) {
            Ok(())
        } else {
            Err(Error::PermissionDenied)
        }
    }

    /// Starting directory for a `*at` call. Absolute paths ignore `dirfd`.
    pub(crate) fn base_for(&self, dirfd: i32, path: &[u8]) -> Result<InodeId> {
        if path.starts_with(b"/") || dirfd == AT_FDCWD {
            return Ok(self.cwd);
        }
        let id = self.fds.get(dirfd)?.inode;
        if !path.is_empty() && !self.node(id)?.is_dir() {
            return Err(Error::NotDirectory);
        }
        Ok(id)
    }

    /// Permission bits for a new inode after the umask.
    pub(crate) fn creation_mode(&self, mode: u32) -> u32 {
        mode & 0o777 & !self.config.umask
    }

    /// Insert `node` and name it `name` in `parent`. Either both happen or
    /// neither does.
    pub(crate) fn create_entry(
        &mut self,
        parent: InodeId,
        name: &[u8],
        node: INode,
    ) -> Result<InodeId> {
        self.require(parent, W_OK | X_OK)?;
        self.require_linked(parent)?;
        self.inodes.reserve()?;
        self.dir_mut(parent)?.reserve()?;
        let id = self.inodes.insert(node)?;
        if let Err(err) = self.dir_mut(parent).and_then(|dir| dir.push(name, id)) {
            self.inodes.remove(id);
            return Err(err);
        }
        Ok(id)
    }

    /// A directory that lost its name takes no new entries.
    pub(crate) fn require_linked(&self, dir: InodeId) -> Result<()> {
        if self.node(dir)?.nlink < 2 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// Stamp mtime and ctime of a directory whose entries changed.
    pub(crate) fn touch_dir(&mut self, id: InodeId, now: Timespec) {
        if let Some(node) = self.inodes.get_mut(id) {
            node.touch_modified(now);
        }
    }

    pub(crate) fn touch_ctime(&mut self, id: InodeId, now: Timespec) {
        if let Some(node) = self.inodes.get_mut(id) {
            node.ctime = now;
        }
    }

    /// Drop `id` once nothing names it and no descriptor holds it.
    pub(crate) fn release_if_unused(&mut self, id: InodeId) {
        let unused = self.inodes.get(id).is_some_and(INode::is_unused);
        if unused && id != ROOT && !self.fds.references(id) {
            self.inodes.remove(id);
            tracing::debug!(target: TRACING_TARGET, inode = id, "inode released");
        }
    }
}
