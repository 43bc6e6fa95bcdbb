use super::inode::{INode, INodeKind, InodeId};
use super::path::bytes;
use super::{Fs, Vfs};
use crate::error::{Error, Result};
use crate::flags::{
    AT_FDCWD, O_ACCMODE, O_CREAT, O_DIRECTORY, O_EXCL, O_NOFOLLOW, O_RDONLY, O_RDWR, O_TMPFILE,
    O_TRUNC, O_VALID, O_WRONLY, R_OK, W_OK, X_OK,
};
use crate::TRACING_TARGET;
use std::path::Path;

impl Vfs {
    /// Open `path` relative to the current directory.
    ///
    /// `mode` is only used when the call creates a file.
    pub fn open<P: AsRef<Path>>(&self, path: P, flags: i32, mode: u32) -> Result<i32> {
        self.openat(AT_FDCWD, path, flags, mode)
    }

    /// Open `path` relative to the directory open at `dirfd`.
    pub fn openat<P: AsRef<Path>>(
        &self,
        dirfd: i32,
        path: P,
        flags: i32,
        mode: u32,
    ) -> Result<i32> {
        let path = bytes(path.as_ref());
        self.call("open", |fs| fs.open(dirfd, path, flags, mode))
    }

    /// Shorthand for `open(path, O_CREAT | O_WRONLY | O_TRUNC, mode)`.
    pub fn creat<P: AsRef<Path>>(&self, path: P, mode: u32) -> Result<i32> {
        self.open(path, O_CREAT | O_WRONLY | O_TRUNC, mode)
    }

    /// Close `fd`. The inode goes away here if it was the last reference to
    /// an unlinked file.
    pub fn close(&self, fd: i32) -> Result<()> {
        self.call("close", |fs| fs.close(fd))
    }

    /// Open another descriptor on the same inode with the lowest free number.
    ///
    /// The new descriptor starts at the same offset but keeps its own
    /// cursor afterwards.
    pub fn dup(&self, fd: i32) -> Result<i32> {
        self.call("dup", |fs| {
            let file = fs.fds.get(fd)?.clone();
            let new = fs.fds.insert(file.inode, file.flags, file.pos)?;
            tracing::debug!(target: TRACING_TARGET, fd, new, "dup");
            Ok(new)
        })
    }
}

impl Fs {
    fn open(&mut self, dirfd: i32, path: &[u8], flags: i32, mode: u32) -> Result<i32> {
        if flags & !O_VALID != 0 || flags & O_ACCMODE == O_ACCMODE {
            return Err(Error::InvalidArgument);
        }
        let base = self.base_for(dirfd, path)?;
        if flags & O_TMPFILE == O_TMPFILE {
            return self.open_tmpfile(base, path, flags, mode);
        }

        let exclusive = flags & (O_CREAT | O_EXCL) == (O_CREAT | O_EXCL);
        let follow = flags & O_NOFOLLOW == 0 && !exclusive;
        let lookup = self.resolve(base, path, follow)?;
        self.fds.reserve()?;

        let (id, created) = match lookup.inode {
            Some(_) if exclusive => return Err(Error::Exists),
            Some(id) => {
                self.check_open_existing(id, flags)?;
                (id, false)
            }
            None if flags & O_CREAT == 0 => return Err(Error::NotFound),
            None if lookup.trailing_slash => return Err(Error::IsDirectory),
            None if flags & O_DIRECTORY != 0 => return Err(Error::InvalidArgument),
            None => {
                let mode = self.creation_mode(mode);
                let node = INode::regular(self.inodes.next_id(), mode, self.now());
                let id = self.create_entry(lookup.parent, &lookup.name, node)?;
                let now = self.now();
                self.touch_dir(lookup.parent, now);
                (id, true)
            }
        };

        if !created && flags & O_TRUNC != 0 && flags & O_ACCMODE != O_RDONLY {
            let now = self.now();
            let node = self.node_mut(id)?;
            if let INodeKind::Regular(data) = &mut node.kind {
                if data.size != 0 {
                    data.truncate(0);
                    node.touch_modified(now);
                }
            }
        }

        let fd = self.fds.insert(id, flags, 0)?;
        tracing::debug!(
            target: TRACING_TARGET,
            fd,
            inode = id,
            flags,
            created,
            path = %String::from_utf8_lossy(path),
            "open"
        );
        Ok(fd)
    }

    fn check_open_existing(&self, id: InodeId, flags: i32) -> Result<()> {
        let node = self.node(id)?;
        let access = match flags & O_ACCMODE {
            O_RDONLY => R_OK,
            O_WRONLY => W_OK,
            _ => R_OK | W_OK,
        };
        match node.kind {
            INodeKind::Symlink(_) => return Err(Error::Loop),
            INodeKind::Directory(_) => {
                if flags & O_ACCMODE != O_RDONLY || flags & O_CREAT != 0 {
                    return Err(Error::IsDirectory);
                }
            }
            INodeKind::Regular(_) => {
                if flags & O_DIRECTORY != 0 {
                    return Err(Error::NotDirectory);
                }
            }
        }
        if !node.permits(access) {
            return Err(Error::PermissionDenied);
        }
        Ok(())
    }

    /// An unnamed regular file in the directory `path`. Its only reference
    /// is the returned descriptor until `linkat` gives it a name.
    fn open_tmpfile(&mut self, base: InodeId, path: &[u8], flags: i32, mode: u32) -> Result<i32> {
        if !matches!(flags & O_ACCMODE, O_WRONLY | O_RDWR) || flags & O_CREAT != 0 {
            return Err(Error::InvalidArgument);
        }
        let lookup = self.resolve(base, path, true)?;
        let dir = lookup.inode.ok_or(Error::NotFound)?;
        if !self.node(dir)?.is_dir() {
            return Err(Error::NotDirectory);
        }
        self.require(dir, W_OK | X_OK)?;
        self.fds.reserve()?;
        self.inodes.reserve()?;

        let mut node = INode::regular(self.inodes.next_id(), self.creation_mode(mode), self.now());
        node.nlink = 0;
        let id = self.inodes.insert(node)?;
        let fd = self.fds.insert(id, flags, 0)?;
        tracing::debug!(target: TRACING_TARGET, fd, inode = id, "open tmpfile");
        Ok(fd)
    }

    fn close(&mut self, fd: i32) -> Result<()> {
        let file = self.fds.remove(fd)?;
        tracing::debug!(target: TRACING_TARGET, fd, inode = file.inode, "close");
        self.release_if_unused(file.inode);
        Ok(())
    }
}
