//! Namespace operations: creating, linking, removing and renaming entries.

use super::dir::{is_dot, is_in_self};
use super::inode::{INode, INodeKind, Symlink};
use super::path::{bytes, normalize, to_path_buf, Lookup};
use super::{Fs, Vfs, ROOT};
use crate::error::{Error, Result};
use crate::flags::{
    AT_EMPTY_PATH, AT_FDCWD, AT_REMOVEDIR, AT_SYMLINK_FOLLOW, PATH_MAX, RENAME_EXCHANGE,
    RENAME_NOREPLACE, W_OK, X_OK,
};
use crate::TRACING_TARGET;
use std::path::{Path, PathBuf};

impl Vfs {
    pub fn mkdir<P: AsRef<Path>>(&self, path: P, mode: u32) -> Result<()> {
        self.mkdirat(AT_FDCWD, path, mode)
    }

    /// Create a directory. The new directory counts toward its parent's link
    /// count through its `..` entry.
    pub fn mkdirat<P: AsRef<Path>>(&self, dirfd: i32, path: P, mode: u32) -> Result<()> {
        let path = bytes(path.as_ref());
        self.call("mkdir", |fs| fs.mkdir(dirfd, path, mode))
    }

    /// Remove an empty directory.
    pub fn rmdir<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = bytes(path.as_ref());
        self.call("rmdir", |fs| fs.rmdir(AT_FDCWD, path))
    }

    /// Remove a name. The inode lives on while descriptors still refer to
    /// it.
    pub fn unlink<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.unlinkat(AT_FDCWD, path, 0)
    }

    /// `unlink`, or `rmdir` with `AT_REMOVEDIR`.
    pub fn unlinkat<P: AsRef<Path>>(&self, dirfd: i32, path: P, flags: i32) -> Result<()> {
        let path = bytes(path.as_ref());
        self.call("unlink", |fs| match flags {
            0 => fs.unlink(dirfd, path),
            AT_REMOVEDIR => fs.rmdir(dirfd, path),
            _ => Err(Error::InvalidArgument),
        })
    }

    /// Add a hard link. Directories cannot be linked.
    pub fn link<P: AsRef<Path>, Q: AsRef<Path>>(&self, original: P, link: Q) -> Result<()> {
        self.linkat(AT_FDCWD, original, AT_FDCWD, link, 0)
    }

    /// Add a hard link between two `*at` locations.
    ///
    /// With `AT_EMPTY_PATH` and an empty `oldpath` the inode open at
    /// `olddirfd` is linked; this is how an `O_TMPFILE` file gets a name.
    /// `AT_SYMLINK_FOLLOW` links the target of a final symlink instead of
    /// the symlink.
    pub fn linkat<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        olddirfd: i32,
        oldpath: P,
        newdirfd: i32,
        newpath: Q,
        flags: i32,
    ) -> Result<()> {
        let (old, new) = (bytes(oldpath.as_ref()), bytes(newpath.as_ref()));
        self.call("link", |fs| fs.link(olddirfd, old, newdirfd, new, flags))
    }

    /// Create a symlink at `link` holding `target` verbatim.
    pub fn symlink<P: AsRef<Path>, Q: AsRef<Path>>(&self, target: P, link: Q) -> Result<()> {
        self.symlinkat(target, AT_FDCWD, link)
    }

    pub fn symlinkat<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        target: P,
        newdirfd: i32,
        link: Q,
    ) -> Result<()> {
        let (target, link) = (bytes(target.as_ref()), bytes(link.as_ref()));
        self.call("symlink", |fs| fs.symlink(target, newdirfd, link))
    }

    /// Contents of a symlink, exactly as written.
    pub fn readlink<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        self.readlinkat(AT_FDCWD, path)
    }

    pub fn readlinkat<P: AsRef<Path>>(&self, dirfd: i32, path: P) -> Result<PathBuf> {
        let path = bytes(path.as_ref());
        self.call("readlink", |fs| {
            let base = fs.base_for(dirfd, path)?;
            let id = fs.resolve(base, path, false)?.inode.ok_or(Error::NotFound)?;
            match &fs.node(id)?.kind {
                INodeKind::Symlink(link) => Ok(to_path_buf(link.data.clone())),
                _ => Err(Error::InvalidArgument),
            }
        })
    }

    pub fn rename<P: AsRef<Path>, Q: AsRef<Path>>(&self, from: P, to: Q) -> Result<()> {
        self.renameat2(AT_FDCWD, from, AT_FDCWD, to, 0)
    }

    pub fn renameat<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        olddirfd: i32,
        oldpath: P,
        newdirfd: i32,
        newpath: Q,
    ) -> Result<()> {
        self.renameat2(olddirfd, oldpath, newdirfd, newpath, 0)
    }

    /// Move an entry, atomically replacing any destination.
    ///
    /// `RENAME_NOREPLACE` fails with [`Error::Exists`] instead of replacing.
    /// `RENAME_EXCHANGE` swaps two existing entries. The two flags are
    /// mutually exclusive.
    pub fn renameat2<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        olddirfd: i32,
        oldpath: P,
        newdirfd: i32,
        newpath: Q,
        flags: u32,
    ) -> Result<()> {
        let (old, new) = (bytes(oldpath.as_ref()), bytes(newpath.as_ref()));
        self.call("rename", |fs| fs.rename(olddirfd, old, newdirfd, new, flags))
    }
}

impl Fs {
    fn mkdir(&mut self, dirfd: i32, path: &[u8], mode: u32) -> Result<()> {
        let base = self.base_for(dirfd, path)?;
        let lookup = self.resolve(base, path, false)?;
        if lookup.inode.is_some() {
            return Err(Error::Exists);
        }
        let now = self.now();
        let node = INode::directory(
            self.inodes.next_id(),
            lookup.parent,
            self.creation_mode(mode),
            now,
        );
        let id = self.create_entry(lookup.parent, &lookup.name, node)?;
        let parent = self.node_mut(lookup.parent)?;
        parent.nlink += 1;
        parent.touch_modified(now);
        tracing::debug!(
            target: TRACING_TARGET,
            inode = id,
            parent = lookup.parent,
            path = %String::from_utf8_lossy(path),
            "mkdir"
        );
        Ok(())
    }

    fn rmdir(&mut self, dirfd: i32, path: &[u8]) -> Result<()> {
        let base = self.base_for(dirfd, path)?;
        let lookup = self.resolve(base, path, false)?;
        let id = lookup.inode.ok_or(Error::NotFound)?;
        if id == ROOT {
            return Err(Error::Busy);
        }
        match lookup.name.as_slice() {
            b"." => return Err(Error::InvalidArgument),
            b".." => return Err(Error::NotEmpty),
            _ => {}
        }
        if !self.dir(id)?.is_empty() {
            return Err(Error::NotEmpty);
        }
        if id == self.cwd || self.fds.references(id) {
            return Err(Error::Busy);
        }
        self.require(lookup.parent, W_OK | X_OK)?;

        let now = self.now();
        self.dir_mut(lookup.parent)?.remove(&lookup.name);
        let parent = self.node_mut(lookup.parent)?;
        parent.nlink -= 1;
        parent.touch_modified(now);
        let node = self.node_mut(id)?;
        node.nlink -= 1;
        node.ctime = now;
        tracing::debug!(target: TRACING_TARGET, inode = id, "rmdir");
        self.release_if_unused(id);
        Ok(())
    }

    fn unlink(&mut self, dirfd: i32, path: &[u8]) -> Result<()> {
        let base = self.base_for(dirfd, path)?;
        let lookup = self.resolve(base, path, false)?;
        let id = lookup.inode.ok_or(Error::NotFound)?;
        if is_dot(&lookup.name) || self.node(id)?.is_dir() {
            return Err(Error::IsDirectory);
        }
        self.require(lookup.parent, W_OK | X_OK)?;

        let now = self.now();
        self.dir_mut(lookup.parent)?.remove(&lookup.name);
        self.touch_dir(lookup.parent, now);
        let node = self.node_mut(id)?;
        node.nlink -= 1;
        node.ctime = now;
        let nlink = node.nlink;
        tracing::debug!(target: TRACING_TARGET, inode = id, nlink, "unlink");
        self.release_if_unused(id);
        Ok(())
    }

    fn link(
        &mut self,
        olddirfd: i32,
        oldpath: &[u8],
        newdirfd: i32,
        newpath: &[u8],
        flags: i32,
    ) -> Result<()> {
        if flags & !(AT_SYMLINK_FOLLOW | AT_EMPTY_PATH) != 0 {
            return Err(Error::InvalidArgument);
        }

        let src = if oldpath.is_empty() && flags & AT_EMPTY_PATH != 0 {
            if olddirfd == AT_FDCWD {
                self.cwd
            } else {
                let file = self.fds.get(olddirfd)?;
                if !file.linkable() && self.node(file.inode)?.nlink == 0 {
                    return Err(Error::NotFound);
                }
                file.inode
            }
        } else {
            let base = self.base_for(olddirfd, oldpath)?;
            let follow = flags & AT_SYMLINK_FOLLOW != 0;
            let id = self.resolve(base, oldpath, follow)?.inode.ok_or(Error::NotFound)?;
            if self.node(id)?.nlink == 0 {
                return Err(Error::NotFound);
            }
            id
        };
        if self.node(src)?.is_dir() {
            return Err(Error::NotPermitted);
        }

        let base = self.base_for(newdirfd, newpath)?;
        let dest = self.resolve(base, newpath, false)?;
        if dest.inode.is_some() {
            return Err(Error::Exists);
        }
        if dest.trailing_slash {
            return Err(Error::NotFound);
        }
        self.require(dest.parent, W_OK | X_OK)?;
        self.require_linked(dest.parent)?;

        let now = self.now();
        self.dir_mut(dest.parent)?.push(&dest.name, src)?;
        self.touch_dir(dest.parent, now);
        let node = self.node_mut(src)?;
        node.nlink += 1;
        node.ctime = now;
        tracing::debug!(target: TRACING_TARGET, inode = src, nlink = node.nlink, "link");
        Ok(())
    }

    fn symlink(&mut self, target: &[u8], newdirfd: i32, linkpath: &[u8]) -> Result<()> {
        if target.is_empty() {
            return Err(Error::NotFound);
        }
        if target.len() >= PATH_MAX {
            return Err(Error::NameTooLong);
        }
        if target.contains(&0) {
            return Err(Error::InvalidArgument);
        }
        let base = self.base_for(newdirfd, linkpath)?;
        let lookup = self.resolve(base, linkpath, false)?;
        if lookup.inode.is_some() {
            return Err(Error::Exists);
        }
        if lookup.trailing_slash {
            return Err(Error::NotFound);
        }

        let now = self.now();
        let parent_path = self.dir_path(lookup.parent)?;
        let link = Symlink {
            data: target.to_vec(),
            target: normalize(&parent_path, target),
        };
        let node = INode::symlink(self.inodes.next_id(), link, now);
        let id = self.create_entry(lookup.parent, &lookup.name, node)?;
        self.touch_dir(lookup.parent, now);
        tracing::debug!(
            target: TRACING_TARGET,
            inode = id,
            target = %String::from_utf8_lossy(target),
            "symlink"
        );
        Ok(())
    }

    fn rename(
        &mut self,
        olddirfd: i32,
        oldpath: &[u8],
        newdirfd: i32,
        newpath: &[u8],
        flags: u32,
    ) -> Result<()> {
        if flags & !(RENAME_NOREPLACE | RENAME_EXCHANGE) != 0
            || flags == RENAME_NOREPLACE | RENAME_EXCHANGE
        {
            return Err(Error::InvalidArgument);
        }
        let old_base = self.base_for(olddirfd, oldpath)?;
        let new_base = self.base_for(newdirfd, newpath)?;
        let old = self.resolve(old_base, oldpath, false)?;
        let new = self.resolve(new_base, newpath, false)?;

        let src = old.inode.ok_or(Error::NotFound)?;
        if is_dot(&old.name) || is_dot(&new.name) || src == ROOT || src == self.cwd {
            return Err(Error::Busy);
        }
        match new.inode {
            Some(_) if flags & RENAME_NOREPLACE != 0 => return Err(Error::Exists),
            None if flags & RENAME_EXCHANGE != 0 => return Err(Error::NotFound),
            _ => {}
        }
        self.require(old.parent, W_OK | X_OK)?;
        self.require(new.parent, W_OK | X_OK)?;
        self.require_linked(new.parent)?;

        if flags & RENAME_EXCHANGE != 0 {
            return self.exchange(&old, &new);
        }

        let src_is_dir = self.node(src)?.is_dir();
        if let Some(dst) = new.inode {
            if dst == src {
                return Ok(());
            }
            if dst == ROOT || dst == self.cwd {
                return Err(Error::Busy);
            }
            let dst_is_dir = self.node(dst)?.is_dir();
            if src_is_dir && !dst_is_dir {
                return Err(Error::NotDirectory);
            }
            if !src_is_dir && dst_is_dir {
                return Err(Error::IsDirectory);
            }
            if dst_is_dir && !self.dir(dst)?.is_empty() {
                return Err(Error::NotEmpty);
            }
            if dst_is_dir && self.fds.references(dst) {
                return Err(Error::Busy);
            }
        } else if new.trailing_slash && !src_is_dir {
            return Err(Error::NotDirectory);
        }
        if src_is_dir && is_in_self(&self.inodes, ROOT, src, new.parent) {
            return Err(Error::InvalidArgument);
        }

        // Only the push below can fail from here on.
        let now = self.now();
        match new.inode {
            Some(dst) => {
                self.dir_mut(new.parent)?.replace(&new.name, src);
                let dst_is_dir = {
                    let node = self.node_mut(dst)?;
                    node.nlink -= 1;
                    node.ctime = now;
                    node.is_dir()
                };
                if dst_is_dir {
                    self.node_mut(new.parent)?.nlink -= 1;
                }
            }
            None => self.dir_mut(new.parent)?.push(&new.name, src)?,
        }
        self.dir_mut(old.parent)?.remove(&old.name);

        if src_is_dir && old.parent != new.parent {
            self.dir_mut(src)?.set_parent(new.parent);
            self.node_mut(old.parent)?.nlink -= 1;
            self.node_mut(new.parent)?.nlink += 1;
        }
        self.touch_ctime(src, now);
        self.touch_dir(old.parent, now);
        self.touch_dir(new.parent, now);
        tracing::debug!(
            target: TRACING_TARGET,
            inode = src,
            from = old.parent,
            to = new.parent,
            replaced = ?new.inode,
            "rename"
        );
        if let Some(dst) = new.inode {
            self.release_if_unused(dst);
        }
        Ok(())
    }

    /// Swap two existing entries, fixing `..` and link counts when
    /// directories change parents.
    fn exchange(&mut self, old: &Lookup, new: &Lookup) -> Result<()> {
        let (a, b) = match (old.inode, new.inode) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(Error::NotFound),
        };
        if a == b {
            return Ok(());
        }
        if b == ROOT || b == self.cwd {
            return Err(Error::Busy);
        }
        let a_is_dir = self.node(a)?.is_dir();
        let b_is_dir = self.node(b)?.is_dir();
        if (a_is_dir && is_in_self(&self.inodes, ROOT, a, new.parent))
            || (b_is_dir && is_in_self(&self.inodes, ROOT, b, old.parent))
        {
            return Err(Error::InvalidArgument);
        }

        let now = self.now();
        self.dir_mut(old.parent)?.replace(&old.name, b);
        self.dir_mut(new.parent)?.replace(&new.name, a);
        if old.parent != new.parent {
            if a_is_dir {
                self.dir_mut(a)?.set_parent(new.parent);
                self.node_mut(old.parent)?.nlink -= 1;
                self.node_mut(new.parent)?.nlink += 1;
            }
            if b_is_dir {
                self.dir_mut(b)?.set_parent(old.parent);
                self.node_mut(new.parent)?.nlink -= 1;
                self.node_mut(old.parent)?.nlink += 1;
            }
        }
        self.touch_ctime(a, now);
        self.touch_ctime(b, now);
        self.touch_dir(old.parent, now);
        self.touch_dir(new.parent, now);
        tracing::debug!(target: TRACING_TARGET, a, b, "rename exchange");
        Ok(())
    }
}
