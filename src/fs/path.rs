//! Path resolution and the current directory.
//!
//! Paths are raw bytes split on `/`; empty components are skipped, so
//! `a//b` and `a/b` name the same thing. `.` and `..` are ordinary directory
//! entries. Searching a directory needs its owner `x` bit.

use super::inode::{INodeKind, InodeId};
use super::{Fs, Vfs, ROOT};
use crate::error::{Error, Result};
use crate::flags::{MAX_SYMLINK_DEPTH, NAME_MAX, PATH_MAX, X_OK};
use crate::TRACING_TARGET;
use std::ffi::OsString;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

/// Raw bytes of a path.
pub(crate) fn bytes(path: &Path) -> &[u8] {
    path.as_os_str().as_bytes()
}

pub(crate) fn to_path_buf(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(OsString::from_vec(bytes))
}

/// Result of resolving a path down to its final component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Lookup {
    /// Directory holding the final component.
    pub(crate) parent: InodeId,
    /// Final component. `.` when the path names a directory with no
    /// components left (such as `/`).
    pub(crate) name: Vec<u8>,
    /// Inode the final component refers to, if it exists.
    pub(crate) inode: Option<InodeId>,
    /// The path ended with `/`, so the result must be a directory.
    pub(crate) trailing_slash: bool,
}

/// Lexically normalize `path` against the absolute directory `base`.
///
/// `.` components vanish and `..` drops the previous component (never
/// climbing above `/`). The filesystem is not consulted.
pub(crate) fn normalize(base: &[u8], path: &[u8]) -> Vec<u8> {
    let mut stack: Vec<&[u8]> = Vec::new();
    let start: &[u8] = if path.starts_with(b"/") { b"" } else { base };
    for component in start.split(|&b| b == b'/').chain(path.split(|&b| b == b'/')) {
        match component {
            b"" | b"." => {}
            b".." => {
                stack.pop();
            }
            name => stack.push(name),
        }
    }
    if stack.is_empty() {
        return b"/".to_vec();
    }
    let mut out = Vec::with_capacity(path.len() + base.len() + 1);
    for name in stack {
        out.push(b'/');
        out.extend_from_slice(name);
    }
    out
}

impl Vfs {
    /// Change the current directory.
    pub fn chdir<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = bytes(path.as_ref());
        self.call("chdir", |fs| fs.chdir(path))
    }

    /// Change the current directory to the directory open at `fd`.
    pub fn fchdir(&self, fd: i32) -> Result<()> {
        self.call("fchdir", |fs| {
            let id = fs.fds.get(fd)?.inode;
            fs.enter_dir(id)
        })
    }

    /// Copy the absolute path of the current directory, NUL-terminated,
    /// into `buf`. Returns the length including the NUL.
    ///
    /// Fails with [`Error::RangeTooSmall`] when `buf` is too short.
    pub fn getcwd(&self, buf: &mut [u8]) -> Result<usize> {
        self.call("getcwd", |fs| {
            let path = fs.dir_path(fs.cwd)?;
            if path.len() + 1 > buf.len() {
                return Err(Error::RangeTooSmall);
            }
            buf[..path.len()].copy_from_slice(&path);
            buf[path.len()] = 0;
            Ok(path.len() + 1)
        })
    }

    /// Absolute path of the current directory.
    pub fn current_dir(&self) -> Result<PathBuf> {
        self.call("current_dir", |fs| fs.dir_path(fs.cwd).map(to_path_buf))
    }

    /// Absolute path of `path` with every symlink, `.` and `..` resolved.
    pub fn canonicalize<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let path = bytes(path.as_ref());
        self.call("canonicalize", |fs| {
            let lookup = fs.resolve(fs.cwd, path, true)?;
            let id = lookup.inode.ok_or(Error::NotFound)?;
            if fs.node(id)?.is_dir() {
                return fs.dir_path(id).map(to_path_buf);
            }
            let mut out = fs.dir_path(lookup.parent)?;
            if out != b"/" {
                out.push(b'/');
            }
            out.extend_from_slice(&lookup.name);
            Ok(to_path_buf(out))
        })
    }
}

impl Fs {
    /// Resolve `path` starting at `base` (ignored for absolute paths).
    ///
    /// Intermediate symlinks are always followed. The final component is
    /// followed when `follow` is set or the path ends in `/`. A missing final
    /// component is not an error: `inode` is `None` and `parent`/`name` say
    /// where it would be created.
    pub(crate) fn resolve(&self, base: InodeId, path: &[u8], follow: bool) -> Result<Lookup> {
        if path.is_empty() {
            return Err(Error::NotFound);
        }
        if path.len() >= PATH_MAX {
            return Err(Error::NameTooLong);
        }
        if path.contains(&0) {
            return Err(Error::InvalidArgument);
        }
        let mut depth = 0;
        let lookup = self.walk(base, path, follow, &mut depth)?;
        if lookup.trailing_slash {
            if let Some(id) = lookup.inode {
                if !self.node(id)?.is_dir() {
                    return Err(Error::NotDirectory);
                }
            }
        }
        tracing::trace!(
            target: TRACING_TARGET,
            path = %String::from_utf8_lossy(path),
            inode = ?lookup.inode,
            "resolved"
        );
        Ok(lookup)
    }

    fn walk(&self, base: InodeId, path: &[u8], follow: bool, depth: &mut u32) -> Result<Lookup> {
        let trailing_slash = path.ends_with(b"/");
        let mut dir = if path.starts_with(b"/") { ROOT } else { base };
        let mut components = path
            .split(|&b| b == b'/')
            .filter(|c| !c.is_empty())
            .peekable();

        while let Some(name) = components.next() {
            if name.len() > NAME_MAX {
                return Err(Error::NameTooLong);
            }
            let node = self.node(dir)?;
            let INodeKind::Directory(entries) = &node.kind else {
                return Err(Error::NotDirectory);
            };
            if !node.permits(X_OK) {
                return Err(Error::PermissionDenied);
            }

            let found = entries.lookup(name);
            let last = components.peek().is_none();
            match (found, found.and_then(|id| self.link_data(id))) {
                (Some(_), Some(data)) if !last || follow || trailing_slash => {
                    if *depth >= MAX_SYMLINK_DEPTH {
                        return Err(Error::Loop);
                    }
                    *depth += 1;
                    let target = self.walk(dir, data, true, depth)?;
                    if last {
                        return Ok(Lookup {
                            trailing_slash: trailing_slash || target.trailing_slash,
                            ..target
                        });
                    }
                    dir = target.inode.ok_or(Error::NotFound)?;
                }
                _ if last => {
                    return Ok(Lookup {
                        parent: dir,
                        name: name.to_vec(),
                        inode: found,
                        trailing_slash,
                    });
                }
                (Some(id), _) => dir = id,
                (None, _) => return Err(Error::NotFound),
            }
        }

        // Nothing but slashes (and the base itself).
        if !self.node(dir)?.is_dir() {
            return Err(Error::NotDirectory);
        }
        Ok(Lookup {
            parent: dir,
            name: b".".to_vec(),
            inode: Some(dir),
            trailing_slash: true,
        })
    }

    fn link_data(&self, id: InodeId) -> Option<&[u8]> {
        match &self.inodes.get(id)?.kind {
            INodeKind::Symlink(link) => Some(&link.data),
            _ => None,
        }
    }

    /// Physical absolute path of a directory, found by walking `..`.
    pub(crate) fn dir_path(&self, id: InodeId) -> Result<Vec<u8>> {
        let mut names: Vec<&[u8]> = Vec::new();
        let mut cur = id;
        while cur != ROOT {
            if names.len() > self.inodes.len() {
                return Err(Error::Loop);
            }
            let parent = self.dir(cur)?.parent();
            let name = self.dir(parent)?.name_of(cur).ok_or(Error::NotFound)?;
            names.push(name);
            cur = parent;
        }
        if names.is_empty() {
            return Ok(b"/".to_vec());
        }
        let mut out = Vec::new();
        for name in names.iter().rev() {
            out.push(b'/');
            out.extend_from_slice(name);
        }
        Ok(out)
    }

    fn chdir(&mut self, path: &[u8]) -> Result<()> {
        let lookup = self.resolve(self.cwd, path, true)?;
        let id = lookup.inode.ok_or(Error::NotFound)?;
        self.enter_dir(id)
    }

    fn enter_dir(&mut self, id: InodeId) -> Result<()> {
        if !self.node(id)?.is_dir() {
            return Err(Error::NotDirectory);
        }
        self.require(id, X_OK)?;
        self.cwd = id;
        tracing::debug!(target: TRACING_TARGET, inode = id, "chdir");
        Ok(())
    }
}
