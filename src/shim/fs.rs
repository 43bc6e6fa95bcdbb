//! Filesystem types mirroring `std::fs`.
//!
//! Provides drop-in replacements for:
//! - [`File`] with `std::io::{Read, Write, Seek}`
//! - [`OpenOptions`], [`Metadata`], [`FileType`], [`Permissions`]
//! - [`ReadDir`] and [`DirEntry`]
//! - [`DirBuilder`]
//! - Free functions: [`canonicalize`], [`copy`], [`create_dir`],
//!   [`create_dir_all`], [`exists`], [`hard_link`], [`metadata`], [`read`],
//!   [`read_dir`], [`read_link`], [`read_to_string`], [`remove_dir`],
//!   [`remove_dir_all`], [`remove_file`], [`rename`], [`set_permissions`],
//!   [`symlink`], [`symlink_metadata`], [`write`]
//!
//! # Differences from `std::fs`
//!
//! - Permission bits are enforced against the owner bits only.
//! - [`File::try_clone`] returns a descriptor with its own cursor, which
//!   starts where the original's was.
//! - Syncing is accepted and does nothing.

use super::current;
use crate::flags::{
    DT_DIR, DT_LNK, MAX_RW_COUNT, O_ACCMODE, O_APPEND, O_CREAT, O_DIRECTORY, O_EXCL, O_RDONLY,
    O_RDWR, O_TRUNC, O_WRONLY, SEEK_CUR, SEEK_END, SEEK_SET, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG,
};
use crate::{DirentIter, Stat, Vfs};
use std::ffi::{OsStr, OsString};
use std::io::{self, Error, ErrorKind, Read, Result, Seek, SeekFrom, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Creates a new directory at the provided path.
pub fn create_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    DirBuilder::new().create(path)
}

/// Creates a directory and all of its parent components if they are missing.
pub fn create_dir_all<P: AsRef<Path>>(path: P) -> Result<()> {
    DirBuilder::new().recursive(true).create(path)
}

/// Removes an empty directory.
pub fn remove_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    Ok(current()?.rmdir(path)?)
}

/// Removes a directory after removing everything beneath it.
///
/// A symlink is removed, not followed.
pub fn remove_dir_all<P: AsRef<Path>>(path: P) -> Result<()> {
    let vfs = current()?;
    let path = path.as_ref();
    if vfs.lstat(path)?.is_symlink() {
        return Ok(vfs.unlink(path)?);
    }
    remove_tree(&vfs, path)
}

fn remove_tree(vfs: &Vfs, path: &Path) -> Result<()> {
    for entry in read_dir_in(vfs, path)? {
        let child = entry.path();
        if entry.kind == DT_DIR {
            remove_tree(vfs, &child)?;
        } else {
            vfs.unlink(&child)?;
        }
    }
    Ok(vfs.rmdir(path)?)
}

/// Removes a file or symlink.
pub fn remove_file<P: AsRef<Path>>(path: P) -> Result<()> {
    Ok(current()?.unlink(path)?)
}

/// Renames a file or directory, replacing `to` if it exists.
pub fn rename<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> Result<()> {
    Ok(current()?.rename(from, to)?)
}

/// Returns `true` if the path points at an existing entity, following
/// symlinks.
pub fn exists<P: AsRef<Path>>(path: P) -> bool {
    current().is_ok_and(|vfs| vfs.stat(path).is_ok())
}

/// Queries metadata, following symlinks.
pub fn metadata<P: AsRef<Path>>(path: P) -> Result<Metadata> {
    Ok(Metadata {
        stat: current()?.stat(path)?,
    })
}

/// Queries metadata without following a final symlink.
pub fn symlink_metadata<P: AsRef<Path>>(path: P) -> Result<Metadata> {
    Ok(Metadata {
        stat: current()?.lstat(path)?,
    })
}

/// Returns an iterator over the entries within a directory.
///
/// The listing is taken when this is called; `.` and `..` are skipped.
pub fn read_dir<P: AsRef<Path>>(path: P) -> Result<ReadDir> {
    let vfs = current()?;
    let entries = read_dir_in(&vfs, path.as_ref())?;
    Ok(ReadDir {
        entries: entries.into_iter(),
    })
}

fn read_dir_in(vfs: &Vfs, path: &Path) -> Result<Vec<DirEntry>> {
    let dir = File {
        vfs: vfs.clone(),
        fd: vfs.open(path, O_RDONLY | O_DIRECTORY, 0)?,
    };
    let mut buf = vec![0; 4096];
    let mut entries = Vec::new();
    loop {
        let n = vfs.getdents(dir.fd, &mut buf)?;
        if n == 0 {
            break;
        }
        for dirent in DirentIter::new(&buf[..n]) {
            if dirent.name == b"." || dirent.name == b".." {
                continue;
            }
            entries.push(DirEntry {
                vfs: vfs.clone(),
                path: path.join(OsStr::from_bytes(&dirent.name)),
                ino: dirent.ino,
                kind: dirent.kind,
            });
        }
    }
    Ok(entries)
}

/// Reads the entire contents of a file into a bytes vector.
pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buf = size_hint_buffer(file.metadata()?.len());
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// An empty buffer with room for `len` bytes when that much can be had.
/// Sparse files report sizes far beyond what memory holds.
fn size_hint_buffer(len: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Ok(len) = usize::try_from(len) {
        let _ = buf.try_reserve_exact(len);
    }
    buf
}

/// Reads the entire contents of a file into a string.
pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
    String::from_utf8(read(path)?).map_err(|err| Error::new(ErrorKind::InvalidData, err))
}

/// Writes a slice as the entire contents of a file, creating it if needed.
pub fn write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
    File::create(path)?.write_all(contents.as_ref())
}

/// Copies the contents and permission bits of one file to another.
///
/// Holes in the source stay holes in the destination. Returns the number
/// of bytes in the source.
pub fn copy<P: AsRef<Path>, Q: AsRef<Path>>(from: P, to: Q) -> Result<u64> {
    let vfs = current()?;
    let src = File::open_in(&vfs, from, O_RDONLY, 0)?;
    let stat = vfs.fstat(src.fd)?;
    if !stat.is_file() {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "the source path is not an existing regular file",
        ));
    }
    let dst = File::open_in(&vfs, to, O_WRONLY | O_CREAT | O_TRUNC, stat.mode & 0o777)?;
    while vfs.sendfile(dst.fd, src.fd, None, MAX_RW_COUNT)? != 0 {}
    vfs.fchmod(dst.fd, stat.mode)?;
    Ok(stat.size)
}

/// Returns the canonical absolute form of a path with every symlink
/// resolved.
pub fn canonicalize<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    Ok(current()?.canonicalize(path)?)
}

/// Changes the permission bits of a file or directory.
pub fn set_permissions<P: AsRef<Path>>(path: P, perm: Permissions) -> Result<()> {
    Ok(current()?.chmod(path, perm.mode)?)
}

/// Creates a symbolic link at `link` whose contents are `original`.
pub fn symlink<P: AsRef<Path>, Q: AsRef<Path>>(original: P, link: Q) -> Result<()> {
    Ok(current()?.symlink(original, link)?)
}

/// Reads the contents of a symbolic link.
pub fn read_link<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    Ok(current()?.readlink(path)?)
}

/// Creates a new hard link on the filesystem.
pub fn hard_link<P: AsRef<Path>, Q: AsRef<Path>>(original: P, link: Q) -> Result<()> {
    Ok(current()?.link(original, link)?)
}

/// Iterator over directory entries, returned by [`read_dir`].
#[derive(Debug)]
pub struct ReadDir {
    entries: std::vec::IntoIter<DirEntry>,
}

impl Iterator for ReadDir {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(Ok)
    }
}

/// An entry inside a directory.
#[derive(Debug)]
pub struct DirEntry {
    vfs: Vfs,
    path: PathBuf,
    ino: u64,
    kind: u8,
}

impl DirEntry {
    /// Returns the full path to this entry.
    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }

    pub fn file_name(&self) -> OsString {
        self.path
            .file_name()
            .map(OsStr::to_owned)
            .unwrap_or_default()
    }

    /// Metadata for the entry itself. Symlinks are not followed.
    pub fn metadata(&self) -> Result<Metadata> {
        Ok(Metadata {
            stat: self.vfs.lstat(&self.path)?,
        })
    }

    /// File type as recorded in the directory, without another lookup.
    pub fn file_type(&self) -> Result<FileType> {
        let mode = match self.kind {
            DT_DIR => S_IFDIR,
            DT_LNK => S_IFLNK,
            _ => S_IFREG,
        };
        Ok(FileType { mode })
    }

    pub fn ino(&self) -> u64 {
        self.ino
    }
}

/// Representation of a file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileType {
    mode: u32,
}

impl FileType {
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

/// An open file.
///
/// Closed when dropped. The handle keeps the instance it was opened on.
#[derive(Debug)]
pub struct File {
    vfs: Vfs,
    fd: i32,
}

impl File {
    /// Attempts to open a file in read-only mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<File> {
        OpenOptions::new().read(true).open(path)
    }

    /// Opens a file in write-only mode, creating it if it doesn't exist and
    /// truncating it if it does.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<File> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    }

    /// Creates a new file in read-write mode; fails if it already exists.
    pub fn create_new<P: AsRef<Path>>(path: P) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
    }

    fn open_in<P: AsRef<Path>>(vfs: &Vfs, path: P, flags: i32, mode: u32) -> Result<File> {
        Ok(File {
            vfs: vfs.clone(),
            fd: vfs.open(path, flags, mode)?,
        })
    }

    /// The descriptor number within the instance.
    pub fn as_raw_fd(&self) -> i32 {
        self.fd
    }

    pub fn metadata(&self) -> Result<Metadata> {
        Ok(Metadata {
            stat: self.vfs.fstat(self.fd)?,
        })
    }

    /// Truncates or extends the file to `size` bytes. Extension leaves a
    /// hole.
    pub fn set_len(&self, size: u64) -> Result<()> {
        let size = i64::try_from(size).map_err(|_| Error::from(ErrorKind::InvalidInput))?;
        Ok(self.vfs.ftruncate(self.fd, size)?)
    }

    pub fn sync_all(&self) -> Result<()> {
        Ok(self.vfs.fsync(self.fd)?)
    }

    pub fn sync_data(&self) -> Result<()> {
        Ok(self.vfs.fdatasync(self.fd)?)
    }

    pub fn set_permissions(&self, perm: Permissions) -> Result<()> {
        Ok(self.vfs.fchmod(self.fd, perm.mode)?)
    }

    /// Opens a second descriptor on the same file.
    pub fn try_clone(&self) -> Result<File> {
        Ok(File {
            vfs: self.vfs.clone(),
            fd: self.vfs.dup(self.fd)?,
        })
    }

    pub(crate) fn pread(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        Ok(self.vfs.pread(self.fd, buf, offset_arg(offset)?)?)
    }

    pub(crate) fn pwrite(&self, buf: &[u8], offset: u64) -> Result<usize> {
        Ok(self.vfs.pwrite(self.fd, buf, offset_arg(offset)?)?)
    }
}

fn offset_arg(offset: u64) -> Result<i64> {
    i64::try_from(offset).map_err(|_| Error::from(ErrorKind::InvalidInput))
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.vfs.read(self.fd, buf)?)
    }

    fn read_vectored(&mut self, bufs: &mut [io::IoSliceMut<'_>]) -> Result<usize> {
        Ok(self.vfs.readv(self.fd, bufs)?)
    }
}

impl Write for File {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(self.vfs.write(self.fd, buf)?)
    }

    fn write_vectored(&mut self, bufs: &[io::IoSlice<'_>]) -> Result<usize> {
        Ok(self.vfs.writev(self.fd, bufs)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Seek for File {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(offset) => (offset_arg(offset)?, SEEK_SET),
            SeekFrom::End(offset) => (offset, SEEK_END),
            SeekFrom::Current(offset) => (offset, SEEK_CUR),
        };
        Ok(self.vfs.lseek(self.fd, offset, whence)? as u64)
    }
}

impl Drop for File {
    fn drop(&mut self) {
        let _ = self.vfs.close(self.fd);
    }
}

/// Metadata about a file, from `stat`.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub(crate) stat: Stat,
}

impl Metadata {
    #[allow(clippy::len_without_is_empty)] // is_empty() is not part of std::fs::Metadata
    pub fn len(&self) -> u64 {
        self.stat.size
    }

    pub fn is_file(&self) -> bool {
        self.stat.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.stat.is_dir()
    }

    pub fn is_symlink(&self) -> bool {
        self.stat.is_symlink()
    }

    pub fn file_type(&self) -> FileType {
        FileType {
            mode: self.stat.mode,
        }
    }

    pub fn modified(&self) -> Result<SystemTime> {
        Ok(self.stat.mtime.into())
    }

    pub fn accessed(&self) -> Result<SystemTime> {
        Ok(self.stat.atime.into())
    }

    /// Birth time. Always available.
    pub fn created(&self) -> Result<SystemTime> {
        Ok(self.stat.btime.into())
    }

    pub fn permissions(&self) -> Permissions {
        Permissions {
            mode: self.stat.mode & 0o7777,
        }
    }
}

/// Options and flags for opening files.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    read: bool,
    write: bool,
    append: bool,
    truncate: bool,
    create: bool,
    create_new: bool,
    /// Permission bits for a created file, before the umask
    mode: u32,
    /// Extra `O_*` flags; access mode bits are ignored
    custom_flags: i32,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read: false,
            write: false,
            append: false,
            truncate: false,
            create: false,
            create_new: false,
            mode: 0o666,
            custom_flags: 0,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&mut self, read: bool) -> &mut Self {
        self.read = read;
        self
    }

    pub fn write(&mut self, write: bool) -> &mut Self {
        self.write = write;
        self
    }

    pub fn append(&mut self, append: bool) -> &mut Self {
        self.append = append;
        self
    }

    pub fn truncate(&mut self, truncate: bool) -> &mut Self {
        self.truncate = truncate;
        self
    }

    pub fn create(&mut self, create: bool) -> &mut Self {
        self.create = create;
        self
    }

    pub fn create_new(&mut self, create_new: bool) -> &mut Self {
        self.create_new = create_new;
        self
    }

    pub(crate) fn set_mode(&mut self, mode: u32) {
        self.mode = mode;
    }

    pub(crate) fn set_custom_flags(&mut self, flags: i32) {
        self.custom_flags = flags;
    }

    /// Opens `path` on the instance entered on this thread.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<File> {
        self.open_in(&current()?, path)
    }

    /// Opens `path` on `vfs`, regardless of what is entered.
    pub fn open_in<P: AsRef<Path>>(&self, vfs: &Vfs, path: P) -> Result<File> {
        File::open_in(vfs, path, self.flags()?, self.mode)
    }

    fn flags(&self) -> Result<i32> {
        let invalid = || Error::from(ErrorKind::InvalidInput);
        let access = match (self.read, self.write, self.append) {
            (true, false, false) => O_RDONLY,
            (false, true, false) => O_WRONLY,
            (true, true, false) => O_RDWR,
            (false, _, true) => O_WRONLY | O_APPEND,
            (true, _, true) => O_RDWR | O_APPEND,
            (false, false, false) => return Err(invalid()),
        };
        let writing = self.write || self.append;
        let creation = match (writing, self.truncate, self.create, self.create_new) {
            (_, _, _, true) if !self.write && !self.append => return Err(invalid()),
            (_, _, _, true) => O_CREAT | O_EXCL,
            (false, false, false, false) => 0,
            (false, _, _, _) => return Err(invalid()),
            (true, true, _, _) if self.append => return Err(invalid()),
            (true, true, true, false) => O_CREAT | O_TRUNC,
            (true, true, false, false) => O_TRUNC,
            (true, false, true, false) => O_CREAT,
            (true, false, false, false) => 0,
        };
        Ok(access | creation | (self.custom_flags & !O_ACCMODE))
    }
}

/// Permission bits of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permissions {
    pub(crate) mode: u32,
}

impl Permissions {
    /// No owner write bit.
    pub fn readonly(&self) -> bool {
        self.mode & 0o200 == 0
    }

    pub fn set_readonly(&mut self, readonly: bool) {
        if readonly {
            self.mode &= !0o222;
        } else {
            self.mode |= 0o200;
        }
    }
}

/// A builder for creating directories.
#[derive(Debug)]
pub struct DirBuilder {
    recursive: bool,
    pub(crate) mode: u32,
}

impl Default for DirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DirBuilder {
    pub fn new() -> Self {
        Self {
            recursive: false,
            mode: 0o777,
        }
    }

    pub fn recursive(&mut self, recursive: bool) -> &mut Self {
        self.recursive = recursive;
        self
    }

    pub fn create<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let vfs = current()?;
        if self.recursive {
            self.create_all(&vfs, path.as_ref())
        } else {
            Ok(vfs.mkdir(path, self.mode)?)
        }
    }

    fn create_all(&self, vfs: &Vfs, path: &Path) -> Result<()> {
        let is_dir = |p: &Path| vfs.stat(p).is_ok_and(|st| st.is_dir());
        if path.as_os_str().is_empty() || is_dir(path) {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            self.create_all(vfs, parent)?;
        }
        match vfs.mkdir(path, self.mode) {
            Err(crate::Error::Exists) if is_dir(path) => Ok(()),
            res => Ok(res?),
        }
    }
}
