//! Data transfer on open descriptors.

use super::data::Segment;
use super::inode::{INodeKind, InodeId};
use super::path::bytes;
use super::{Fs, Vfs};
use crate::error::{Error, Result};
use crate::flags::{
    DT_DIR, DT_LNK, DT_REG, FALLOC_FL_KEEP_SIZE, FALLOC_FL_PUNCH_HOLE, IOV_MAX, MAX_RW_COUNT,
    SEEK_CUR, SEEK_DATA, SEEK_END, SEEK_HOLE, SEEK_SET, S_IFDIR, S_IFLNK, W_OK,
};
use crate::TRACING_TARGET;
use std::io::{IoSlice, IoSliceMut};
use std::path::Path;

/// Fixed part of a `linux_dirent64` record: ino, off, reclen, type.
const DIRENT_HEADER: usize = 8 + 8 + 2 + 1;

fn dirent_reclen(name_len: usize) -> usize {
    (DIRENT_HEADER + name_len + 1 + 7) & !7
}

fn offset_arg(offset: i64) -> Result<u64> {
    u64::try_from(offset).map_err(|_| Error::InvalidArgument)
}

/// One entry decoded from a [`Vfs::getdents`] buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    pub ino: u64,
    /// Position to seek to in order to resume after this entry.
    pub off: i64,
    /// One of `DT_REG`, `DT_DIR`, `DT_LNK`.
    pub kind: u8,
    pub name: Vec<u8>,
}

/// Decodes the `linux_dirent64` records written by [`Vfs::getdents`].
///
/// Stops at the end of the buffer or at the first malformed record.
#[derive(Debug, Clone)]
pub struct DirentIter<'a> {
    buf: &'a [u8],
}

impl<'a> DirentIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        DirentIter { buf }
    }
}

impl Iterator for DirentIter<'_> {
    type Item = Dirent;

    fn next(&mut self) -> Option<Dirent> {
        if self.buf.len() < DIRENT_HEADER {
            return None;
        }
        let reclen = u16::from_ne_bytes([self.buf[16], self.buf[17]]) as usize;
        if reclen <= DIRENT_HEADER || reclen > self.buf.len() {
            self.buf = &[];
            return None;
        }
        let (record, rest) = self.buf.split_at(reclen);
        self.buf = rest;

        let name = &record[DIRENT_HEADER..];
        let name_len = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        Some(Dirent {
            ino: u64::from_ne_bytes(record[0..8].try_into().ok()?),
            off: i64::from_ne_bytes(record[8..16].try_into().ok()?),
            kind: record[18],
            name: name[..name_len].to_vec(),
        })
    }
}

impl Vfs {
    /// Read from the descriptor's offset and advance it.
    pub fn read(&self, fd: i32, buf: &mut [u8]) -> Result<usize> {
        self.call("read", |fs| fs.read_at(fd, None, &mut [IoSliceMut::new(buf)]))
    }

    /// Read at `offset` without moving the descriptor's offset.
    pub fn pread(&self, fd: i32, buf: &mut [u8], offset: i64) -> Result<usize> {
        self.call("pread", |fs| {
            fs.read_at(fd, Some(offset), &mut [IoSliceMut::new(buf)])
        })
    }

    /// Scatter read: fill each buffer in turn, stopping at end of file.
    pub fn readv(&self, fd: i32, bufs: &mut [IoSliceMut<'_>]) -> Result<usize> {
        self.call("readv", |fs| fs.read_at(fd, None, bufs))
    }

    pub fn preadv(&self, fd: i32, bufs: &mut [IoSliceMut<'_>], offset: i64) -> Result<usize> {
        self.call("preadv", |fs| fs.read_at(fd, Some(offset), bufs))
    }

    /// Write at the descriptor's offset (or the end, with `O_APPEND`) and
    /// advance it.
    pub fn write(&self, fd: i32, buf: &[u8]) -> Result<usize> {
        self.call("write", |fs| fs.write_at(fd, None, &[IoSlice::new(buf)]))
    }

    /// Write at `offset` without moving the descriptor's offset.
    ///
    /// As on Linux, a descriptor opened with `O_APPEND` still appends.
    pub fn pwrite(&self, fd: i32, buf: &[u8], offset: i64) -> Result<usize> {
        self.call("pwrite", |fs| {
            fs.write_at(fd, Some(offset), &[IoSlice::new(buf)])
        })
    }

    /// Gather write. The whole transfer is allocated up front, so either all
    /// of it lands or none of it does.
    pub fn writev(&self, fd: i32, bufs: &[IoSlice<'_>]) -> Result<usize> {
        self.call("writev", |fs| fs.write_at(fd, None, bufs))
    }

    pub fn pwritev(&self, fd: i32, bufs: &[IoSlice<'_>], offset: i64) -> Result<usize> {
        self.call("pwritev", |fs| fs.write_at(fd, Some(offset), bufs))
    }

    /// Reposition the descriptor's offset.
    ///
    /// `SEEK_DATA` and `SEEK_HOLE` find the next data or hole at or after
    /// `offset`; past the last data byte both report the file size.
    pub fn lseek(&self, fd: i32, offset: i64, whence: i32) -> Result<i64> {
        self.call("lseek", |fs| fs.lseek(fd, offset, whence))
    }

    /// Set the size of the file open at `fd`.
    pub fn ftruncate(&self, fd: i32, len: i64) -> Result<()> {
        self.call("ftruncate", |fs| {
            let file = fs.fds.get(fd)?;
            if !file.writable() {
                return Err(Error::InvalidArgument);
            }
            let inode = file.inode;
            fs.truncate_inode(inode, len)
        })
    }

    /// Set the size of the file at `path`, following symlinks.
    pub fn truncate<P: AsRef<Path>>(&self, path: P, len: i64) -> Result<()> {
        let path = bytes(path.as_ref());
        self.call("truncate", |fs| {
            let id = fs.resolve(fs.cwd, path, true)?.inode.ok_or(Error::NotFound)?;
            if fs.node(id)?.is_dir() {
                return Err(Error::IsDirectory);
            }
            fs.require(id, W_OK)?;
            fs.truncate_inode(id, len)
        })
    }

    /// Manipulate allocated space.
    ///
    /// Mode 0 backs `[offset, offset + len)` with zeroed storage and grows
    /// the file to cover it. `FALLOC_FL_KEEP_SIZE` never grows the file.
    /// `FALLOC_FL_PUNCH_HOLE | FALLOC_FL_KEEP_SIZE` releases the range.
    pub fn fallocate(&self, fd: i32, mode: i32, offset: i64, len: i64) -> Result<()> {
        self.call("fallocate", |fs| fs.fallocate(fd, mode, offset, len))
    }

    /// Copy up to `count` bytes from `in_fd` to `out_fd` inside the instance.
    ///
    /// With `offset`, reading starts there and `offset` is advanced instead
    /// of `in_fd`'s offset. Holes in the source become holes in the
    /// destination.
    pub fn sendfile(
        &self,
        out_fd: i32,
        in_fd: i32,
        offset: Option<&mut i64>,
        count: usize,
    ) -> Result<usize> {
        self.call("sendfile", |fs| fs.sendfile(out_fd, in_fd, offset, count))
    }

    /// Validates `fd`. Data is always as durable as the instance itself.
    pub fn fsync(&self, fd: i32) -> Result<()> {
        self.call("fsync", |fs| fs.fds.get(fd).map(|_| ()))
    }

    pub fn fdatasync(&self, fd: i32) -> Result<()> {
        self.call("fdatasync", |fs| fs.fds.get(fd).map(|_| ()))
    }

    /// Fill `buf` with `linux_dirent64` records for the directory open at
    /// `fd`, resuming where the previous call stopped. Returns the bytes
    /// written; 0 means the end was reached. Decode with [`DirentIter`].
    pub fn getdents(&self, fd: i32, buf: &mut [u8]) -> Result<usize> {
        self.call("getdents", |fs| fs.getdents(fd, buf))
    }
}

/// An owned piece of a source file captured by `sendfile`.
enum Chunk {
    Data(Vec<u8>),
    Hole(u64),
}

impl Fs {
    fn read_at(
        &mut self,
        fd: i32,
        offset: Option<i64>,
        bufs: &mut [IoSliceMut<'_>],
    ) -> Result<usize> {
        if bufs.len() > IOV_MAX {
            return Err(Error::InvalidArgument);
        }
        let file = self.fds.get(fd)?;
        if !file.readable() {
            return Err(Error::BadDescriptor);
        }
        let (inode, noatime) = (file.inode, file.noatime() || self.config.noatime);
        let start = match offset {
            Some(offset) => offset_arg(offset)?,
            None => file.pos,
        };

        let now = self.now();
        let node = self.inodes.get_mut(inode).ok_or(Error::BadDescriptor)?;
        let INodeKind::Regular(data) = &node.kind else {
            return Err(Error::IsDirectory);
        };
        let mut pos = start;
        let mut remaining = MAX_RW_COUNT;
        for buf in bufs.iter_mut() {
            let want = buf.len().min(remaining);
            let n = data.read(pos, &mut buf[..want]);
            pos += n as u64;
            remaining -= n;
            if n < want || remaining == 0 {
                break;
            }
        }
        if !noatime {
            node.atime = now;
        }
        if offset.is_none() {
            self.fds.get_mut(fd)?.pos = pos;
        }
        let n = (pos - start) as usize;
        tracing::trace!(target: TRACING_TARGET, fd, inode, offset = start, n, "read");
        Ok(n)
    }

    fn write_at(&mut self, fd: i32, offset: Option<i64>, bufs: &[IoSlice<'_>]) -> Result<usize> {
        if bufs.len() > IOV_MAX {
            return Err(Error::InvalidArgument);
        }
        let file = self.fds.get(fd)?;
        if !file.writable() {
            return Err(Error::BadDescriptor);
        }
        let (inode, append, pos) = (file.inode, file.append(), file.pos);
        let now = self.now();
        let max = self.config.max_file_size;

        let node = self.inodes.get_mut(inode).ok_or(Error::BadDescriptor)?;
        let INodeKind::Regular(data) = &mut node.kind else {
            return Err(Error::IsDirectory);
        };
        let start = match (append, offset) {
            (true, _) => data.size,
            (false, Some(offset)) => offset_arg(offset)?,
            (false, None) => pos,
        };
        let total = bufs.iter().map(|b| b.len()).sum::<usize>().min(MAX_RW_COUNT);
        if total == 0 {
            return Ok(0);
        }
        let end = start.checked_add(total as u64).ok_or(Error::FileTooBig)?;
        if end > max {
            return Err(Error::FileTooBig);
        }

        data.alloc_data(start, total as u64)?;
        let mut at = start;
        for buf in bufs {
            let left = (end - at) as usize;
            if left == 0 {
                break;
            }
            let chunk = &buf[..buf.len().min(left)];
            data.write(at, chunk)?;
            at += chunk.len() as u64;
        }
        node.touch_modified(now);

        if offset.is_none() {
            self.fds.get_mut(fd)?.pos = end;
        }
        tracing::trace!(target: TRACING_TARGET, fd, inode, offset = start, n = total, "write");
        Ok(total)
    }

    fn lseek(&mut self, fd: i32, offset: i64, whence: i32) -> Result<i64> {
        let file = self.fds.get(fd)?;
        let (inode, pos) = (file.inode, file.pos);
        let node = self.node(inode)?;
        let relative = |base: u64| {
            i64::try_from(base)
                .ok()
                .and_then(|base| base.checked_add(offset))
                .ok_or(Error::Overflow)
        };
        let new = match whence {
            SEEK_SET => offset,
            SEEK_CUR => relative(pos)?,
            SEEK_END => relative(node.size())?,
            SEEK_DATA | SEEK_HOLE => {
                let INodeKind::Regular(data) = &node.kind else {
                    return Err(Error::InvalidArgument);
                };
                let from = offset_arg(offset)?;
                if from > data.size {
                    return Err(Error::InvalidArgument);
                }
                let found = if whence == SEEK_DATA {
                    data.seek_data(from)
                } else {
                    data.seek_hole(from)
                };
                i64::try_from(found).map_err(|_| Error::Overflow)?
            }
            _ => return Err(Error::InvalidArgument),
        };
        if new < 0 {
            return Err(Error::InvalidArgument);
        }
        self.fds.get_mut(fd)?.pos = new as u64;
        tracing::trace!(target: TRACING_TARGET, fd, whence, offset = new, "lseek");
        Ok(new)
    }

    pub(crate) fn truncate_inode(&mut self, id: InodeId, len: i64) -> Result<()> {
        let len = offset_arg(len)?;
        if len > self.config.max_file_size {
            return Err(Error::FileTooBig);
        }
        let now = self.now();
        let node = self.node_mut(id)?;
        match &mut node.kind {
            INodeKind::Regular(data) => data.truncate(len),
            INodeKind::Directory(_) => return Err(Error::IsDirectory),
            INodeKind::Symlink(_) => return Err(Error::InvalidArgument),
        }
        node.touch_modified(now);
        tracing::debug!(target: TRACING_TARGET, inode = id, len, "truncate");
        Ok(())
    }

    fn fallocate(&mut self, fd: i32, mode: i32, offset: i64, len: i64) -> Result<()> {
        if offset < 0 || len <= 0 {
            return Err(Error::InvalidArgument);
        }
        if mode & !(FALLOC_FL_KEEP_SIZE | FALLOC_FL_PUNCH_HOLE) != 0
            || (mode & FALLOC_FL_PUNCH_HOLE != 0 && mode & FALLOC_FL_KEEP_SIZE == 0)
        {
            return Err(Error::InvalidArgument);
        }
        let file = self.fds.get(fd)?;
        if !file.writable() {
            return Err(Error::BadDescriptor);
        }
        let inode = file.inode;
        let (offset, len) = (offset as u64, len as u64);
        let end = offset.checked_add(len).ok_or(Error::FileTooBig)?;
        if mode & FALLOC_FL_PUNCH_HOLE == 0 && end > self.config.max_file_size {
            return Err(Error::FileTooBig);
        }

        let now = self.now();
        let node = self.node_mut(inode)?;
        let INodeKind::Regular(data) = &mut node.kind else {
            return Err(Error::IsDirectory);
        };
        if mode & FALLOC_FL_PUNCH_HOLE != 0 {
            data.punch_hole(offset, len)?;
        } else if mode & FALLOC_FL_KEEP_SIZE != 0 {
            if offset < data.size {
                data.alloc_data(offset, end.min(data.size) - offset)?;
            }
        } else {
            data.alloc_data(offset, len)?;
        }
        node.touch_modified(now);
        tracing::debug!(target: TRACING_TARGET, fd, inode, mode, offset, len, "fallocate");
        Ok(())
    }

    fn sendfile(
        &mut self,
        out_fd: i32,
        in_fd: i32,
        offset: Option<&mut i64>,
        count: usize,
    ) -> Result<usize> {
        let input = self.fds.get(in_fd)?;
        if !input.readable() {
            return Err(Error::BadDescriptor);
        }
        let (in_inode, in_pos) = (input.inode, input.pos);
        let noatime = input.noatime() || self.config.noatime;
        let output = self.fds.get(out_fd)?;
        if !output.writable() {
            return Err(Error::BadDescriptor);
        }
        if output.append() {
            return Err(Error::InvalidArgument);
        }
        let (out_inode, out_pos) = (output.inode, output.pos);
        if !matches!(self.node(out_inode)?.kind, INodeKind::Regular(_)) {
            return Err(Error::InvalidArgument);
        }
        let start = match &offset {
            Some(offset) => offset_arg(**offset)?,
            None => in_pos,
        };

        // Capture the source first so a file can be sent onto itself.
        let INodeKind::Regular(src) = &self.node(in_inode)?.kind else {
            return Err(Error::InvalidArgument);
        };
        let stop = start
            .saturating_add(count.min(MAX_RW_COUNT) as u64)
            .min(src.size);
        let mut chunks = Vec::new();
        if start < stop {
            for segment in src.iter_from(start) {
                if segment.offset() >= stop {
                    break;
                }
                let len = segment.len().min(stop - segment.offset());
                chunks.push(match segment {
                    Segment::Data { bytes, .. } => {
                        let mut copy = Vec::new();
                        copy.try_reserve_exact(len as usize)?;
                        copy.extend_from_slice(&bytes[..len as usize]);
                        Chunk::Data(copy)
                    }
                    Segment::Hole(_) => Chunk::Hole(len),
                });
            }
        }
        let n = stop.saturating_sub(start);

        let dst_end = out_pos.checked_add(n).ok_or(Error::FileTooBig)?;
        if dst_end > self.config.max_file_size {
            return Err(Error::FileTooBig);
        }
        let now = self.now();
        let node = self.node_mut(out_inode)?;
        let INodeKind::Regular(dst) = &mut node.kind else {
            return Err(Error::InvalidArgument);
        };
        let mut at = out_pos;
        for chunk in chunks {
            match chunk {
                Chunk::Data(bytes) => {
                    dst.write(at, &bytes)?;
                    at += bytes.len() as u64;
                }
                Chunk::Hole(len) => {
                    dst.punch_hole(at, len)?;
                    at += len;
                    if at > dst.size {
                        dst.truncate(at);
                    }
                }
            }
        }
        if n > 0 {
            node.touch_modified(now);
        }
        if !noatime {
            self.node_mut(in_inode)?.atime = now;
        }

        match offset {
            Some(offset) => *offset = (start + n) as i64,
            None => self.fds.get_mut(in_fd)?.pos = start + n,
        }
        self.fds.get_mut(out_fd)?.pos = dst_end;
        tracing::debug!(target: TRACING_TARGET, out_fd, in_fd, offset = start, n, "sendfile");
        Ok(n as usize)
    }

    fn getdents(&mut self, fd: i32, buf: &mut [u8]) -> Result<usize> {
        let file = self.fds.get(fd)?;
        let (inode, start) = (file.inode, file.pos);
        let noatime = file.noatime() || self.config.noatime;
        let dir = self.dir(inode)?;

        let mut written = 0;
        let mut index = usize::try_from(start).unwrap_or(usize::MAX);
        while let Some((name, child)) = dir.entry_at(index) {
            let reclen = dirent_reclen(name.len());
            if written + reclen > buf.len() {
                if written == 0 {
                    return Err(Error::InvalidArgument);
                }
                break;
            }
            let kind = match self.inodes.get(child).map(|n| n.file_type()) {
                Some(S_IFDIR) => DT_DIR,
                Some(S_IFLNK) => DT_LNK,
                _ => DT_REG,
            };
            let record = &mut buf[written..written + reclen];
            record[0..8].copy_from_slice(&child.to_ne_bytes());
            record[8..16].copy_from_slice(&(index as i64 + 1).to_ne_bytes());
            record[16..18].copy_from_slice(&(reclen as u16).to_ne_bytes());
            record[18] = kind;
            record[DIRENT_HEADER..DIRENT_HEADER + name.len()].copy_from_slice(name);
            record[DIRENT_HEADER + name.len()..].fill(0);
            written += reclen;
            index += 1;
        }

        self.fds.get_mut(fd)?.pos = index as u64;
        if !noatime {
            let now = self.now();
            self.node_mut(inode)?.atime = now;
        }
        tracing::trace!(
            target: TRACING_TARGET,
            fd,
            inode,
            entries_from = start,
            written,
            "getdents"
        );
        Ok(written)
    }
}
