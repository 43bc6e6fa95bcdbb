//! Snapshot encoding.
//!
//! A snapshot is the magic `7F 'V' 'F' 'S'` followed by the inode count and
//! every inode in id order. All integers are little-endian. Directory
//! entries refer to inodes by their position in the snapshot, not by id.
//!
//! ```text
//! id u64, size u64, nlink u64, mode u32
//! btime, ctime, mtime, atime       each (sec i64, nsec i64)
//! symlink:   target NUL, data (size bytes)
//! directory: entry count u64, parent index u64,
//!            then for every entry past `..`: index u64, name NUL
//! regular:   if size != 0: range count u64,
//!            then per range: offset u64, len u64, bytes
//! ```
//!
//! Descriptors and the current directory are not part of a snapshot.

use super::data::{DataRange, RegularData};
use super::dir::{is_dot, Directory};
use super::fd::FdTable;
use super::inode::{INode, INodeKind, InodeId, InodeStore, Symlink};
use super::{Fs, Vfs, ROOT};
use crate::error::{Error, Result};
use crate::flags::{NAME_MAX, PATH_MAX, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG};
use crate::time::Timespec;
use crate::{FsConfig, TRACING_TARGET};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: [u8; 4] = [0x7F, b'V', b'F', b'S'];

impl Vfs {
    /// Write a snapshot of every inode to `w`.
    pub fn dump<W: Write>(&self, w: &mut W) -> Result<()> {
        self.call("dump", |fs| fs.dump(w))
    }

    pub fn dump_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut w = BufWriter::new(std::fs::File::create(path)?);
        self.dump(&mut w)?;
        w.flush()?;
        Ok(())
    }

    /// Rebuild an instance from a snapshot written by [`Vfs::dump`].
    ///
    /// Nothing is returned unless the whole snapshot is valid. Inodes that
    /// no entry names are dropped.
    pub fn load<R: Read>(r: &mut R) -> Result<Vfs> {
        Self::load_with_config(r, FsConfig::default())
    }

    pub fn load_with_config<R: Read>(r: &mut R, config: FsConfig) -> Result<Vfs> {
        let fs = Fs::load(r, config).inspect_err(|err| {
            tracing::warn!(target: TRACING_TARGET, %err, "snapshot rejected");
        })?;
        Ok(Vfs::from_fs(fs))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Vfs> {
        let mut file = std::fs::File::open(path)?;
        Self::load(&mut file)
    }
}

fn put_u32(w: &mut impl Write, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn put_u64(w: &mut impl Write, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn put_time(w: &mut impl Write, t: Timespec) -> io::Result<()> {
    w.write_all(&t.sec.to_le_bytes())?;
    w.write_all(&i64::from(t.nsec).to_le_bytes())
}

fn put_cstr(w: &mut impl Write, s: &[u8]) -> io::Result<()> {
    w.write_all(s)?;
    w.write_all(&[0])
}

fn corrupt(msg: impl Into<String>) -> Error {
    Error::Corrupt(msg.into())
}

impl Fs {
    fn dump<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&MAGIC)?;
        put_u64(w, self.inodes.len() as u64)?;
        for node in self.inodes.iter() {
            put_u64(w, node.id)?;
            put_u64(w, node.size())?;
            put_u64(w, node.nlink)?;
            put_u32(w, node.mode)?;
            for t in [node.btime, node.ctime, node.mtime, node.atime] {
                put_time(w, t)?;
            }
            match &node.kind {
                INodeKind::Symlink(link) => {
                    put_cstr(w, &link.target)?;
                    w.write_all(&link.data)?;
                }
                INodeKind::Directory(dir) => {
                    put_u64(w, dir.len() as u64)?;
                    put_u64(w, self.index_of(dir.parent())?)?;
                    for (name, id) in dir.children() {
                        put_u64(w, self.index_of(id)?)?;
                        put_cstr(w, name)?;
                    }
                }
                INodeKind::Regular(data) if data.size != 0 => {
                    put_u64(w, data.ranges().len() as u64)?;
                    for range in data.ranges() {
                        put_u64(w, range.offset)?;
                        put_u64(w, range.len())?;
                        w.write_all(&range.data)?;
                    }
                }
                INodeKind::Regular(_) => {}
            }
        }
        w.flush()?;
        tracing::info!(target: TRACING_TARGET, inodes = self.inodes.len(), "snapshot written");
        Ok(())
    }

    fn index_of(&self, id: InodeId) -> Result<u64> {
        self.inodes
            .slot(id)
            .map(|slot| slot as u64)
            .map_err(|_| corrupt(format!("entry refers to missing inode {id}")))
    }

    fn load<R: Read>(r: &mut R, config: FsConfig) -> Result<Fs> {
        let mut r = Decoder {
            inner: BufReader::new(r),
        };

        let mut magic = [0; 4];
        r.fill(&mut magic)?;
        if magic != MAGIC {
            return Err(corrupt("bad magic"));
        }
        let count = r.u64()?;
        if count == 0 {
            return Err(corrupt("no inodes"));
        }

        let mut nodes: Vec<INode> = Vec::new();
        let mut pending = Vec::new();
        for _ in 0..count {
            let id = r.u64()?;
            if nodes.last().is_some_and(|prev| prev.id >= id) {
                return Err(corrupt(format!("inode {id} out of order")));
            }
            let size = r.u64()?;
            let nlink = r.u64()?;
            let mode = r.u32()?;
            let [btime, ctime, mtime, atime] = [r.time()?, r.time()?, r.time()?, r.time()?];
            if size > i64::MAX as u64 {
                return Err(corrupt(format!("inode {id} size {size} out of range")));
            }

            let kind = match mode & S_IFMT {
                S_IFLNK => {
                    let target = r.cstr(PATH_MAX)?;
                    if size == 0 || size >= PATH_MAX as u64 {
                        return Err(corrupt(format!("symlink {id} has length {size}")));
                    }
                    let data = r.bytes(size)?;
                    INodeKind::Symlink(Symlink { data, target })
                }
                S_IFDIR => {
                    let entries = r.u64()?;
                    if entries < 2 {
                        return Err(corrupt(format!("directory {id} lacks dot entries")));
                    }
                    let parent = r.u64()?;
                    let mut names = Vec::new();
                    for _ in 2..entries {
                        let index = r.u64()?;
                        let name = r.cstr(NAME_MAX + 1)?;
                        names.try_reserve(1)?;
                        names.push((index, name));
                    }
                    pending.push(PendingDir {
                        slot: nodes.len(),
                        parent,
                        names,
                    });
                    INodeKind::Directory(Directory::new(id, id))
                }
                S_IFREG if size == 0 => INodeKind::Regular(RegularData::default()),
                S_IFREG => {
                    let count = r.u64()?;
                    let mut ranges = Vec::new();
                    for _ in 0..count {
                        let offset = r.u64()?;
                        let len = r.u64()?;
                        if offset.checked_add(len).map_or(true, |end| end > size) {
                            return Err(corrupt(format!("inode {id} range past its size")));
                        }
                        let data = r.bytes(len)?;
                        ranges.try_reserve(1)?;
                        ranges.push(DataRange { offset, data });
                    }
                    let data = RegularData::from_parts(size, ranges);
                    if !data.is_canonical() {
                        return Err(corrupt(format!("inode {id} ranges overlap or touch")));
                    }
                    INodeKind::Regular(data)
                }
                other => return Err(corrupt(format!("inode {id} has unknown type {other:o}"))),
            };

            nodes.try_reserve(1)?;
            nodes.push(INode {
                id,
                nlink,
                mode,
                btime,
                ctime,
                mtime,
                atime,
                kind,
            });
        }

        let ids: Vec<InodeId> = nodes.iter().map(|n| n.id).collect();
        let id_at = |index: u64| {
            usize::try_from(index)
                .ok()
                .and_then(|i| ids.get(i).copied())
                .ok_or_else(|| corrupt(format!("entry index {index} out of range")))
        };
        let mut names = vec![0u64; nodes.len()];
        let mut subdirs = vec![0u64; nodes.len()];
        for dir in &pending {
            for &(index, _) in &dir.names {
                id_at(index)?;
                let slot = index as usize;
                names[slot] += 1;
                if nodes[slot].is_dir() {
                    subdirs[dir.slot] += 1;
                }
            }
        }
        for (slot, node) in nodes.iter().enumerate() {
            let (expected, named) = if node.is_dir() {
                (2 + subdirs[slot], u64::from(slot != 0))
            } else {
                (names[slot], names[slot])
            };
            if node.nlink != expected || names[slot] != named {
                return Err(corrupt(format!(
                    "inode {} has {} links but {} names",
                    node.id, node.nlink, names[slot]
                )));
            }
        }

        for dir in pending {
            let node = &mut nodes[dir.slot];
            let mut entries = Directory::new(node.id, id_at(dir.parent)?);
            for (index, name) in dir.names {
                if name.is_empty() || is_dot(&name) || name.contains(&b'/') {
                    return Err(corrupt(format!("directory {} has an invalid name", node.id)));
                }
                if entries.lookup(&name).is_some() {
                    return Err(corrupt(format!("directory {} repeats a name", node.id)));
                }
                entries.push(&name, id_at(index)?)?;
            }
            node.kind = INodeKind::Directory(entries);
        }

        match nodes.first() {
            Some(root) if root.id == ROOT && root.is_dir() => {}
            _ => return Err(corrupt("first inode is not the root directory")),
        }

        let total = nodes.len();
        let inodes = InodeStore::from_sorted(
            nodes
                .into_iter()
                .filter(|n| n.id == ROOT || !n.is_unused())
                .collect(),
        );
        if inodes.len() < total {
            tracing::warn!(
                target: TRACING_TARGET,
                dropped = total - inodes.len(),
                "dropping unused inodes from snapshot"
            );
        }
        for node in inodes.iter() {
            if let INodeKind::Directory(dir) = &node.kind {
                let dangling = (1..dir.len())
                    .filter_map(|i| dir.entry_at(i))
                    .any(|(_, id)| inodes.get(id).is_none());
                if dangling {
                    return Err(corrupt(format!("directory {} names an unused inode", node.id)));
                }
            }
        }

        tracing::info!(target: TRACING_TARGET, inodes = inodes.len(), "snapshot loaded");
        Ok(Fs {
            inodes,
            fds: FdTable::default(),
            cwd: ROOT,
            config,
        })
    }
}

/// Directory entries waiting for every inode to be read.
struct PendingDir {
    slot: usize,
    parent: u64,
    names: Vec<(u64, Vec<u8>)>,
}

struct Decoder<R> {
    inner: BufReader<R>,
}

fn truncated(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        corrupt("truncated snapshot")
    } else {
        Error::Io(err)
    }
}

impl<R: Read> Decoder<R> {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(truncated)
    }

    fn u32(&mut self) -> Result<u32> {
        let mut buf = [0; 4];
        self.fill(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut buf = [0; 8];
        self.fill(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn time(&mut self) -> Result<Timespec> {
        let sec = self.u64()? as i64;
        let nsec = self.u64()? as i64;
        match u32::try_from(nsec) {
            Ok(nsec) if nsec < 1_000_000_000 => Ok(Timespec::new(sec, nsec)),
            _ => Err(corrupt(format!("nanoseconds {nsec} out of range"))),
        }
    }

    /// A NUL-terminated string of at most `limit` bytes, terminator included.
    fn cstr(&mut self, limit: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.inner)
            .take(limit as u64)
            .read_until(0, &mut buf)
            .map_err(truncated)?;
        match buf.pop() {
            Some(0) => Ok(buf),
            _ => Err(corrupt("unterminated string")),
        }
    }

    fn bytes(&mut self, len: u64) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.inner)
            .take(len)
            .read_to_end(&mut buf)
            .map_err(truncated)?;
        if buf.len() as u64 != len {
            return Err(corrupt("truncated snapshot"));
        }
        Ok(buf)
    }
}
