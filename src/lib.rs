//! memvfs is an in-memory POSIX filesystem. It gives a process sandboxed,
//! ephemeral file I/O with the semantics of the Linux syscalls it mirrors,
//! and can snapshot the whole tree to a single file and load it back.
//!
//! # Instances
//!
//! A [`Vfs`] is a handle to one filesystem instance. Clones share the
//! instance; separately created instances share nothing.
//!
//! ```
//! use memvfs::flags::{O_CREAT, O_RDWR, SEEK_DATA, SEEK_HOLE};
//!
//! let vfs = memvfs::Vfs::new();
//! vfs.mkdir("/data", 0o755)?;
//!
//! let fd = vfs.open("/data/sparse", O_CREAT | O_RDWR, 0o644)?;
//! vfs.pwrite(fd, b"hello", 0)?;
//! vfs.pwrite(fd, b"world", 100)?;
//!
//! assert_eq!(vfs.fstat(fd)?.size, 105);
//! assert_eq!(vfs.lseek(fd, 0, SEEK_HOLE)?, 5);
//! assert_eq!(vfs.lseek(fd, 5, SEEK_DATA)?, 100);
//! vfs.close(fd)?;
//! # Ok::<(), memvfs::Error>(())
//! ```
//!
//! Operations take the paths, flags and descriptors of their syscall
//! namesakes. Flags live in [`flags`]; they use the Linux values.
//!
//! # Files
//!
//! Regular files are sparse. Only the byte ranges ever written are stored;
//! everything else reads as zeros and is reported by `SEEK_HOLE`. Punching a
//! hole with [`Vfs::fallocate`] releases storage again.
//!
//! An unlinked file stays readable through descriptors that were open on it
//! and disappears with the last of them.
//!
//! # Concurrency
//!
//! Each instance sits behind one mutex. Every public operation holds it for
//! its whole duration, so operations never interleave. [`Vfs`] is `Send` and
//! `Sync`.
//!
//! # Snapshots
//!
//! [`Vfs::dump`] writes every inode to a byte stream and [`Vfs::load`]
//! rebuilds an instance from one. Descriptors and the current directory are
//! not saved.
//!
//! # Standard library shim
//!
//! [`shim::fs`] mirrors `std::fs` on top of the instance entered with
//! [`Vfs::enter`], for code that is written against the standard library.
//!
//! # Tracing
//!
//! Events are emitted through the `tracing` crate under the `memvfs` target.
//! Structural changes (creation, removal, renames) are logged at `DEBUG`;
//! failed operations are logged at `TRACE` with their errno. Use
//! `RUST_LOG=memvfs=debug` with a `tracing-subscriber` to see them.

#[cfg(doctest)]
mod readme;

mod builder;
pub use builder::Builder;

mod config;
pub use config::FsConfig;

mod error;
pub use error::{into_raw, Error, Result};

pub mod flags;

mod fs;
pub use fs::{Dirent, DirentIter, InodeId, Stat, Statx, Vfs};

pub mod shim;
pub use shim::EnterGuard;

pub mod time;

const TRACING_TARGET: &str = "memvfs";
