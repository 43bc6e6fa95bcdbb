//! Drop-in replacements for `std::fs` backed by a [`Vfs`].
//!
//! The free functions and [`fs::OpenOptions::open`] act on the instance
//! entered on the current thread with [`Vfs::enter`]. Handles returned by
//! them ([`fs::File`], [`fs::ReadDir`]) keep their instance and work after
//! the guard is gone.
//!
//! The real `std::os::unix::fs` traits (`FileExt`, `OpenOptionsExt`,
//! `MetadataExt`, `PermissionsExt`, `DirBuilderExt`) are implemented for the
//! shimmed types, so code written against `std` only needs its `fs` import
//! swapped:
//!
//! ```
//! // use std::fs;
//! use memvfs::shim::fs;
//!
//! fn save(path: &str, data: &[u8]) -> std::io::Result<()> {
//!     fs::create_dir_all("/data")?;
//!     fs::write(path, data)
//! }
//! # let vfs = memvfs::Vfs::new();
//! # let _guard = vfs.enter();
//! # save("/data/x", b"1").unwrap();
//! ```
//!
//! Errors carry the raw errno of the failing operation, so
//! [`std::io::Error::kind`] matches what the real filesystem would report.

use crate::Vfs;
use std::cell::RefCell;
use std::io;

pub mod fs;
mod unix;

thread_local! {
    static CURRENT: RefCell<Option<Vfs>> = const { RefCell::new(None) };
}

/// Instance entered on this thread.
pub(crate) fn current() -> io::Result<Vfs> {
    CURRENT
        .with(|cur| cur.borrow().clone())
        .ok_or_else(|| io::Error::other("no memvfs instance entered on this thread"))
}

impl Vfs {
    /// Make this instance the target of the [`shim`](crate::shim) functions
    /// on the calling thread until the guard is dropped.
    ///
    /// Guards nest: dropping one restores whatever was entered before it.
    pub fn enter(&self) -> EnterGuard {
        let prev = CURRENT.with(|cur| cur.replace(Some(self.clone())));
        EnterGuard { prev }
    }
}

/// Keeps a [`Vfs`] entered on the current thread.
#[must_use = "the instance is only entered while this guard is held"]
pub struct EnterGuard {
    prev: Option<Vfs>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT.with(|cur| *cur.borrow_mut() = prev);
    }
}
