//! Error type for filesystem operations.
//!
//! Every operation funnels its failures into [`Error`], and every variant maps
//! to exactly one POSIX errno via [`Error::to_errno`]. Callers that want the
//! raw syscall shape can use [`Error::as_neg`] or [`into_raw`].
//!
//! | Variant | errno |
//! |---------|-------|
//! | `NotFound` | `ENOENT` |
//! | `NotDirectory` | `ENOTDIR` |
//! | `IsDirectory` | `EISDIR` |
//! | `PermissionDenied` | `EACCES` |
//! | `NotPermitted` | `EPERM` |
//! | `Exists` | `EEXIST` |
//! | `NotEmpty` | `ENOTEMPTY` |
//! | `Busy` | `EBUSY` |
//! | `BadDescriptor` | `EBADF` |
//! | `InvalidArgument` | `EINVAL` |
//! | `NameTooLong` | `ENAMETOOLONG` |
//! | `Loop` | `ELOOP` |
//! | `FileTooBig` | `EFBIG` |
//! | `Overflow` | `EOVERFLOW` |
//! | `RangeTooSmall` | `ERANGE` |
//! | `Io` | raw os error, else `EIO` |
//! | `Corrupt` | `EIO` |
//! | `OutOfMemory` | `ENOMEM` |

use std::collections::TryReserveError;
use thiserror::Error;

/// Unified error type for all filesystem operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A path component does not exist.
    #[error("no such file or directory")]
    NotFound,

    /// A path component used as a directory is not one.
    #[error("not a directory")]
    NotDirectory,

    /// Attempted a file-only operation on a directory.
    #[error("is a directory")]
    IsDirectory,

    /// The rwx bits of an inode forbid the requested access.
    #[error("permission denied")]
    PermissionDenied,

    /// The operation is never allowed on this kind of object, regardless of
    /// mode bits (e.g. hard-linking a directory).
    #[error("operation not permitted")]
    NotPermitted,

    /// Target already exists (exclusive create, mkdir, link, noreplace rename).
    #[error("file exists")]
    Exists,

    /// rmdir or rename onto a non-empty directory.
    #[error("directory not empty")]
    NotEmpty,

    /// The object is in use (root, cwd, or held by an open descriptor).
    #[error("device or resource busy")]
    Busy,

    /// The descriptor is not open, or not open in the needed direction.
    #[error("bad file descriptor")]
    BadDescriptor,

    #[error("invalid argument")]
    InvalidArgument,

    /// Path exceeds `PATH_MAX` or a component exceeds `NAME_MAX`.
    #[error("file name too long")]
    NameTooLong,

    /// Symlink resolution exceeded the depth limit.
    #[error("too many levels of symbolic links")]
    Loop,

    /// A write or truncate would exceed the maximum file size.
    #[error("file too large")]
    FileTooBig,

    /// An offset computation does not fit the result type.
    #[error("value too large for defined data type")]
    Overflow,

    /// The caller's buffer cannot hold the result.
    #[error("result too large for buffer")]
    RangeTooSmall,

    /// Reader or writer failure during snapshot persistence.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot stream is structurally invalid.
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),

    #[error("out of memory")]
    OutOfMemory,
}

impl Error {
    /// Convert this error into a positive POSIX errno.
    ///
    /// The mapping is exhaustive so a new variant cannot be added without
    /// assigning it an errno.
    #[must_use]
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            Self::NotFound => libc::ENOENT,
            Self::NotDirectory => libc::ENOTDIR,
            Self::IsDirectory => libc::EISDIR,
            Self::PermissionDenied => libc::EACCES,
            Self::NotPermitted => libc::EPERM,
            Self::Exists => libc::EEXIST,
            Self::NotEmpty => libc::ENOTEMPTY,
            Self::Busy => libc::EBUSY,
            Self::BadDescriptor => libc::EBADF,
            Self::InvalidArgument => libc::EINVAL,
            Self::NameTooLong => libc::ENAMETOOLONG,
            Self::Loop => libc::ELOOP,
            Self::FileTooBig => libc::EFBIG,
            Self::Overflow => libc::EOVERFLOW,
            Self::RangeTooSmall => libc::ERANGE,
            Self::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            Self::Corrupt(_) => libc::EIO,
            Self::OutOfMemory => libc::ENOMEM,
        }
    }

    /// Syscall-style negative error code.
    #[must_use]
    pub fn as_neg(&self) -> i64 {
        -i64::from(self.to_errno())
    }
}

impl From<TryReserveError> for Error {
    fn from(_: TryReserveError) -> Self {
        Error::OutOfMemory
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            other => std::io::Error::from_raw_os_error(other.to_errno()),
        }
    }
}

/// A specialized [`Result`] type for filesystem operations.
///
/// [`Result`]: std::result::Result
pub type Result<T = ()> = std::result::Result<T, Error>;

/// Flatten a result into the syscall convention: the non-negative value on
/// success, the negated errno on failure.
pub fn into_raw<T: Into<i64>>(res: Result<T>) -> i64 {
    match res {
        Ok(v) => v.into(),
        Err(err) => err.as_neg(),
    }
}
