//! POSIX flag vocabularies and fixed limits.
//!
//! Values follow Linux. They are defined here rather than taken from `libc`
//! so that a snapshot or a flag word means the same thing on every host.

/// Open access mode: read only.
pub const O_RDONLY: i32 = 0;
/// Open access mode: write only.
pub const O_WRONLY: i32 = 1;
/// Open access mode: read and write.
pub const O_RDWR: i32 = 2;
/// Mask selecting the access mode bits.
pub const O_ACCMODE: i32 = 3;
pub const O_CREAT: i32 = 0o100;
pub const O_EXCL: i32 = 0o200;
pub const O_TRUNC: i32 = 0o1000;
pub const O_APPEND: i32 = 0o2000;
pub const O_DIRECTORY: i32 = 0o200000;
pub const O_NOFOLLOW: i32 = 0o400000;
pub const O_NOATIME: i32 = 0o1000000;
/// Accepted and ignored; there is no exec.
pub const O_CLOEXEC: i32 = 0o2000000;
/// Create an unnamed regular file inside the given directory.
pub const O_TMPFILE: i32 = 0o20000000 | O_DIRECTORY;

pub(crate) const O_VALID: i32 = O_ACCMODE
    | O_CREAT
    | O_EXCL
    | O_TRUNC
    | O_APPEND
    | O_DIRECTORY
    | O_NOFOLLOW
    | O_NOATIME
    | O_CLOEXEC
    | O_TMPFILE;

/// Resolve relative paths against the current directory.
pub const AT_FDCWD: i32 = -100;
pub const AT_SYMLINK_NOFOLLOW: i32 = 0x100;
pub const AT_REMOVEDIR: i32 = 0x200;
pub const AT_SYMLINK_FOLLOW: i32 = 0x400;
/// Operate on the descriptor itself when the path is empty.
pub const AT_EMPTY_PATH: i32 = 0x1000;

/// Fail instead of replacing an existing destination.
pub const RENAME_NOREPLACE: u32 = 1;
/// Atomically swap source and destination.
pub const RENAME_EXCHANGE: u32 = 2;

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;
/// Next offset at or after the given one that holds data.
pub const SEEK_DATA: i32 = 3;
/// Next offset at or after the given one that lies in a hole.
pub const SEEK_HOLE: i32 = 4;

pub const STATX_TYPE: u32 = 0x0001;
pub const STATX_MODE: u32 = 0x0002;
pub const STATX_NLINK: u32 = 0x0004;
pub const STATX_ATIME: u32 = 0x0020;
pub const STATX_MTIME: u32 = 0x0040;
pub const STATX_CTIME: u32 = 0x0080;
pub const STATX_INO: u32 = 0x0100;
pub const STATX_SIZE: u32 = 0x0200;
pub const STATX_BLOCKS: u32 = 0x0400;
pub const STATX_BASIC_STATS: u32 = 0x07ff;
pub const STATX_BTIME: u32 = 0x0800;

pub(crate) const STATX_SUPPORTED: u32 = STATX_TYPE
    | STATX_MODE
    | STATX_NLINK
    | STATX_ATIME
    | STATX_MTIME
    | STATX_CTIME
    | STATX_INO
    | STATX_SIZE
    | STATX_BLOCKS
    | STATX_BTIME;

pub const FALLOC_FL_KEEP_SIZE: i32 = 0x01;
pub const FALLOC_FL_PUNCH_HOLE: i32 = 0x02;

pub const F_OK: i32 = 0;
pub const X_OK: i32 = 1;
pub const W_OK: i32 = 2;
pub const R_OK: i32 = 4;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFLNK: u32 = 0o120000;

pub const DT_DIR: u8 = 4;
pub const DT_REG: u8 = 8;
pub const DT_LNK: u8 = 10;

/// Paths must be strictly shorter than this, in bytes.
pub const PATH_MAX: usize = 4096;
/// Longest single path component, in bytes.
pub const NAME_MAX: usize = 255;
/// Largest transfer a single read/write family call performs.
pub const MAX_RW_COUNT: usize = 0x7fff_f000;
/// Largest segment count accepted by the vectored calls.
pub const IOV_MAX: usize = 1024;
/// Symlinks followed during one resolution before failing with `ELOOP`.
pub const MAX_SYMLINK_DEPTH: u32 = 40;
