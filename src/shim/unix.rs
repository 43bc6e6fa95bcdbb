//! The real `std::os::unix::fs` traits, implemented for the shimmed types.
//!
//! Users import these traits from `std::os::unix::fs` as normal.

use super::fs::{DirBuilder, File, Metadata, OpenOptions, Permissions};
use std::io::Result;

impl std::os::unix::fs::FileExt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.pread(buf, offset)
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize> {
        self.pwrite(buf, offset)
    }
}

impl std::os::unix::fs::OpenOptionsExt for OpenOptions {
    fn mode(&mut self, mode: u32) -> &mut Self {
        self.set_mode(mode);
        self
    }

    fn custom_flags(&mut self, flags: i32) -> &mut Self {
        self.set_custom_flags(flags);
        self
    }
}

impl std::os::unix::fs::MetadataExt for Metadata {
    fn dev(&self) -> u64 {
        0
    }

    fn ino(&self) -> u64 {
        self.stat.ino
    }

    fn mode(&self) -> u32 {
        self.stat.mode
    }

    fn nlink(&self) -> u64 {
        self.stat.nlink
    }

    fn uid(&self) -> u32 {
        0
    }

    fn gid(&self) -> u32 {
        0
    }

    fn rdev(&self) -> u64 {
        0
    }

    fn size(&self) -> u64 {
        self.stat.size
    }

    fn atime(&self) -> i64 {
        self.stat.atime.sec
    }

    fn atime_nsec(&self) -> i64 {
        i64::from(self.stat.atime.nsec)
    }

    fn mtime(&self) -> i64 {
        self.stat.mtime.sec
    }

    fn mtime_nsec(&self) -> i64 {
        i64::from(self.stat.mtime.nsec)
    }

    fn ctime(&self) -> i64 {
        self.stat.ctime.sec
    }

    fn ctime_nsec(&self) -> i64 {
        i64::from(self.stat.ctime.nsec)
    }

    fn blksize(&self) -> u64 {
        self.stat.blksize
    }

    fn blocks(&self) -> u64 {
        self.stat.blocks
    }
}

impl std::os::unix::fs::PermissionsExt for Permissions {
    fn mode(&self) -> u32 {
        self.mode
    }

    fn set_mode(&mut self, mode: u32) {
        self.mode = mode;
    }

    fn from_mode(mode: u32) -> Self {
        Permissions { mode }
    }
}

impl std::os::unix::fs::DirBuilderExt for DirBuilder {
    fn mode(&mut self, mode: u32) -> &mut Self {
        self.mode = mode;
        self
    }
}
