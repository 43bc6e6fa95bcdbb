use crate::time::Clock;

/// Configuration for a filesystem instance.
///
/// Use builder-style methods to configure behavior:
///
/// ```
/// let mut config = memvfs::FsConfig::default();
/// config.umask(0o077).noatime(true);
/// let vfs = memvfs::Vfs::with_config(config);
/// # drop(vfs);
/// ```
///
/// ## Defaults
///
/// - `umask`: 0o022
/// - `noatime`: false (reads update atime unless opened with `O_NOATIME`)
/// - `root_mode`: 0o755
/// - `max_file_size`: `i64::MAX`
/// - `clock`: the system clock
#[derive(Debug, Clone)]
pub struct FsConfig {
    /// Permission bits cleared from every newly created file or directory
    pub(crate) umask: u32,
    /// Whether reads skip access time updates
    pub(crate) noatime: bool,
    /// Permission bits of the root directory of a fresh instance
    pub(crate) root_mode: u32,
    /// Largest size a regular file may reach
    pub(crate) max_file_size: u64,
    /// Timestamp source
    pub(crate) clock: Clock,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            umask: 0o022,
            noatime: false,
            root_mode: 0o755,
            max_file_size: i64::MAX as u64,
            clock: Clock::System,
        }
    }
}

impl FsConfig {
    /// Set the creation mask. Only the rwx bits are kept.
    pub fn umask(&mut self, value: u32) -> &mut Self {
        self.umask = value & 0o777;
        self
    }

    /// Set whether access times are left untouched by reads.
    pub fn noatime(&mut self, value: bool) -> &mut Self {
        self.noatime = value;
        self
    }

    /// Set the permission bits of the root directory.
    pub fn root_mode(&mut self, value: u32) -> &mut Self {
        self.root_mode = value & 0o777;
        self
    }

    /// Set the maximum regular file size in bytes.
    ///
    /// Writes, truncates and allocations past this limit fail with `EFBIG`.
    pub fn max_file_size(&mut self, bytes: u64) -> &mut Self {
        assert!(bytes > 0, "max_file_size must be positive");
        self.max_file_size = bytes.min(i64::MAX as u64);
        self
    }

    /// Replace the timestamp source.
    pub fn clock(&mut self, clock: Clock) -> &mut Self {
        self.clock = clock;
        self
    }
}
