use crate::time::{Clock, Timespec};
use crate::{FsConfig, Vfs};

/// A builder that can be used to configure a filesystem instance.
///
/// ## Examples
///
/// You can use the builder to create an instance with default configuration:
///
/// ```
/// let vfs = memvfs::Builder::new().build();
/// # drop(vfs);
/// ```
///
/// Vary the defaults with the respective methods. A builder can be reused to
/// create several instances; they share nothing but their settings (and a
/// manual clock, if one was supplied).
///
/// ```
/// use memvfs::time::{Clock, Timespec};
///
/// let mut builder = memvfs::Builder::new();
/// builder.umask(0o077).clock(Clock::manual(Timespec::new(1_700_000_000, 0)));
///
/// let one = builder.build();
/// let two = builder.build();
/// # drop((one, two));
/// ```
///
/// ## Deterministic timestamps
///
/// By default inodes are stamped with the system clock. Supplying a manual
/// clock through [`Builder::clock`] or [`Builder::epoch`] makes every
/// timestamp reproducible.
pub struct Builder {
    config: FsConfig,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            config: FsConfig::default(),
        }
    }

    /// Permission bits cleared from newly created inodes.
    pub fn umask(&mut self, value: u32) -> &mut Self {
        self.config.umask(value);
        self
    }

    /// Never update access times on reads.
    pub fn noatime(&mut self, value: bool) -> &mut Self {
        self.config.noatime(value);
        self
    }

    /// Permission bits of the root directory.
    pub fn root_mode(&mut self, value: u32) -> &mut Self {
        self.config.root_mode(value);
        self
    }

    /// Largest size a regular file may grow to.
    pub fn max_file_size(&mut self, bytes: u64) -> &mut Self {
        self.config.max_file_size(bytes);
        self
    }

    /// Timestamp source for the instance.
    pub fn clock(&mut self, clock: Clock) -> &mut Self {
        self.config.clock(clock);
        self
    }

    /// Freeze time at `value`, using a manual clock.
    pub fn epoch(&mut self, value: Timespec) -> &mut Self {
        self.config.clock(Clock::manual(value));
        self
    }

    /// Build an instance with the settings from the builder.
    pub fn build(&self) -> Vfs {
        Vfs::with_config(self.config.clone())
    }
}
