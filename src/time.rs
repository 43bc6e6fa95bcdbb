//! Timestamps and the clock that stamps inodes.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// `nsec` sentinel for the utime family: set the field to the current time.
pub const UTIME_NOW: u32 = (1 << 30) - 1;
/// `nsec` sentinel for the utime family: leave the field unchanged.
pub const UTIME_OMIT: u32 = (1 << 30) - 2;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Seconds and nanoseconds relative to the Unix epoch.
///
/// Unlike [`Duration`], times before the epoch are representable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timespec {
    pub sec: i64,
    pub nsec: u32,
}

impl Timespec {
    pub const ZERO: Timespec = Timespec { sec: 0, nsec: 0 };

    pub const fn new(sec: i64, nsec: u32) -> Self {
        Timespec { sec, nsec }
    }

    /// Request the current time from a utime-family call.
    pub const fn now_marker() -> Self {
        Timespec {
            sec: 0,
            nsec: UTIME_NOW,
        }
    }

    /// Request that a utime-family call leave the field alone.
    pub const fn omit_marker() -> Self {
        Timespec {
            sec: 0,
            nsec: UTIME_OMIT,
        }
    }

    pub(crate) fn from_nanos(nanos: i64) -> Self {
        Timespec {
            sec: nanos.div_euclid(NANOS_PER_SEC),
            nsec: nanos.rem_euclid(NANOS_PER_SEC) as u32,
        }
    }

    pub(crate) fn as_nanos(&self) -> i64 {
        self.sec
            .saturating_mul(NANOS_PER_SEC)
            .saturating_add(i64::from(self.nsec))
    }

    /// Whether `nsec` is a valid value (or one of the utime sentinels).
    pub(crate) fn is_valid_utime(&self) -> bool {
        self.nsec < NANOS_PER_SEC as u32 || self.nsec == UTIME_NOW || self.nsec == UTIME_OMIT
    }
}

impl From<SystemTime> for Timespec {
    fn from(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Timespec {
                sec: d.as_secs() as i64,
                nsec: d.subsec_nanos(),
            },
            Err(before) => {
                let d = before.duration();
                Timespec::from_nanos(-(d.as_nanos() as i64))
            }
        }
    }
}

impl From<Timespec> for SystemTime {
    fn from(t: Timespec) -> Self {
        if t.sec >= 0 {
            UNIX_EPOCH + Duration::new(t.sec as u64, t.nsec)
        } else {
            let back = Duration::from_secs(t.sec.unsigned_abs());
            UNIX_EPOCH - back + Duration::from_nanos(u64::from(t.nsec))
        }
    }
}

/// Source of inode timestamps.
///
/// `System` reads the wall clock. `Manual` holds a settable instant so tests
/// can observe exact timestamps; clones of a manual clock share the instant.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Manual(Arc<AtomicI64>),
}

impl Clock {
    /// A manual clock starting at `start`.
    pub fn manual(start: Timespec) -> Self {
        Clock::Manual(Arc::new(AtomicI64::new(start.as_nanos())))
    }

    pub fn now(&self) -> Timespec {
        match self {
            Clock::System => SystemTime::now().into(),
            Clock::Manual(nanos) => Timespec::from_nanos(nanos.load(Ordering::Relaxed)),
        }
    }

    /// Move a manual clock forward. No effect on the system clock.
    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(nanos) = self {
            nanos.fetch_add(by.as_nanos() as i64, Ordering::Relaxed);
        }
    }

    /// Pin a manual clock to `to`. No effect on the system clock.
    pub fn set(&self, to: Timespec) {
        if let Clock::Manual(nanos) = self {
            nanos.store(to.as_nanos(), Ordering::Relaxed);
        }
    }
}
