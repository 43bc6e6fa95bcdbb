//! Metadata, permission and timestamp tests.

use memvfs::flags::{
    AT_EMPTY_PATH, AT_FDCWD, AT_SYMLINK_NOFOLLOW, F_OK, O_CREAT, O_NOATIME, O_RDONLY, O_RDWR,
    O_WRONLY, R_OK, S_IFDIR, S_IFMT, S_IFREG, STATX_BASIC_STATS, STATX_BTIME, STATX_INO,
    STATX_SIZE, STATX_TYPE, W_OK, X_OK,
};
use memvfs::shim::fs::{metadata, set_permissions, symlink, symlink_metadata, write};
use memvfs::time::{Clock, Timespec};
use memvfs::{Builder, Error, Result, Vfs};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::time::{Duration, UNIX_EPOCH};

const START: Timespec = Timespec::new(1_000, 0);

fn with_clock() -> (Vfs, Clock) {
    let clock = Clock::manual(START);
    let vfs = Builder::new().clock(clock.clone()).build();
    (vfs, clock)
}

#[test]
fn file_and_directory_attributes() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/dir", 0o755)?;
    let fd = vfs.open("/dir/file", O_CREAT | O_WRONLY, 0o640)?;
    vfs.write(fd, b"12345")?;

    let st = vfs.fstat(fd)?;
    assert!(st.is_file());
    assert_eq!(st.mode, S_IFREG | 0o640);
    assert_eq!(st.size, 5);
    assert_eq!(st.nlink, 1);
    assert_eq!(st.blksize, 4096);
    assert_eq!(st, vfs.stat("/dir/file")?);

    let dir = vfs.stat("/dir")?;
    assert_eq!(dir.mode & S_IFMT, S_IFDIR);
    // `.`, `..` and `file`.
    assert_eq!(dir.size, 1 + 2 + 4);
    assert_ne!(dir.ino, st.ino);
    Ok(())
}

#[test]
fn umask_applies_to_creation() -> Result {
    let vfs = Builder::new().umask(0o077).build();
    vfs.mkdir("/private", 0o777)?;
    vfs.close(vfs.open("/private/f", O_CREAT | O_RDWR, 0o666)?)?;
    assert_eq!(vfs.stat("/private")?.mode & 0o777, 0o700);
    assert_eq!(vfs.stat("/private/f")?.mode & 0o777, 0o600);

    // chmod is not masked.
    vfs.chmod("/private/f", 0o4755)?;
    assert_eq!(vfs.stat("/private/f")?.mode, S_IFREG | 0o755);
    Ok(())
}

#[test]
fn permission_bits_are_enforced() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/d", 0o755)?;
    vfs.close(vfs.open("/d/f", O_CREAT | O_RDWR, 0o644)?)?;

    vfs.chmod("/d/f", 0o200)?;
    assert!(matches!(vfs.open("/d/f", O_RDONLY, 0), Err(Error::PermissionDenied)));
    vfs.close(vfs.open("/d/f", O_WRONLY, 0)?)?;

    vfs.chmod("/d", 0o600)?;
    assert!(matches!(vfs.stat("/d/f"), Err(Error::PermissionDenied)));
    assert!(matches!(vfs.chdir("/d"), Err(Error::PermissionDenied)));

    vfs.chmod("/d", 0o500)?;
    assert!(matches!(vfs.mkdir("/d/sub", 0o755), Err(Error::PermissionDenied)));
    assert!(matches!(vfs.unlink("/d/f"), Err(Error::PermissionDenied)));
    Ok(())
}

#[test]
fn access_checks() -> Result {
    let vfs = Vfs::new();
    vfs.close(vfs.open("/f", O_CREAT | O_RDWR, 0o644)?)?;
    vfs.access("/f", F_OK)?;
    vfs.access("/f", R_OK | W_OK)?;
    assert!(matches!(vfs.access("/f", X_OK), Err(Error::PermissionDenied)));
    assert!(matches!(vfs.access("/missing", F_OK), Err(Error::NotFound)));
    assert!(matches!(vfs.access("/f", 0o10), Err(Error::InvalidArgument)));
    Ok(())
}

#[test]
fn symlink_mode_cannot_change() -> Result {
    let vfs = Vfs::new();
    vfs.close(vfs.open("/f", O_CREAT | O_RDWR, 0o644)?)?;
    vfs.symlink("/f", "/l")?;

    // Through the link the target changes.
    vfs.chmod("/l", 0o600)?;
    assert_eq!(vfs.stat("/f")?.mode & 0o777, 0o600);
    assert!(matches!(
        vfs.fchmodat(AT_FDCWD, "/l", 0o600, AT_SYMLINK_NOFOLLOW),
        Err(Error::InvalidArgument)
    ));
    Ok(())
}

#[test]
fn writes_and_reads_stamp_times() -> Result {
    let (vfs, clock) = with_clock();
    let fd = vfs.open("/f", O_CREAT | O_RDWR, 0o644)?;
    let created = vfs.fstat(fd)?;
    assert_eq!(created.btime, START);
    assert_eq!(created.mtime, START);
    assert_eq!(vfs.stat("/")?.mtime, START);

    clock.advance(Duration::from_secs(10));
    vfs.write(fd, b"data")?;
    let written = vfs.fstat(fd)?;
    assert_eq!(written.mtime, Timespec::new(1_010, 0));
    assert_eq!(written.ctime, Timespec::new(1_010, 0));
    assert_eq!(written.atime, START);
    assert_eq!(written.btime, START);

    clock.advance(Duration::from_secs(5));
    vfs.pread(fd, &mut [0; 4], 0)?;
    let read = vfs.fstat(fd)?;
    assert_eq!(read.atime, Timespec::new(1_015, 0));
    assert_eq!(read.mtime, Timespec::new(1_010, 0));

    // O_NOATIME reads leave atime alone.
    clock.advance(Duration::from_secs(5));
    let quiet = vfs.open("/f", O_RDONLY | O_NOATIME, 0)?;
    vfs.read(quiet, &mut [0; 4])?;
    assert_eq!(vfs.fstat(quiet)?.atime, Timespec::new(1_015, 0));

    // chmod only changes ctime.
    vfs.fchmod(fd, 0o600)?;
    let changed = vfs.fstat(fd)?;
    assert_eq!(changed.ctime, Timespec::new(1_020, 0));
    assert_eq!(changed.mtime, Timespec::new(1_010, 0));
    Ok(())
}

#[test]
fn noatime_instance() -> Result {
    let clock = Clock::manual(START);
    let vfs = Builder::new().clock(clock.clone()).noatime(true).build();
    let fd = vfs.open("/f", O_CREAT | O_RDWR, 0o644)?;
    vfs.write(fd, b"x")?;
    clock.advance(Duration::from_secs(1));
    vfs.pread(fd, &mut [0; 1], 0)?;
    assert_eq!(vfs.fstat(fd)?.atime, START);
    Ok(())
}

#[test]
fn utimensat_sets_omits_and_stamps() -> Result {
    let (vfs, clock) = with_clock();
    vfs.close(vfs.open("/f", O_CREAT | O_RDWR, 0o644)?)?;
    clock.set(Timespec::new(2_000, 0));

    let times = [Timespec::new(10, 1), Timespec::new(20, 2)];
    vfs.utimensat(AT_FDCWD, "/f", Some(times), 0)?;
    let st = vfs.stat("/f")?;
    assert_eq!((st.atime, st.mtime), (times[0], times[1]));
    assert_eq!(st.ctime, Timespec::new(2_000, 0));

    clock.set(Timespec::new(3_000, 0));
    vfs.utimensat(
        AT_FDCWD,
        "/f",
        Some([Timespec::omit_marker(), Timespec::now_marker()]),
        0,
    )?;
    let st = vfs.stat("/f")?;
    assert_eq!(st.atime, times[0]);
    assert_eq!(st.mtime, Timespec::new(3_000, 0));

    // Omitting both changes nothing, not even ctime.
    clock.set(Timespec::new(4_000, 0));
    vfs.utimensat(AT_FDCWD, "/f", Some([Timespec::omit_marker(); 2]), 0)?;
    assert_eq!(vfs.stat("/f")?.ctime, Timespec::new(3_000, 0));

    vfs.utimensat(AT_FDCWD, "/f", None, 0)?;
    assert_eq!(vfs.stat("/f")?.atime, Timespec::new(4_000, 0));

    assert!(matches!(
        vfs.utimensat(AT_FDCWD, "/f", Some([Timespec::new(0, 1_000_000_000); 2]), 0),
        Err(Error::InvalidArgument)
    ));
    Ok(())
}

#[test]
fn statx_fills_only_requested_fields() -> Result {
    let (vfs, _clock) = with_clock();
    let fd = vfs.open("/f", O_CREAT | O_RDWR, 0o644)?;
    vfs.write(fd, b"abc")?;

    let all = vfs.statx(AT_FDCWD, "/f", 0, STATX_BASIC_STATS | STATX_BTIME)?;
    // Owners are not tracked.
    assert_eq!(all.mask, (STATX_BASIC_STATS | STATX_BTIME) & !(0x8 | 0x10));
    assert_eq!(all.size, 3);
    assert_eq!(all.mode, S_IFREG | 0o644);
    assert_eq!(all.btime, START);

    let some = vfs.statx(AT_FDCWD, "/f", 0, STATX_SIZE | STATX_TYPE | 0x8000_0000)?;
    assert_eq!(some.mask, STATX_SIZE | STATX_TYPE);
    assert_eq!(some.size, 3);
    assert_eq!(some.mode, S_IFREG);
    assert_eq!(some.ino, 0);

    // An empty path names the descriptor itself.
    let by_fd = vfs.statx(fd, "", AT_EMPTY_PATH, STATX_INO)?;
    assert_eq!(by_fd.ino, vfs.fstat(fd)?.ino);
    assert!(matches!(vfs.statx(fd, "", 0, STATX_INO), Err(Error::NotFound)));
    Ok(())
}

#[test]
fn shim_metadata() -> Result {
    let vfs = Vfs::new();
    let _guard = vfs.enter();

    write("/file", b"contents")?;
    symlink("/file", "/link")?;

    let meta = metadata("/link")?;
    assert!(meta.is_file());
    assert_eq!(meta.len(), 8);
    assert_eq!(meta.mode() & 0o777, 0o644);
    assert_eq!(meta.nlink(), 1);
    assert!(meta.modified()? > UNIX_EPOCH);

    let link = symlink_metadata("/link")?;
    assert!(link.is_symlink());
    assert!(!link.is_file());

    let mut perms = meta.permissions();
    perms.set_mode(0o400);
    set_permissions("/file", perms)?;
    assert!(metadata("/file")?.permissions().readonly());
    Ok(())
}
