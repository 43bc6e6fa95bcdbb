//! Snapshot tests against real files on disk.

use memvfs::flags::{O_CREAT, O_RDONLY, O_RDWR, SEEK_DATA, SEEK_HOLE};
use memvfs::time::Timespec;
use memvfs::{Builder, Error, Result, Vfs};
use std::path::PathBuf;

fn populate(vfs: &Vfs) -> Result {
    vfs.mkdir("/etc", 0o755)?;
    vfs.mkdir("/var", 0o700)?;
    vfs.mkdir("/var/lib", 0o755)?;

    let fd = vfs.open("/etc/config", O_CREAT | O_RDWR, 0o600)?;
    vfs.write(fd, b"key = value\n")?;
    vfs.close(fd)?;

    let fd = vfs.open("/var/lib/sparse", O_CREAT | O_RDWR, 0o644)?;
    vfs.pwrite(fd, b"hello", 0)?;
    vfs.pwrite(fd, b"world", 100)?;
    vfs.close(fd)?;

    vfs.close(vfs.creat("/empty", 0o644)?)?;
    vfs.link("/etc/config", "/var/config")?;
    vfs.symlink("../etc/config", "/var/link")?;
    Ok(())
}

#[test]
fn snapshot_survives_a_round_trip_through_disk() -> Result {
    let vfs = Builder::new().epoch(Timespec::new(1_234, 5)).build();
    populate(&vfs)?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("fs.img");
    vfs.dump_to_path(&path)?;
    assert_eq!(&std::fs::read(&path)?[..4], b"\x7fVFS");

    let loaded = Vfs::load_from_path(&path)?;
    for p in [
        "/",
        "/etc",
        "/var",
        "/var/lib",
        "/etc/config",
        "/var/config",
        "/var/link",
        "/var/lib/sparse",
        "/empty",
    ] {
        assert_eq!(loaded.lstat(p)?, vfs.lstat(p)?, "{p}");
    }

    assert_eq!(loaded.stat("/var/config")?.nlink, 2);
    assert_eq!(loaded.readlink("/var/link")?, PathBuf::from("../etc/config"));
    assert_eq!(loaded.stat("/var/link")?.ino, loaded.stat("/etc/config")?.ino);
    assert_eq!(loaded.stat("/etc/config")?.mtime, Timespec::new(1_234, 5));

    let fd = loaded.open("/var/lib/sparse", O_RDONLY, 0)?;
    assert_eq!(loaded.lseek(fd, 0, SEEK_HOLE)?, 5);
    assert_eq!(loaded.lseek(fd, 5, SEEK_DATA)?, 100);
    let mut buf = [0xff; 105];
    loaded.pread(fd, &mut buf, 0)?;
    assert_eq!(&buf[..5], b"hello");
    assert!(buf[5..100].iter().all(|&b| b == 0));
    assert_eq!(&buf[100..], b"world");
    Ok(())
}

#[test]
fn loaded_instance_is_independent() -> Result {
    let vfs = Vfs::new();
    populate(&vfs)?;
    let mut image = Vec::new();
    vfs.dump(&mut image)?;

    let loaded = Vfs::load(&mut image.as_slice())?;
    assert!(!loaded.same_instance(&vfs));
    loaded.unlink("/empty")?;
    assert!(vfs.stat("/empty").is_ok());

    // New inodes do not collide with loaded ones.
    loaded.close(loaded.creat("/fresh", 0o644)?)?;
    let fresh = loaded.stat("/fresh")?.ino;
    for p in ["/etc/config", "/var/lib/sparse", "/var/link"] {
        assert_ne!(loaded.lstat(p)?.ino, fresh);
    }
    Ok(())
}

#[test]
fn open_state_is_not_saved() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/cwd", 0o755)?;
    vfs.chdir("/cwd")?;
    let fd = vfs.open("/f", O_CREAT | O_RDWR, 0o644)?;
    let tmp = vfs.open("/unnamed", O_CREAT | O_RDWR, 0o644)?;
    vfs.unlink("/unnamed")?;

    let mut image = Vec::new();
    vfs.dump(&mut image)?;
    let loaded = Vfs::load(&mut image.as_slice())?;

    assert_eq!(loaded.current_dir()?, PathBuf::from("/"));
    assert!(matches!(loaded.fstat(fd), Err(Error::BadDescriptor)));
    assert!(matches!(loaded.fstat(tmp), Err(Error::BadDescriptor)));
    assert!(format!("{loaded:?}").contains("inodes: 3"));
    Ok(())
}

#[test]
fn damaged_snapshots_are_rejected() -> Result {
    let vfs = Vfs::new();
    populate(&vfs)?;
    let mut image = Vec::new();
    vfs.dump(&mut image)?;

    let cut = &image[..image.len() / 2];
    assert!(matches!(Vfs::load(&mut &cut[..]), Err(Error::Corrupt(_))));

    let mut bad = image.clone();
    bad[1] = b'X';
    assert!(matches!(Vfs::load(&mut bad.as_slice()), Err(Error::Corrupt(_))));

    let dir = tempfile::tempdir()?;
    assert!(matches!(
        Vfs::load_from_path(dir.path().join("missing")),
        Err(Error::Io(_))
    ));
    Ok(())
}

#[test]
fn link_counts_are_checked_on_load() -> Result {
    let vfs = Vfs::new();
    for dir in ["/a", "/b", "/c"] {
        vfs.mkdir(dir, 0o755)?;
    }
    let mut image = Vec::new();
    vfs.dump(&mut image)?;

    // Root nlink follows the magic, inode count, id and size.
    assert_eq!(image[28..36], 5u64.to_le_bytes());
    let mut short = image.clone();
    short[28..36].copy_from_slice(&2u64.to_le_bytes());
    assert!(matches!(Vfs::load(&mut short.as_slice()), Err(Error::Corrupt(_))));

    let loaded = Vfs::load(&mut image.as_slice())?;
    for dir in ["/a", "/b", "/c"] {
        loaded.rmdir(dir)?;
    }
    assert_eq!(loaded.stat("/")?.nlink, 2);
    Ok(())
}

#[test]
fn load_applies_the_given_config() -> Result {
    let vfs = Vfs::new();
    let mut image = Vec::new();
    vfs.dump(&mut image)?;

    let mut config = memvfs::FsConfig::default();
    config.umask(0o077);
    let loaded = Vfs::load_with_config(&mut image.as_slice(), config)?;
    loaded.mkdir("/m", 0o777)?;
    assert_eq!(loaded.stat("/m")?.mode & 0o777, 0o700);
    Ok(())
}
