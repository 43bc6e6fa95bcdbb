//! Rename tests.

use memvfs::flags::{
    AT_FDCWD, O_CREAT, O_DIRECTORY, O_RDONLY, O_RDWR, RENAME_EXCHANGE, RENAME_NOREPLACE,
};
use memvfs::shim::fs::{read, rename, write};
use memvfs::{Error, Result, Vfs};
use std::path::PathBuf;

fn file(vfs: &Vfs, path: &str, contents: &[u8]) -> Result {
    let fd = vfs.open(path, O_CREAT | O_RDWR, 0o644)?;
    vfs.write(fd, contents)?;
    vfs.close(fd)
}

fn contents(vfs: &Vfs, path: &str) -> Result<Vec<u8>> {
    let fd = vfs.open(path, O_RDONLY, 0)?;
    let mut buf = vec![0; vfs.fstat(fd)?.size as usize];
    vfs.read(fd, &mut buf)?;
    vfs.close(fd)?;
    Ok(buf)
}

#[test]
fn rename_moves_the_entry() -> Result {
    let vfs = Vfs::new();
    file(&vfs, "/old", b"data")?;
    let ino = vfs.stat("/old")?.ino;

    vfs.rename("/old", "/new")?;
    assert!(matches!(vfs.stat("/old"), Err(Error::NotFound)));
    assert_eq!(vfs.stat("/new")?.ino, ino);
    assert_eq!(contents(&vfs, "/new")?, b"data");

    assert!(matches!(vfs.rename("/old", "/other"), Err(Error::NotFound)));
    Ok(())
}

#[test]
fn rename_replaces_the_destination() -> Result {
    let vfs = Vfs::new();
    file(&vfs, "/src", b"new contents")?;
    file(&vfs, "/dst", b"old contents")?;
    let src = vfs.stat("/src")?.ino;

    // A reader of the replaced file keeps its data.
    let held = vfs.open("/dst", O_RDONLY, 0)?;
    vfs.rename("/src", "/dst")?;
    assert_eq!(vfs.stat("/dst")?.ino, src);
    assert_eq!(contents(&vfs, "/dst")?, b"new contents");

    let mut buf = [0; 12];
    vfs.read(held, &mut buf)?;
    assert_eq!(&buf, b"old contents");
    assert_eq!(vfs.fstat(held)?.nlink, 0);
    Ok(())
}

#[test]
fn renaming_onto_a_hard_link_of_itself_is_a_no_op() -> Result {
    let vfs = Vfs::new();
    file(&vfs, "/a", b"x")?;
    vfs.link("/a", "/b")?;
    vfs.rename("/a", "/b")?;
    assert!(vfs.stat("/a").is_ok());
    assert_eq!(vfs.stat("/b")?.nlink, 2);
    Ok(())
}

#[test]
fn directory_moves_update_parents() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/from", 0o755)?;
    vfs.mkdir("/to", 0o755)?;
    vfs.mkdir("/from/child", 0o755)?;
    file(&vfs, "/from/child/leaf", b"leaf")?;

    vfs.rename("/from/child", "/to/moved")?;
    vfs.chdir("/to/moved")?;
    assert_eq!(vfs.current_dir()?, PathBuf::from("/to/moved"));
    assert_eq!(vfs.stat("/from")?.nlink, 2);
    assert_eq!(vfs.stat("/to")?.nlink, 3);

    // `..` now leads to the new parent.
    assert_eq!(vfs.stat("..")?.ino, vfs.stat("/to")?.ino);
    assert_eq!(contents(&vfs, "leaf")?, b"leaf");
    Ok(())
}

#[test]
fn open_directory_cannot_be_replaced() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/a", 0o755)?;
    vfs.mkdir("/b", 0o755)?;
    let held = vfs.open("/b", O_DIRECTORY | O_RDONLY, 0)?;

    assert!(matches!(vfs.rename("/a", "/b"), Err(Error::Busy)));
    assert!(vfs.stat("/a")?.is_dir());
    vfs.mkdirat(held, "child", 0o755)?;
    assert_eq!(vfs.stat("/b/child")?.nlink, 2);
    vfs.rmdir("/b/child")?;

    vfs.close(held)?;
    vfs.rename("/a", "/b")?;
    assert!(matches!(vfs.stat("/a"), Err(Error::NotFound)));
    assert!(format!("{vfs:?}").contains("inodes: 2"));
    Ok(())
}

#[test]
fn directory_replaces_an_empty_directory() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/a", 0o755)?;
    vfs.mkdir("/b", 0o755)?;
    vfs.mkdir("/full", 0o755)?;
    file(&vfs, "/full/f", b"")?;
    assert_eq!(vfs.stat("/")?.nlink, 5);

    vfs.rename("/a", "/b")?;
    assert_eq!(vfs.stat("/")?.nlink, 4);
    assert!(matches!(vfs.rename("/b", "/full"), Err(Error::NotEmpty)));
    Ok(())
}

#[test]
fn type_mismatches() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/dir", 0o755)?;
    file(&vfs, "/file", b"")?;
    assert!(matches!(vfs.rename("/dir", "/file"), Err(Error::NotDirectory)));
    assert!(matches!(vfs.rename("/file", "/dir"), Err(Error::IsDirectory)));
    assert!(matches!(vfs.rename("/file", "/new/"), Err(Error::NotDirectory)));

    // A trailing slash is fine on directories.
    vfs.rename("/dir/", "/renamed/")?;
    assert!(vfs.stat("/renamed")?.is_dir());
    Ok(())
}

#[test]
fn directory_cannot_move_into_itself() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/a", 0o755)?;
    vfs.mkdir("/a/b", 0o755)?;
    assert!(matches!(vfs.rename("/a", "/a/b/c"), Err(Error::InvalidArgument)));
    assert!(matches!(vfs.rename("/a", "/a/c"), Err(Error::InvalidArgument)));
    Ok(())
}

#[test]
fn busy_entries() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/d", 0o755)?;
    vfs.mkdir("/cwd", 0o755)?;
    assert!(matches!(vfs.rename("/", "/x"), Err(Error::Busy)));
    assert!(matches!(vfs.rename("/d/.", "/x"), Err(Error::Busy)));
    assert!(matches!(vfs.rename("/d", "/cwd/.."), Err(Error::Busy)));

    vfs.chdir("/cwd")?;
    assert!(matches!(vfs.rename("/cwd", "/elsewhere"), Err(Error::Busy)));
    assert!(matches!(vfs.rename("/d", "/cwd"), Err(Error::Busy)));
    Ok(())
}

#[test]
fn noreplace() -> Result {
    let vfs = Vfs::new();
    file(&vfs, "/a", b"a")?;
    file(&vfs, "/b", b"b")?;
    assert!(matches!(
        vfs.renameat2(AT_FDCWD, "/a", AT_FDCWD, "/b", RENAME_NOREPLACE),
        Err(Error::Exists)
    ));
    vfs.renameat2(AT_FDCWD, "/a", AT_FDCWD, "/c", RENAME_NOREPLACE)?;
    assert_eq!(contents(&vfs, "/c")?, b"a");
    assert!(matches!(
        vfs.renameat2(AT_FDCWD, "/b", AT_FDCWD, "/d", RENAME_NOREPLACE | RENAME_EXCHANGE),
        Err(Error::InvalidArgument)
    ));
    Ok(())
}

#[test]
fn exchange_swaps_entries() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/p", 0o755)?;
    vfs.mkdir("/q", 0o755)?;
    vfs.mkdir("/p/dir", 0o755)?;
    file(&vfs, "/q/file", b"file")?;
    let (dir, f) = (vfs.stat("/p/dir")?.ino, vfs.stat("/q/file")?.ino);

    vfs.renameat2(AT_FDCWD, "/p/dir", AT_FDCWD, "/q/file", RENAME_EXCHANGE)?;
    assert_eq!(vfs.stat("/p/dir")?.ino, f);
    assert_eq!(vfs.stat("/q/file")?.ino, dir);
    assert_eq!(vfs.stat("/p")?.nlink, 2);
    assert_eq!(vfs.stat("/q")?.nlink, 3);
    assert_eq!(vfs.stat("/q/file/..")?.ino, vfs.stat("/q")?.ino);

    assert!(matches!(
        vfs.renameat2(AT_FDCWD, "/p/dir", AT_FDCWD, "/p/none", RENAME_EXCHANGE),
        Err(Error::NotFound)
    ));
    Ok(())
}

#[test]
fn renameat_relative_to_descriptors() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/x", 0o755)?;
    vfs.mkdir("/y", 0o755)?;
    file(&vfs, "/x/f", b"moved")?;
    let x = vfs.open("/x", O_RDONLY | O_DIRECTORY, 0)?;
    let y = vfs.open("/y", O_RDONLY | O_DIRECTORY, 0)?;

    vfs.renameat(x, "f", y, "g")?;
    assert_eq!(contents(&vfs, "/y/g")?, b"moved");
    Ok(())
}

#[test]
fn shim_rename() -> Result {
    let vfs = Vfs::new();
    let _guard = vfs.enter();
    write("/one", b"1")?;
    rename("/one", "/two")?;
    assert_eq!(read("/two")?, b"1");
    assert_eq!(
        read("/one").unwrap_err().kind(),
        std::io::ErrorKind::NotFound
    );
    Ok(())
}
