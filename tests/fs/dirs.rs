//! Directory operation tests.

use memvfs::flags::{AT_FDCWD, AT_REMOVEDIR, DT_DIR, DT_REG, O_DIRECTORY, O_RDONLY};
use memvfs::shim::fs::{create_dir_all, read_dir, remove_dir_all, write};
use memvfs::{DirentIter, Error, Result, Vfs};
use std::path::PathBuf;

#[test]
fn mkdir_rmdir() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/mydir", 0o755)?;
    assert!(vfs.stat("/mydir")?.is_dir());
    assert!(matches!(vfs.mkdir("/mydir", 0o755), Err(Error::Exists)));
    assert!(matches!(vfs.mkdir("/no/such", 0o755), Err(Error::NotFound)));

    vfs.rmdir("/mydir")?;
    assert!(matches!(vfs.stat("/mydir"), Err(Error::NotFound)));
    assert!(matches!(vfs.rmdir("/mydir"), Err(Error::NotFound)));
    Ok(())
}

#[test]
fn link_counts_follow_subdirectories() -> Result {
    let vfs = Vfs::new();
    assert_eq!(vfs.stat("/")?.nlink, 2);
    vfs.mkdir("/a", 0o755)?;
    vfs.mkdir("/a/b", 0o755)?;
    vfs.mkdir("/a/c", 0o755)?;
    assert_eq!(vfs.stat("/")?.nlink, 3);
    assert_eq!(vfs.stat("/a")?.nlink, 4);
    assert_eq!(vfs.stat("/a/b")?.nlink, 2);

    vfs.rmdir("/a/c")?;
    assert_eq!(vfs.stat("/a")?.nlink, 3);
    Ok(())
}

#[test]
fn rmdir_refusals() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/full", 0o755)?;
    vfs.close(vfs.creat("/full/file", 0o644)?)?;
    assert!(matches!(vfs.rmdir("/full"), Err(Error::NotEmpty)));
    assert!(matches!(vfs.rmdir("/full/file"), Err(Error::NotDirectory)));
    assert!(matches!(vfs.rmdir("/"), Err(Error::Busy)));
    assert!(matches!(vfs.rmdir("/full/."), Err(Error::InvalidArgument)));

    vfs.mkdir("/here", 0o755)?;
    vfs.chdir("/here")?;
    assert!(matches!(vfs.rmdir("/here"), Err(Error::Busy)));
    vfs.chdir("/")?;
    vfs.rmdir("/here")?;

    assert!(matches!(vfs.unlink("/full"), Err(Error::IsDirectory)));
    vfs.unlinkat(AT_FDCWD, "/full/file", 0)?;
    vfs.unlinkat(AT_FDCWD, "/full", AT_REMOVEDIR)?;
    Ok(())
}

#[test]
fn relative_paths_follow_the_current_directory() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/work", 0o755)?;
    vfs.mkdir("/work/sub", 0o755)?;
    vfs.chdir("/work/sub")?;
    assert_eq!(vfs.current_dir()?, PathBuf::from("/work/sub"));

    vfs.close(vfs.creat("here.txt", 0o644)?)?;
    assert!(vfs.stat("/work/sub/here.txt")?.is_file());

    vfs.chdir("..")?;
    assert_eq!(vfs.current_dir()?, PathBuf::from("/work"));
    assert!(vfs.stat("sub/here.txt")?.is_file());

    // `..` at the root stays at the root.
    vfs.chdir("/../..")?;
    assert_eq!(vfs.current_dir()?, PathBuf::from("/"));

    assert!(matches!(
        vfs.chdir("/work/sub/here.txt"),
        Err(Error::NotDirectory)
    ));
    Ok(())
}

#[test]
fn getcwd_needs_room_for_the_nul() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/abc", 0o755)?;
    vfs.chdir("/abc")?;

    let mut buf = [0xff; 5];
    assert_eq!(vfs.getcwd(&mut buf)?, 5);
    assert_eq!(&buf, b"/abc\0");
    assert!(matches!(vfs.getcwd(&mut [0; 4]), Err(Error::RangeTooSmall)));
    Ok(())
}

#[test]
fn fchdir_and_at_calls() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/base", 0o755)?;
    let dirfd = vfs.open("/base", O_RDONLY | O_DIRECTORY, 0)?;

    vfs.mkdirat(dirfd, "made", 0o700)?;
    assert_eq!(vfs.stat("/base/made")?.mode & 0o777, 0o700);

    // Absolute paths ignore the directory descriptor.
    vfs.mkdirat(dirfd, "/top", 0o755)?;
    assert!(vfs.stat("/top")?.is_dir());

    vfs.fchdir(dirfd)?;
    assert_eq!(vfs.current_dir()?, PathBuf::from("/base"));

    let file = vfs.creat("/base/f", 0o644)?;
    assert!(matches!(vfs.mkdirat(file, "x", 0o755), Err(Error::NotDirectory)));
    assert!(matches!(vfs.fchdir(file), Err(Error::NotDirectory)));
    Ok(())
}

#[test]
fn getdents_lists_every_entry() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/d", 0o755)?;
    vfs.mkdir("/d/sub", 0o755)?;
    vfs.close(vfs.creat("/d/file", 0o644)?)?;
    let sub = vfs.stat("/d/sub")?.ino;

    let fd = vfs.open("/d", O_RDONLY | O_DIRECTORY, 0)?;
    let mut buf = [0u8; 1024];
    let n = vfs.getdents(fd, &mut buf)?;
    let entries: Vec<_> = DirentIter::new(&buf[..n]).collect();
    let names: Vec<&[u8]> = entries.iter().map(|e| e.name.as_slice()).collect();
    assert_eq!(names.len(), 4);
    assert!(names.contains(&&b"."[..]));
    assert!(names.contains(&&b".."[..]));

    let dir = entries.iter().find(|e| e.name == b"sub").unwrap();
    assert_eq!((dir.ino, dir.kind), (sub, DT_DIR));
    let file = entries.iter().find(|e| e.name == b"file").unwrap();
    assert_eq!(file.kind, DT_REG);

    // Exhausted.
    assert_eq!(vfs.getdents(fd, &mut buf)?, 0);
    // Too small for a single record.
    let fd = vfs.open("/d", O_RDONLY | O_DIRECTORY, 0)?;
    assert!(matches!(vfs.getdents(fd, &mut [0; 8]), Err(Error::InvalidArgument)));
    Ok(())
}

#[test]
fn open_directory_cannot_be_removed() -> Result {
    let vfs = Vfs::new();
    vfs.mkdir("/held", 0o755)?;
    let fd = vfs.open("/held", O_RDONLY | O_DIRECTORY, 0)?;
    assert!(matches!(vfs.rmdir("/held"), Err(Error::Busy)));
    vfs.close(fd)?;
    vfs.rmdir("/held")?;
    Ok(())
}

#[test]
fn shim_listing_and_recursive_removal() -> Result {
    let vfs = Vfs::new();
    let _guard = vfs.enter();

    create_dir_all("/tree/a/b")?;
    write("/tree/one", b"1")?;
    write("/tree/a/two", b"2")?;

    let mut names: Vec<String> = read_dir("/tree")?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    names.sort();
    assert_eq!(names, ["a", "one"]);

    remove_dir_all("/tree")?;
    assert!(matches!(vfs.stat("/tree"), Err(Error::NotFound)));
    assert_eq!(vfs.stat("/")?.nlink, 2);
    Ok(())
}
