#![cfg(unix)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use nfs_gateway::localfs::LocalFs;
use nfs_gateway::vfs::{BackingFs, FileKind, SetAttributes};

struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new() -> ScratchDir {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        let path = std::env::temp_dir().join(format!(
            "nfs-gateway-localfs-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&path).expect("create scratch dir");
        ScratchDir(path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[tokio::test]
async fn create_write_and_read_back() {
    let scratch = ScratchDir::new();
    let fs = LocalFs::new(&scratch.0);

    let meta = fs.create(Path::new("/a.txt"), 0o640, true).await.expect("create");
    assert_eq!(meta.kind, FileKind::File);
    assert_eq!(meta.mode & 0o600, 0o600);

    let meta = fs.write(Path::new("/a.txt"), 3, b"xyz").await.expect("write");
    assert_eq!(meta.size, 6);
    assert_eq!(std::fs::read(scratch.0.join("a.txt")).expect("local read"), b"\0\0\0xyz");

    let (data, eof) = fs.read(Path::new("/a.txt"), 3, 100).await.expect("read");
    assert_eq!(data, b"xyz");
    assert!(eof);
    let (data, eof) = fs.read(Path::new("/a.txt"), 0, 2).await.expect("read");
    assert_eq!(data.len(), 2);
    assert!(!eof);

    let err = fs.create(Path::new("/a.txt"), 0o644, true).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn directories_and_rename() {
    let scratch = ScratchDir::new();
    let fs = LocalFs::new(&scratch.0);

    let meta = fs.mkdir(Path::new("/sub"), 0o750).await.expect("mkdir");
    assert!(meta.is_dir());
    fs.create(Path::new("/sub/one"), 0o644, false).await.expect("create");
    fs.symlink(Path::new("/sub/link"), b"one").await.expect("symlink");

    let mut names: Vec<_> = fs
        .read_dir(Path::new("/sub"))
        .await
        .expect("read_dir")
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    names.sort();
    assert_eq!(names, vec![b"link".to_vec(), b"one".to_vec()]);

    assert!(fs.stat(Path::new("/sub/link")).await.expect("stat").is_symlink());
    assert_eq!(fs.read_link(Path::new("/sub/link")).await.expect("read_link"), b"one");

    fs.rename(Path::new("/sub/one"), Path::new("/two")).await.expect("rename");
    assert!(fs.stat(Path::new("/sub/one")).await.is_err());
    assert!(fs.stat(Path::new("/two")).await.expect("stat").is_file());

    assert!(fs.remove_dir(Path::new("/sub")).await.is_err());
    fs.remove_file(Path::new("/sub/link")).await.expect("remove link");
    fs.remove_dir(Path::new("/sub")).await.expect("remove dir");
}

#[tokio::test]
async fn set_attr_truncates_and_changes_mode() {
    let scratch = ScratchDir::new();
    let fs = LocalFs::new(&scratch.0);
    fs.create(Path::new("/f"), 0o644, true).await.expect("create");
    fs.write(Path::new("/f"), 0, b"0123456789").await.expect("write");

    let attrs = SetAttributes { mode: Some(0o600), size: Some(4), ..Default::default() };
    let meta = fs.set_attr(Path::new("/f"), attrs).await.expect("set_attr");
    assert_eq!(meta.size, 4);
    assert_eq!(meta.mode, 0o600);
}

#[tokio::test]
async fn paths_stay_inside_root() {
    let scratch = ScratchDir::new();
    let inner = scratch.0.join("root");
    std::fs::create_dir(&inner).expect("mkdir");
    std::fs::write(scratch.0.join("outside"), b"secret").expect("write");
    let fs = LocalFs::new(&inner);

    assert!(fs.stat(Path::new("/../outside")).await.is_err());
}

#[tokio::test]
async fn read_only_store_rejects_mutations() {
    let scratch = ScratchDir::new();
    std::fs::write(scratch.0.join("f"), b"data").expect("write");
    let fs = LocalFs::new(&scratch.0).read_only();

    let err = fs.write(Path::new("/f"), 0, b"x").await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ReadOnlyFilesystem);
    let err = fs.mkdir(Path::new("/d"), 0o755).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ReadOnlyFilesystem);

    let (data, _) = fs.read(Path::new("/f"), 0, 16).await.expect("read");
    assert_eq!(data, b"data");
}

#[tokio::test]
async fn writes_past_the_size_limit_are_too_large() {
    let scratch = ScratchDir::new();
    let fs = LocalFs::new(&scratch.0);
    fs.create(Path::new("/f"), 0o644, true).await.expect("create");

    let err = fs.write(Path::new("/f"), u64::MAX - 1, b"xy").await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::FileTooLarge);
    let attrs = SetAttributes { size: Some(u64::MAX), ..Default::default() };
    let err = fs.set_attr(Path::new("/f"), attrs).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::FileTooLarge);
    assert_eq!(fs.stat(Path::new("/f")).await.expect("stat").size, 0);
}
