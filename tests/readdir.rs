use std::collections::HashSet;
use std::path::Path;

mod support;

use nfs_gateway::handler::NfsHandler;
use nfs_gateway::vfs::BackingFs;
use nfs_gateway::xdr::nfs3;

use support::{read, read_status, TestServer};

async fn readdir(
    server: &TestServer,
    dir: &nfs3::nfs_fh3,
    cookie: nfs3::cookie3,
    cookieverf: nfs3::cookieverf3,
    count: u32,
) -> Result<nfs3::dir::READDIR3resok, nfs3::nfsstat3> {
    let args = nfs3::dir::READDIR3args { dir: dir.clone(), cookie, cookieverf, count };
    let mut reply = server.nfs(nfs3::NFSProgram::NFSPROC3_READDIR, &args).await;
    match read_status(&mut reply) {
        nfs3::nfsstat3::NFS3_OK => Ok(read(&mut reply)),
        stat => Err(stat),
    }
}

async fn readdirplus(
    server: &TestServer,
    dir: &nfs3::nfs_fh3,
    cookie: nfs3::cookie3,
    cookieverf: nfs3::cookieverf3,
    dircount: u32,
    maxcount: u32,
) -> Result<nfs3::dir::READDIRPLUS3resok, nfs3::nfsstat3> {
    let args =
        nfs3::dir::READDIRPLUS3args { dir: dir.clone(), cookie, cookieverf, dircount, maxcount };
    let mut reply = server.nfs(nfs3::NFSProgram::NFSPROC3_READDIRPLUS, &args).await;
    match read_status(&mut reply) {
        nfs3::nfsstat3::NFS3_OK => Ok(read(&mut reply)),
        stat => Err(stat),
    }
}

async fn populated(files: usize) -> (TestServer, nfs3::nfs_fh3) {
    let server = TestServer::new();
    let root = server.root();
    let dir = server.mkdir(&root, "many").await;
    for i in 0..files {
        server.create(&dir, &format!("file{i:03}"), 0o644).await.expect("create");
    }
    (server, dir)
}

fn expected_names(files: usize) -> Vec<String> {
    let mut names = vec![".".to_string(), "..".to_string()];
    names.extend((0..files).map(|i| format!("file{i:03}")));
    names
}

#[tokio::test]
async fn empty_directory_lists_dot_entries() {
    let server = TestServer::new();
    let root = server.root();
    let dir = server.mkdir(&root, "empty").await;

    let res = readdir(&server, &dir, 0, [0; 8], 4096).await.expect("readdir");
    let names: Vec<String> = res.entries.iter().map(|e| e.name.to_string()).collect();
    assert_eq!(names, vec![".", ".."]);
    assert!(res.eof);
    assert_eq!(res.entries[0].cookie, 1);
    assert_eq!(res.entries[1].cookie, 2);
}

#[tokio::test]
async fn readdir_pages_cover_every_entry_once() {
    let (server, dir) = populated(100).await;

    for count in [512, 1024, 4096, 65536] {
        let mut names = Vec::new();
        let mut cookie = 0;
        let mut verf = [0; 8];
        let mut pages = 0;
        loop {
            let res = readdir(&server, &dir, cookie, verf, count).await.expect("readdir");
            pages += 1;
            assert!(!res.entries.is_empty(), "empty page with count {count}");
            names.extend(res.entries.iter().map(|e| e.name.to_string()));
            cookie = res.entries.last().map(|e| e.cookie).unwrap_or(cookie);
            verf = res.cookieverf;
            if res.eof {
                break;
            }
            assert!(pages < 200, "paging does not terminate with count {count}");
        }
        assert_eq!(names, expected_names(100), "count {count}");
        if count == 512 {
            assert!(pages > 1);
        }
    }
}

#[tokio::test]
async fn zero_verifier_is_accepted_when_resuming() {
    let (server, dir) = populated(100).await;

    let mut names = Vec::new();
    let mut cookie = 0;
    loop {
        let res = readdir(&server, &dir, cookie, [0; 8], 4096).await.expect("readdir");
        names.extend(res.entries.iter().map(|e| e.name.to_string()));
        cookie = res.entries.last().map(|e| e.cookie).unwrap_or(cookie);
        if res.eof {
            break;
        }
    }
    assert_eq!(names, expected_names(100));
}

#[tokio::test]
async fn readdirplus_pages_carry_handles_and_attributes() {
    let (server, dir) = populated(100).await;

    for (dircount, maxcount) in [(512, 4096), (4096, 2048), (8192, 32768)] {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut cookie = 0;
        let mut verf = [0; 8];
        loop {
            let res = readdirplus(&server, &dir, cookie, verf, dircount, maxcount)
                .await
                .expect("readdirplus");
            for entry in &res.entries {
                assert!(seen.insert(entry.cookie), "duplicate cookie {}", entry.cookie);
                let attr = entry.name_attributes.expect("attributes");
                assert_eq!(attr.fileid, entry.fileid);
                let handle = entry.name_handle.clone().expect("handle");
                assert_eq!(server.getattr(&handle).await.expect("getattr"), attr);
            }
            names.extend(res.entries.iter().map(|e| e.name.to_string()));
            cookie = res.entries.last().map(|e| e.cookie).unwrap_or(cookie);
            verf = res.cookieverf;
            if res.eof {
                break;
            }
        }
        assert_eq!(names, expected_names(100), "dircount {dircount} maxcount {maxcount}");
    }
}

#[tokio::test]
async fn changed_directory_invalidates_cookies() {
    let (server, dir) = populated(20).await;

    let first = readdir(&server, &dir, 0, [0; 8], 512).await.expect("readdir");
    assert!(!first.eof);
    let cookie = first.entries.last().expect("entries").cookie;

    server.create(&dir, "late", 0o644).await.expect("create");

    let res = readdir(&server, &dir, cookie, first.cookieverf, 512).await;
    assert_eq!(res.err(), Some(nfs3::nfsstat3::NFS3ERR_BAD_COOKIE));
}

#[tokio::test]
async fn cookie_past_the_end_is_rejected() {
    let (server, dir) = populated(3).await;
    let first = readdir(&server, &dir, 0, [0; 8], 4096).await.expect("readdir");
    assert!(first.eof);

    // resuming after the last entry yields an empty, final page
    let last = first.entries.last().expect("entries").cookie;
    let res = readdir(&server, &dir, last, first.cookieverf, 4096).await.expect("readdir");
    assert!(res.entries.is_empty());
    assert!(res.eof);

    let res = readdir(&server, &dir, last + 1, first.cookieverf, 4096).await;
    assert_eq!(res.err(), Some(nfs3::nfsstat3::NFS3ERR_BAD_COOKIE));
}

#[tokio::test]
async fn budget_too_small_for_one_entry() {
    let (server, dir) = populated(1).await;
    let res = readdir(&server, &dir, 0, [0; 8], 64).await;
    assert_eq!(res.err(), Some(nfs3::nfsstat3::NFS3ERR_TOOSMALL));
}

#[tokio::test]
async fn readdir_of_a_file_is_notdir() {
    let server = TestServer::new();
    let root = server.root();
    let file = server.create(&root, "plain", 0o644).await.expect("create").obj.expect("handle");
    let res = readdir(&server, &file, 0, [0; 8], 4096).await;
    assert_eq!(res.err(), Some(nfs3::nfsstat3::NFS3ERR_NOTDIR));
}

#[tokio::test]
async fn readdirplus_issues_handles_only_for_returned_entries() {
    let server = TestServer::new();
    let root = server.root();
    let dir = server.mkdir(&root, "quiet").await;
    let fs = server.handler.filesystem();
    for i in 0..50 {
        fs.create(Path::new(&format!("/quiet/file{i:03}")), 0o644, true).await.expect("create");
    }
    // root and the directory
    assert_eq!(server.handler.cache().len(), 2);

    let res = readdirplus(&server, &dir, 0, [0; 8], 8192, 2048).await.expect("readdirplus");
    assert!(!res.eof);
    let files_returned = res.entries.len() - 2;
    assert_eq!(server.handler.cache().len(), 2 + files_returned);

    let next = res.entries.last().expect("entries").cookie;
    let res = readdirplus(&server, &dir, next, res.cookieverf, 8192, 2048).await.expect("page");
    assert_eq!(server.handler.cache().len(), 2 + files_returned + res.entries.len());
}
