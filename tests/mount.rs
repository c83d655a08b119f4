use std::sync::Arc;

use num_traits::FromPrimitive;
use tokio::sync::mpsc;

mod support;

use nfs_gateway::xdr::{self, mount, nfs3};

use support::{read, NoArgs, TestServer};

fn read_mountstat(reply: &mut std::io::Cursor<Vec<u8>>) -> mount::mountstat3 {
    mount::mountstat3::from_u32(read::<u32>(reply)).expect("invalid mountstat3 value")
}

#[tokio::test]
async fn mnt_returns_root_handle() {
    let server = TestServer::new();
    let path: mount::dirpath = b"/".to_vec();

    let mut reply = server.mount(mount::MountProgram::MOUNTPROC3_MNT, &path).await;
    assert_eq!(read_mountstat(&mut reply), mount::mountstat3::MNT3_OK);
    let res = read::<mount::mountres3_ok>(&mut reply);
    assert_eq!(
        res.auth_flavors,
        vec![xdr::rpc::auth_flavor::AUTH_NULL as u32, xdr::rpc::auth_flavor::AUTH_UNIX as u32]
    );

    let root = nfs3::nfs_fh3 { data: res.fhandle };
    assert_eq!(root, server.root());
    let attr = server.getattr(&root).await.expect("getattr");
    assert_eq!(attr.ftype, nfs3::ftype3::NF3DIR);
}

#[tokio::test]
async fn mnt_of_subdirectory_below_named_export() {
    let mut server = TestServer::new();
    server.context.export_name = Arc::new("/data".to_string());
    let root = server.root();
    server.mkdir(&root, "sub").await;

    let path: mount::dirpath = b"/data/sub".to_vec();
    let mut reply = server.mount(mount::MountProgram::MOUNTPROC3_MNT, &path).await;
    assert_eq!(read_mountstat(&mut reply), mount::mountstat3::MNT3_OK);
    let res = read::<mount::mountres3_ok>(&mut reply);
    let sub = server.lookup(&root, "sub").await.expect("lookup");
    assert_eq!(res.fhandle, sub.data);

    let outside: [&[u8]; 3] = [b"/other", b"/database", b"/data/missing"];
    for path in outside {
        let mut reply = server.mount(mount::MountProgram::MOUNTPROC3_MNT, &path.to_vec()).await;
        assert_eq!(read_mountstat(&mut reply), mount::mountstat3::MNT3ERR_NOENT);
    }
}

#[tokio::test]
async fn mnt_of_file_is_notdir() {
    let server = TestServer::new();
    let root = server.root();
    server.create(&root, "file", 0o644).await.expect("create");

    let path: mount::dirpath = b"/file".to_vec();
    let mut reply = server.mount(mount::MountProgram::MOUNTPROC3_MNT, &path).await;
    assert_eq!(read_mountstat(&mut reply), mount::mountstat3::MNT3ERR_NOTDIR);
}

#[tokio::test]
async fn mount_and_unmount_are_signalled() {
    let mut server = TestServer::new();
    let (send, mut recv) = mpsc::channel(4);
    server.context.mount_signal = Some(send);

    let path: mount::dirpath = b"/".to_vec();
    let mut reply = server.mount(mount::MountProgram::MOUNTPROC3_MNT, &path).await;
    assert_eq!(read_mountstat(&mut reply), mount::mountstat3::MNT3_OK);
    assert_eq!(recv.recv().await, Some(true));

    let reply = server.mount(mount::MountProgram::MOUNTPROC3_UMNT, &path).await;
    // void result
    assert_eq!(reply.position() as usize, reply.get_ref().len());
    assert_eq!(recv.recv().await, Some(false));

    server.mount(mount::MountProgram::MOUNTPROC3_UMNTALL, &NoArgs).await;
    assert_eq!(recv.recv().await, Some(false));
}

#[tokio::test]
async fn export_lists_single_export() {
    let mut server = TestServer::new();
    server.context.export_name = Arc::new("/share".to_string());

    let mut reply = server.mount(mount::MountProgram::MOUNTPROC3_EXPORT, &NoArgs).await;
    assert!(read::<bool>(&mut reply));
    assert_eq!(read::<Vec<u8>>(&mut reply), b"/share");
    // no groups, no further exports
    assert!(!read::<bool>(&mut reply));
    assert!(!read::<bool>(&mut reply));

    let mut reply = server.mount(mount::MountProgram::MOUNTPROC3_DUMP, &NoArgs).await;
    assert!(!read::<bool>(&mut reply));
}
