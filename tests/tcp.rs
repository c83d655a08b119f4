use std::io::Cursor;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use nfs_gateway::handler::{CachingHandler, FsHandler, NullAuthHandler};
use nfs_gateway::memfs::MemFs;
use nfs_gateway::protocol::rpc::write_fragment;
use nfs_gateway::tcp::{NFSTcp, NFSTcpListener};
use nfs_gateway::xdr::{self, mount, nfs3, Serialize};

async fn read_record(stream: &mut TcpStream) -> Vec<u8> {
    let mut record = Vec::new();
    loop {
        let header = stream.read_u32().await.expect("fragment header");
        let mut fragment = vec![0; (header & !(1 << 31)) as usize];
        stream.read_exact(&mut fragment).await.expect("fragment body");
        record.extend(fragment);
        if header & (1 << 31) != 0 {
            return record;
        }
    }
}

async fn call(stream: &mut TcpStream, xid: u32, prog: u32, vers: u32, proc: u32, args: &[u8]) -> Cursor<Vec<u8>> {
    let call = xdr::rpc::call_body {
        rpcvers: 2,
        prog,
        vers,
        proc,
        cred: xdr::rpc::opaque_auth::default(),
        verf: xdr::rpc::opaque_auth::default(),
    };
    let mut buf = Vec::new();
    xdr::rpc::rpc_msg { xid, body: xdr::rpc::rpc_body::CALL(call) }
        .serialize(&mut buf)
        .expect("serialize call");
    buf.extend_from_slice(args);
    write_fragment(stream, &buf).await.expect("send call");

    let reply = timeout(Duration::from_secs(5), read_record(stream)).await.expect("reply timeout");
    let mut reply = Cursor::new(reply);
    let msg = xdr::deserialize::<xdr::rpc::rpc_msg>(&mut reply).expect("deserialize reply");
    assert_eq!(msg.xid, xid);
    reply
}

#[tokio::test]
async fn mount_and_getattr_over_tcp() {
    let handler = CachingHandler::new(NullAuthHandler::new(FsHandler::new(MemFs::new())), 64);
    let listener = NFSTcpListener::bind("127.0.0.1:0", handler).await.expect("bind");
    let port = listener.get_listen_port();
    assert_ne!(port, 0);
    tokio::spawn(async move {
        let _ = listener.handle_forever().await;
    });

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");

    let mut reply = call(&mut stream, 1, nfs3::PROGRAM, nfs3::VERSION, 0, &[]).await;
    assert_eq!(reply.position() as usize, reply.get_ref().len());

    let mut path = Vec::new();
    b"/".to_vec().serialize(&mut path).expect("serialize path");
    let mut reply = call(&mut stream, 2, mount::PROGRAM, mount::VERSION, 1, &path).await;
    assert_eq!(xdr::deserialize::<u32>(&mut reply).expect("status"), 0);
    let mounted = xdr::deserialize::<mount::mountres3_ok>(&mut reply).expect("mountres3_ok");

    let mut fh = Vec::new();
    nfs3::nfs_fh3 { data: mounted.fhandle }.serialize(&mut fh).expect("serialize handle");
    let getattr = nfs3::NFSProgram::NFSPROC3_GETATTR as u32;
    let mut reply = call(&mut stream, 3, nfs3::PROGRAM, nfs3::VERSION, getattr, &fh).await;
    assert_eq!(xdr::deserialize::<u32>(&mut reply).expect("status"), 0);
    let attr = xdr::deserialize::<nfs3::fattr3>(&mut reply).expect("fattr3");
    assert_eq!(attr.ftype, nfs3::ftype3::NF3DIR);

    stream.shutdown().await.expect("shutdown");
}
