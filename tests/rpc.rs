use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

mod support;

use nfs_gateway::handler::{FsHandler, NfsHandler};
use nfs_gateway::memfs::MemFs;
use nfs_gateway::protocol::rpc::{handle_rpc, Context, SocketMessageHandler};
use nfs_gateway::vfs::BackingFs;
use nfs_gateway::xdr::{self, mount, nfs3, Serialize};

use support::{call_body, TestServer};

fn encode_call(xid: u32, call: xdr::rpc::call_body) -> Vec<u8> {
    let msg = xdr::rpc::rpc_msg { xid, body: xdr::rpc::rpc_body::CALL(call) };
    let mut msg_buf = Vec::new();
    msg.serialize(&mut msg_buf).expect("serialize rpc_msg");
    msg_buf
}

fn decode_reply(reply: Vec<u8>) -> xdr::rpc::rpc_msg {
    xdr::deserialize::<xdr::rpc::rpc_msg>(&mut Cursor::new(reply)).expect("deserialize reply")
}

fn accept_body(reply: Vec<u8>) -> xdr::rpc::accept_body {
    match decode_reply(reply).body {
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(accepted)) => {
            accepted.reply_data
        }
        other => panic!("expected MSG_ACCEPTED, got {:?}", other),
    }
}

#[tokio::test]
async fn rejects_oversized_rpc_fragment() {
    let server = TestServer::new();
    let (mut handler, mut socksend, mut msgrecv) = SocketMessageHandler::new(&server.context);

    let oversized = nfs_gateway::protocol::rpc::MAX_RPC_RECORD_LENGTH + 1;
    let fragment_header = (1_u32 << 31) | (oversized as u32);
    socksend.write_all(&fragment_header.to_be_bytes()).await.expect("write fragment header");

    let err = handler.read().await.expect_err("expected oversize error");
    assert!(err.to_string().contains("exceeds max"), "unexpected error: {err:?}");

    // the connection is told to close as well
    let closed = timeout(Duration::from_secs(1), msgrecv.recv())
        .await
        .expect("response timeout")
        .expect("response channel closed");
    assert!(closed.is_err());
}

#[tokio::test]
async fn answers_call_split_over_fragments() {
    let server = TestServer::new();
    let xid = support::next_xid();
    let msg_buf = encode_call(xid, call_body(nfs3::PROGRAM, nfs3::VERSION, 0));
    let (first, second) = msg_buf.split_at(msg_buf.len() / 2);

    let (mut handler, mut socksend, mut msgrecv) = SocketMessageHandler::new(&server.context);
    socksend.write_all(&(first.len() as u32).to_be_bytes()).await.expect("header");
    socksend.write_all(first).await.expect("first fragment");
    socksend
        .write_all(&((1_u32 << 31) | second.len() as u32).to_be_bytes())
        .await
        .expect("header");
    socksend.write_all(second).await.expect("last fragment");

    handler.read().await.expect("first read");
    handler.read().await.expect("second read");

    let response = timeout(Duration::from_secs(1), msgrecv.recv())
        .await
        .expect("response timeout")
        .expect("response channel closed")
        .expect("response error");
    let reply = decode_reply(response);
    assert_eq!(reply.xid, xid);
    support::assert_success(&reply);
}

#[tokio::test]
async fn returns_prog_mismatch_for_unsupported_nfs_version() {
    let server = TestServer::new();
    let reply = server.raw_call(call_body(nfs3::PROGRAM, nfs3::VERSION + 1, 0), &[]).await;
    match accept_body(reply) {
        xdr::rpc::accept_body::PROG_MISMATCH(info) => {
            assert_eq!(info.low, nfs3::VERSION);
            assert_eq!(info.high, nfs3::VERSION);
        }
        other => panic!("expected PROG_MISMATCH, got {:?}", other),
    }

    let reply = server.raw_call(call_body(mount::PROGRAM, 1, 0), &[]).await;
    assert!(matches!(accept_body(reply), xdr::rpc::accept_body::PROG_MISMATCH(_)));
}

#[tokio::test]
async fn returns_prog_unavail_for_unknown_program() {
    let server = TestServer::new();
    // portmapper is not served
    let reply = server.raw_call(call_body(100000, 2, 0), &[]).await;
    assert!(matches!(accept_body(reply), xdr::rpc::accept_body::PROG_UNAVAIL));
}

#[tokio::test]
async fn returns_proc_unavail_for_unknown_procedure() {
    let server = TestServer::new();
    let reply = server.raw_call(call_body(nfs3::PROGRAM, nfs3::VERSION, 22), &[]).await;
    assert!(matches!(accept_body(reply), xdr::rpc::accept_body::PROC_UNAVAIL));

    let reply = server.raw_call(call_body(mount::PROGRAM, mount::VERSION, 6), &[]).await;
    assert!(matches!(accept_body(reply), xdr::rpc::accept_body::PROC_UNAVAIL));
}

#[tokio::test]
async fn truncated_arguments_fail_the_call_without_reply() {
    let server = TestServer::new();
    // a diropargs3 cut off after the handle length
    let mut input = encode_call(
        support::next_xid(),
        call_body(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_LOOKUP as u32),
    );
    input.extend_from_slice(&[0, 0, 0, 16]);

    let mut output = Cursor::new(Vec::new());
    let result = handle_rpc(&mut Cursor::new(input), &mut output, server.context.clone()).await;
    assert!(result.is_err());
    assert!(output.into_inner().is_empty());
}

#[tokio::test]
async fn truncated_arguments_close_the_connection() {
    let server = TestServer::new();
    let mut msg_buf = encode_call(
        support::next_xid(),
        call_body(nfs3::PROGRAM, nfs3::VERSION, nfs3::NFSProgram::NFSPROC3_GETATTR as u32),
    );
    msg_buf.extend_from_slice(&[0, 0]);

    let (mut handler, mut socksend, mut msgrecv) = SocketMessageHandler::new(&server.context);
    socksend
        .write_all(&((1_u32 << 31) | msg_buf.len() as u32).to_be_bytes())
        .await
        .expect("header");
    socksend.write_all(&msg_buf).await.expect("fragment");
    handler.read().await.expect("read");

    let response = timeout(Duration::from_secs(1), msgrecv.recv())
        .await
        .expect("response timeout")
        .expect("response channel closed");
    assert!(response.is_err(), "expected the connection to be closed");
}

#[tokio::test]
async fn rejects_wrong_rpc_version() {
    let server = TestServer::new();
    let mut call = call_body(nfs3::PROGRAM, nfs3::VERSION, 0);
    call.rpcvers = 3;
    let reply = server.raw_call(call, &[]).await;
    match decode_reply(reply).body {
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_DENIED(
            xdr::rpc::rejected_reply::RPC_MISMATCH(info),
        )) => {
            assert_eq!(info.low, 2);
            assert_eq!(info.high, 2);
        }
        other => panic!("expected RPC_MISMATCH, got {:?}", other),
    }
}

/// Lets only AUTH_UNIX callers with uid 1000 through.
struct UidHandler {
    inner: FsHandler<MemFs>,
}

#[async_trait]
impl NfsHandler for UidHandler {
    fn authenticate(&self, cred: &xdr::rpc::opaque_auth) -> Result<(), xdr::rpc::auth_stat> {
        if cred.flavor != xdr::rpc::auth_flavor::AUTH_UNIX {
            return Err(xdr::rpc::auth_stat::AUTH_TOOWEAK);
        }
        let auth = xdr::deserialize::<xdr::rpc::auth_unix>(&mut Cursor::new(&cred.body))
            .map_err(|_| xdr::rpc::auth_stat::AUTH_BADCRED)?;
        if auth.uid == 1000 {
            Ok(())
        } else {
            Err(xdr::rpc::auth_stat::AUTH_REJECTEDCRED)
        }
    }

    async fn mount(&self, path: &Path) -> Result<PathBuf, mount::mountstat3> {
        self.inner.mount(path).await
    }

    fn filesystem(&self) -> &dyn BackingFs {
        self.inner.filesystem()
    }

    fn to_handle(&self, path: &Path) -> nfs3::nfs_fh3 {
        self.inner.to_handle(path)
    }

    fn from_handle(&self, fh: &nfs3::nfs_fh3) -> Result<PathBuf, nfs3::nfsstat3> {
        self.inner.from_handle(fh)
    }

    fn invalidate_handle(&self, fh: &nfs3::nfs_fh3) {
        self.inner.invalidate_handle(fh)
    }

    fn invalidate_path(&self, path: &Path) {
        self.inner.invalidate_path(path)
    }

    fn handle_limit(&self) -> usize {
        self.inner.handle_limit()
    }
}

fn unix_cred(uid: u32) -> xdr::rpc::opaque_auth {
    let auth = xdr::rpc::auth_unix {
        stamp: 1,
        machinename: b"client".to_vec(),
        uid,
        gid: uid,
        gids: vec![uid],
    };
    let mut body = Vec::new();
    auth.serialize(&mut body).expect("serialize auth_unix");
    xdr::rpc::opaque_auth { flavor: xdr::rpc::auth_flavor::AUTH_UNIX, body }
}

async fn call_with_cred(context: &Context, xid: u32, cred: xdr::rpc::opaque_auth) -> Vec<u8> {
    let mut call = call_body(nfs3::PROGRAM, nfs3::VERSION, 0);
    call.cred = cred;
    let mut output = Cursor::new(Vec::new());
    handle_rpc(&mut Cursor::new(encode_call(xid, call)), &mut output, context.clone())
        .await
        .expect("handle_rpc");
    output.into_inner()
}

#[tokio::test]
async fn handler_decides_authentication() {
    let context = Context::new(Arc::new(UidHandler { inner: FsHandler::new(MemFs::new()) }));

    let reply = decode_reply(call_with_cred(&context, 1, unix_cred(1000)).await);
    support::assert_success(&reply);

    for (xid, cred, expected) in [
        (2, unix_cred(0), xdr::rpc::auth_stat::AUTH_REJECTEDCRED),
        (3, xdr::rpc::opaque_auth::default(), xdr::rpc::auth_stat::AUTH_TOOWEAK),
    ] {
        match decode_reply(call_with_cred(&context, xid, cred).await).body {
            xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_DENIED(
                xdr::rpc::rejected_reply::AUTH_ERROR(stat),
            )) => assert_eq!(stat, expected),
            other => panic!("expected AUTH_ERROR, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn retransmitted_call_is_not_answered_twice() {
    let server = TestServer::new();
    let call = encode_call(4242, call_body(nfs3::PROGRAM, nfs3::VERSION, 0));

    let mut output = Cursor::new(Vec::new());
    let replied = handle_rpc(&mut Cursor::new(call.clone()), &mut output, server.context.clone())
        .await
        .expect("first call");
    assert!(replied);

    let mut output = Cursor::new(Vec::new());
    let replied = handle_rpc(&mut Cursor::new(call), &mut output, server.context.clone())
        .await
        .expect("retransmission");
    assert!(!replied);
    assert!(output.into_inner().is_empty());
}

#[tokio::test]
async fn reply_in_place_of_call_is_an_error() {
    let server = TestServer::new();
    let mut buf = Vec::new();
    xdr::rpc::make_success_reply(9).serialize(&mut buf).expect("serialize");
    let mut output = Cursor::new(Vec::new());
    let res = handle_rpc(&mut Cursor::new(buf), &mut output, server.context.clone()).await;
    assert!(res.is_err());
}
