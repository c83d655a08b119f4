#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use num_traits::FromPrimitive;

use nfs_gateway::handler::{CachingHandler, FsHandler, NullAuthHandler};
use nfs_gateway::memfs::MemFs;
use nfs_gateway::protocol::rpc::{handle_rpc, Context};
use nfs_gateway::xdr::{self, mount, nfs3, Deserialize, Serialize};

pub type TestHandler = CachingHandler<NullAuthHandler<FsHandler<MemFs>>>;

/// Server side of a test: the context calls go through and the handler
/// behind it, for direct access to the cache and the backing store.
pub struct TestServer {
    pub context: Context,
    pub handler: Arc<TestHandler>,
}

static NEXT_XID: AtomicU32 = AtomicU32::new(1);

/// Calls with the same xid would be answered from the retransmission tracker.
pub fn next_xid() -> u32 {
    NEXT_XID.fetch_add(1, Ordering::Relaxed)
}

impl TestServer {
    pub fn new() -> TestServer {
        TestServer::with_fs(MemFs::new(), 1024)
    }

    pub fn with_fs(fs: MemFs, handle_limit: usize) -> TestServer {
        let handler =
            Arc::new(CachingHandler::new(NullAuthHandler::new(FsHandler::new(fs)), handle_limit));
        let context = Context::new(handler.clone());
        TestServer { context, handler }
    }

    pub fn root(&self) -> nfs3::nfs_fh3 {
        use nfs_gateway::handler::NfsHandler;
        self.handler.to_handle(Path::new("/"))
    }

    /// Sends a raw call and returns the encoded reply.
    pub async fn raw_call(&self, call: xdr::rpc::call_body, args: &[u8]) -> Vec<u8> {
        let xid = next_xid();
        let mut input = Vec::new();
        xdr::rpc::rpc_msg { xid, body: xdr::rpc::rpc_body::CALL(call) }
            .serialize(&mut input)
            .expect("serialize call");
        input.extend_from_slice(args);

        let mut output = Cursor::new(Vec::new());
        let replied = handle_rpc(&mut Cursor::new(input), &mut output, self.context.clone())
            .await
            .expect("handle_rpc");
        assert!(replied, "call {xid} was not answered");
        output.into_inner()
    }

    /// Runs an NFSv3 procedure and returns the reply positioned at the
    /// procedure result, after checking the RPC header.
    pub async fn nfs<A: Serialize>(&self, proc: nfs3::NFSProgram, args: &A) -> Cursor<Vec<u8>> {
        self.program_call(nfs3::PROGRAM, nfs3::VERSION, proc as u32, args).await
    }

    pub async fn mount<A: Serialize>(
        &self,
        proc: mount::MountProgram,
        args: &A,
    ) -> Cursor<Vec<u8>> {
        self.program_call(mount::PROGRAM, mount::VERSION, proc as u32, args).await
    }

    async fn program_call<A: Serialize>(
        &self,
        prog: u32,
        vers: u32,
        proc: u32,
        args: &A,
    ) -> Cursor<Vec<u8>> {
        let mut encoded = Vec::new();
        args.serialize(&mut encoded).expect("serialize args");
        let reply = self.raw_call(call_body(prog, vers, proc), &encoded).await;

        let mut reply = Cursor::new(reply);
        let msg = xdr::deserialize::<xdr::rpc::rpc_msg>(&mut reply).expect("deserialize reply");
        assert_success(&msg);
        reply
    }

    pub async fn lookup(&self, dir: &nfs3::nfs_fh3, name: &str) -> Result<nfs3::nfs_fh3, nfs3::nfsstat3> {
        let args = nfs3::diropargs3 { dir: dir.clone(), name: name.into() };
        let mut reply = self.nfs(nfs3::NFSProgram::NFSPROC3_LOOKUP, &args).await;
        match read_status(&mut reply) {
            nfs3::nfsstat3::NFS3_OK => Ok(read::<nfs3::nfs_fh3>(&mut reply)),
            stat => Err(stat),
        }
    }

    pub async fn create(
        &self,
        dir: &nfs3::nfs_fh3,
        name: &str,
        mode: u32,
    ) -> Result<nfs3::diropres3ok, nfs3::nfsstat3> {
        let attr = nfs3::sattr3 { mode: Some(mode), ..Default::default() };
        let args = nfs3::CREATE3args {
            dirops: nfs3::diropargs3 { dir: dir.clone(), name: name.into() },
            how: nfs3::createhow3::UNCHECKED(attr),
        };
        let mut reply = self.nfs(nfs3::NFSProgram::NFSPROC3_CREATE, &args).await;
        match read_status(&mut reply) {
            nfs3::nfsstat3::NFS3_OK => Ok(read(&mut reply)),
            stat => Err(stat),
        }
    }

    pub async fn mkdir(&self, dir: &nfs3::nfs_fh3, name: &str) -> nfs3::nfs_fh3 {
        let args = nfs3::dir::MKDIR3args {
            dirops: nfs3::diropargs3 { dir: dir.clone(), name: name.into() },
            attributes: nfs3::sattr3::default(),
        };
        let mut reply = self.nfs(nfs3::NFSProgram::NFSPROC3_MKDIR, &args).await;
        assert_eq!(read_status(&mut reply), nfs3::nfsstat3::NFS3_OK);
        read::<nfs3::diropres3ok>(&mut reply).obj.expect("mkdir returns a handle")
    }

    pub async fn getattr(&self, fh: &nfs3::nfs_fh3) -> Result<nfs3::fattr3, nfs3::nfsstat3> {
        let mut reply = self.nfs(nfs3::NFSProgram::NFSPROC3_GETATTR, fh).await;
        match read_status(&mut reply) {
            nfs3::nfsstat3::NFS3_OK => Ok(read(&mut reply)),
            stat => Err(stat),
        }
    }
}

/// Arguments of a procedure that takes none.
pub struct NoArgs;

impl Serialize for NoArgs {
    fn serialize<W: std::io::Write>(&self, _dest: &mut W) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn call_body(prog: u32, vers: u32, proc: u32) -> xdr::rpc::call_body {
    xdr::rpc::call_body {
        rpcvers: xdr::rpc::RPC_VERSION,
        prog,
        vers,
        proc,
        cred: xdr::rpc::opaque_auth::default(),
        verf: xdr::rpc::opaque_auth::default(),
    }
}

pub fn assert_success(msg: &xdr::rpc::rpc_msg) {
    match &msg.body {
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(accepted)) => {
            assert!(
                matches!(accepted.reply_data, xdr::rpc::accept_body::SUCCESS),
                "expected SUCCESS, got {:?}",
                accepted.reply_data
            );
        }
        other => panic!("expected MSG_ACCEPTED, got {:?}", other),
    }
}

pub fn read<T: Deserialize + Default>(reply: &mut Cursor<Vec<u8>>) -> T {
    xdr::deserialize::<T>(reply).expect("deserialize result")
}

pub fn read_status(reply: &mut Cursor<Vec<u8>>) -> nfs3::nfsstat3 {
    let status_raw = read::<u32>(reply);
    nfs3::nfsstat3::from_u32(status_raw).expect("invalid nfsstat3 value")
}
