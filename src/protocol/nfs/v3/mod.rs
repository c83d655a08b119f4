//! NFS version 3 procedures (RFC 1813 section 3.3).
//!
//! Every procedure decodes its arguments, resolves file handles through the
//! connection's [`crate::handler::NfsHandler`], runs the backing store
//! operation and encodes the result. Procedure errors are reported as an
//! `nfsstat3` inside a successful RPC reply; an `Err` from a procedure means
//! its arguments could not be decoded.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{self, NfsResult, NfsResultExt};
use crate::fs_util;
use crate::protocol::rpc;
use crate::protocol::xdr::nfs3;
use crate::vfs::{self, BackingFs, Capabilities};

mod access;
mod commit;
mod create;
mod fsinfo;
mod fsstat;
mod getattr;
mod link;
mod lookup;
mod mkdir;
mod mknod;
mod null;
mod pathconf;
mod read;
mod readdir;
mod readdirplus;
mod readlink;
mod remove;
mod rename;
mod rmdir;
mod setattr;
mod symlink;
mod write;

use access::nfsproc3_access;
use commit::nfsproc3_commit;
use create::nfsproc3_create;
use fsinfo::nfsproc3_fsinfo;
use fsstat::nfsproc3_fsstat;
use getattr::nfsproc3_getattr;
use link::nfsproc3_link;
use lookup::nfsproc3_lookup;
use mkdir::nfsproc3_mkdir;
use mknod::nfsproc3_mknod;
use null::nfsproc3_null;
use pathconf::nfsproc3_pathconf;
use read::nfsproc3_read;
use readdir::nfsproc3_readdir;
use readdirplus::nfsproc3_readdirplus;
use readlink::nfsproc3_readlink;
use remove::nfsproc3_remove;
use rename::nfsproc3_rename;
use rmdir::nfsproc3_rmdir;
use setattr::nfsproc3_setattr;
use symlink::nfsproc3_symlink;
use write::nfsproc3_write;

/// Largest READ and WRITE payload, reported by FSINFO as `rtmax`/`wtmax`.
const MAX_TRANSFER_SIZE: u32 = 1024 * 1024;

pub async fn handle_nfs(
    xid: u32,
    proc: nfs3::NFSProgram,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    use nfs3::NFSProgram::*;

    match proc {
        NFSPROC3_NULL => nfsproc3_null(xid, output),
        NFSPROC3_GETATTR => nfsproc3_getattr(xid, input, output, context).await,
        NFSPROC3_SETATTR => nfsproc3_setattr(xid, input, output, context).await,
        NFSPROC3_LOOKUP => nfsproc3_lookup(xid, input, output, context).await,
        NFSPROC3_ACCESS => nfsproc3_access(xid, input, output, context).await,
        NFSPROC3_READLINK => nfsproc3_readlink(xid, input, output, context).await,
        NFSPROC3_READ => nfsproc3_read(xid, input, output, context).await,
        NFSPROC3_WRITE => nfsproc3_write(xid, input, output, context).await,
        NFSPROC3_CREATE => nfsproc3_create(xid, input, output, context).await,
        NFSPROC3_MKDIR => nfsproc3_mkdir(xid, input, output, context).await,
        NFSPROC3_SYMLINK => nfsproc3_symlink(xid, input, output, context).await,
        NFSPROC3_MKNOD => nfsproc3_mknod(xid, input, output, context).await,
        NFSPROC3_REMOVE => nfsproc3_remove(xid, input, output, context).await,
        NFSPROC3_RMDIR => nfsproc3_rmdir(xid, input, output, context).await,
        NFSPROC3_RENAME => nfsproc3_rename(xid, input, output, context).await,
        NFSPROC3_LINK => nfsproc3_link(xid, input, output, context).await,
        NFSPROC3_READDIR => nfsproc3_readdir(xid, input, output, context).await,
        NFSPROC3_READDIRPLUS => nfsproc3_readdirplus(xid, input, output, context).await,
        NFSPROC3_FSSTAT => nfsproc3_fsstat(xid, input, output, context).await,
        NFSPROC3_FSINFO => nfsproc3_fsinfo(xid, input, output, context).await,
        NFSPROC3_PATHCONF => nfsproc3_pathconf(xid, input, output, context).await,
        NFSPROC3_COMMIT => nfsproc3_commit(xid, input, output, context).await,
    }
}

fn filesystem(context: &rpc::Context) -> &dyn BackingFs {
    context.handler.filesystem()
}

fn is_read_only(context: &rpc::Context) -> bool {
    filesystem(context).capabilities() == Capabilities::ReadOnly
}

/// Current attributes of `path`, `None` if they cannot be read.
async fn post_op_attr(context: &rpc::Context, path: &Path) -> nfs3::post_op_attr {
    let meta = filesystem(context).stat(path).await.ok()?;
    Some(fs_util::path_fattr3(path, &meta))
}

async fn pre_op_attr(context: &rpc::Context, path: &Path) -> nfs3::pre_op_attr {
    let meta = filesystem(context).stat(path).await.ok()?;
    Some(fs_util::metadata_to_wcc_attr(&meta))
}

/// Path of `name` inside `dir`. Dot entries are not valid here.
fn child_path(dir: &Path, name: &nfs3::filename3) -> NfsResult<PathBuf> {
    error::check_name(name)?;
    vfs::child_path(dir, name).or_nfs_error()
}
