//! GETATTR (procedure 1), RFC 1813 section 3.3.1.
//!
//! GETATTR returns the full `fattr3` of an object. Clients use it to check
//! whether cached data is still valid and to learn sizes, modes and times.
//! Attributes are read from the backing store on every call.

use std::io::{Read, Write};

use tracing::debug;

use crate::error::NfsResultExt;
use crate::fs_util;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `GETATTR` procedure (procedure 1)
///
/// An unknown handle answers `NFS3ERR_STALE` with no attributes.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the file handle
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_getattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_getattr({:?},{:?}) ", xid, handle);

    let attr = match context.handler.from_handle(&handle) {
        Ok(path) => super::filesystem(context)
            .stat(&path)
            .await
            .or_nfs_error()
            .map(|meta| fs_util::path_fattr3(&path, &meta)),
        Err(stat) => Err(stat),
    };
    match attr {
        Ok(attr) => {
            debug!(" {:?} --> {:?}", xid, attr);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            attr.serialize(output)?;
        }
        Err(stat) => {
            debug!("nfsproc3_getattr error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
        }
    }
    Ok(())
}
