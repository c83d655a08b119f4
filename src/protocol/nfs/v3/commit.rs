//! COMMIT (procedure 21), RFC 1813 section 3.3.21.
//!
//! Writes are stable when they are acknowledged, so there is nothing left to
//! flush. The reply carries the same verifier as WRITE replies; a client that
//! sees it change knows the server restarted.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `COMMIT` procedure (procedure 21)
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the file handle, offset and count to commit
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_commit(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::COMMIT3args>(input)?;
    debug!("nfsproc3_commit({:?},{:?})", xid, args);

    let path = match context.handler.from_handle(&args.file) {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let Some(attr) = super::post_op_attr(context, &path).await else {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    };

    let res = nfs3::file::COMMIT3resok {
        file_wcc: nfs3::wcc_data { before: None, after: Some(attr) },
        verf: context.write_verifier,
    };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
    res.serialize(output)?;
    Ok(())
}
