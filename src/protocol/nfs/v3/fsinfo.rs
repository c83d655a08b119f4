//! FSINFO (procedure 19), RFC 1813 section 3.3.19.
//!
//! Static limits a client uses to size its requests:
//! - read and write transfer sizes and their preferred multiples
//! - the preferred READDIR request size
//! - the largest file the backing store accepts
//! - server time precision (`time_delta`)
//! - file system properties (symlinks, settable times)

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

const TRANSFER_MULTIPLE: u32 = 4096;
const PREFERRED_DIR_READ: u32 = 8192;

/// Handles `NFSv3` `FSINFO` procedure (procedure 19)
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the file handle of any object in the export
/// * `output` - Output stream for writing the response
/// * `context` - Server context holding the handler
pub async fn nfsproc3_fsinfo(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_fsinfo({:?},{:?}) ", xid, handle);

    let path = match context.handler.from_handle(&handle) {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };

    let fsinfo = nfs3::fs::fsinfo3 {
        obj_attributes: super::post_op_attr(context, &path).await,
        rtmax: super::MAX_TRANSFER_SIZE,
        rtpref: super::MAX_TRANSFER_SIZE,
        rtmult: TRANSFER_MULTIPLE,
        wtmax: super::MAX_TRANSFER_SIZE,
        wtpref: super::MAX_TRANSFER_SIZE,
        wtmult: TRANSFER_MULTIPLE,
        dtpref: PREFERRED_DIR_READ,
        maxfilesize: super::filesystem(context).max_file_size(),
        time_delta: nfs3::nfstime3 { seconds: 0, nseconds: 1 },
        properties: nfs3::fs::FSF_SYMLINK | nfs3::fs::FSF_HOMOGENEOUS | nfs3::fs::FSF_CANSETTIME,
    };
    debug!(" {:?} --> {:?}", xid, fsinfo);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
    fsinfo.serialize(output)?;
    Ok(())
}
