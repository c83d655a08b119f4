//! READ (procedure 6), RFC 1813 section 3.3.6.
//!
//! READ returns data of a regular file. The client specifies:
//! - The file handle of the file
//! - The offset to start at
//! - The number of bytes it wants
//!
//! On success the server returns the file attributes, the data, its length
//! and whether the read reached the end of the file. At most `rtmax` bytes
//! are returned, whatever the client asked for.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::error::NfsResultExt;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `READ` procedure (procedure 6)
///
/// Reading a directory fails with `NFS3ERR_ISDIR`.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `READ3args`
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_read(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::READ3args>(input)?;
    debug!("nfsproc3_read({:?},{:?}) ", xid, args);

    let path = match context.handler.from_handle(&args.file) {
        Ok(path) => path,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };

    let count = args.count.min(super::MAX_TRANSFER_SIZE);
    let fs = super::filesystem(context);
    let result = match fs.stat(&path).await.or_nfs_error() {
        Ok(meta) if meta.is_dir() => Err(nfs3::nfsstat3::NFS3ERR_ISDIR),
        Ok(_) => fs.read(&path, args.offset, count).await.or_nfs_error(),
        Err(stat) => Err(stat),
    };
    let obj_attr = super::post_op_attr(context, &path).await;

    match result {
        Ok((data, eof)) => {
            let res = nfs3::file::READ3resok {
                file_attributes: obj_attr,
                count: data.len() as nfs3::count3,
                eof,
                data,
            };
            debug!(" {:?} --> read {} bytes, eof {}", xid, res.count, res.eof);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("read error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            obj_attr.serialize(output)?;
        }
    }
    Ok(())
}
