//! CREATE (procedure 8), RFC 1813 section 3.3.8.
//!
//! CREATE makes a new regular file in a directory. The client specifies:
//! - The file handle of the parent directory and the new name
//! - The creation mode and, for `UNCHECKED` and `GUARDED`, initial attributes
//!
//! `UNCHECKED` keeps an existing file, `GUARDED` and `EXCLUSIVE` fail with
//! `NFS3ERR_EXIST`. The exclusive create verifier is not stored, so a
//! retransmitted exclusive create of the same file also reports `EXIST`.
//!
//! On success the reply carries the new file's handle and attributes and the
//! parent directory's weak cache consistency data.

use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::error::NfsResultExt;
use crate::fs_util;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

const DEFAULT_FILE_MODE: u32 = 0o644;

/// Handles `NFSv3` `CREATE` procedure (procedure 8)
///
/// The file gets the requested mode, 0644 when none is given. Other
/// requested attributes are applied after the file exists.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `CREATE3args`
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_create(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::CREATE3args>(input)?;
    debug!("nfsproc3_create({:?}, {:?}) ", xid, args);

    if super::is_read_only(context) {
        warn!("No write capabilities.");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let dir = match context.handler.from_handle(&args.dirops.dir) {
        Ok(dir) => dir,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    // get the directory attributes before the change
    let pre_dir_attr = super::pre_op_attr(context, &dir).await;

    let (attr, exclusive) = match args.how {
        nfs3::createhow3::UNCHECKED(attr) => (attr, false),
        nfs3::createhow3::GUARDED(attr) => (attr, true),
        nfs3::createhow3::EXCLUSIVE(_) => (nfs3::sattr3::default(), true),
    };

    let fs = super::filesystem(context);
    let created = async {
        let path = super::child_path(&dir, &args.dirops.name)?;
        let mode = attr.mode.unwrap_or(DEFAULT_FILE_MODE);
        let mut meta = fs.create(&path, mode, exclusive).await.or_nfs_error()?;
        let changes = fs_util::sattr3_to_set_attributes(&attr);
        if !changes.is_empty() {
            meta = fs.set_attr(&path, changes).await.or_nfs_error()?;
        }
        Ok::<_, nfs3::nfsstat3>((path, meta))
    }
    .await;

    let post_dir_attr = super::post_op_attr(context, &dir).await;
    let dir_wcc = nfs3::wcc_data { before: pre_dir_attr, after: post_dir_attr };

    match created {
        Ok((path, meta)) => {
            let res = nfs3::diropres3ok {
                obj: Some(context.handler.to_handle(&path)),
                obj_attributes: Some(fs_util::path_fattr3(&path, &meta)),
                dir_wcc,
            };
            debug!("create success {:?} --> {:?}", xid, res);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            debug!("create error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_wcc.serialize(output)?;
        }
    }
    Ok(())
}
