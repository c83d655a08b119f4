//! READDIR (procedure 16), RFC 1813 section 3.3.16.
//!
//! READDIR returns a page of directory entries. The client specifies:
//! - The file handle of the directory
//! - The cookie of the last entry it received, 0 to start
//! - The cookie verifier of the previous reply
//! - The maximum size of the reply
//!
//! Each entry carries its file id, name and cookie. Paging is done by
//! [`crate::dir_pager`]: `.` and `..` always come first, and a cookie from a
//! directory that changed since the verifier was issued fails with
//! `NFS3ERR_BAD_COOKIE`.

use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::dir_pager::{self, DirListing, PageBudget};
use crate::error::NfsResultExt;
use crate::fs_util;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `READDIR` procedure (procedure 16)
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `READDIR3args`
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_readdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::READDIR3args>(input)?;
    debug!("nfsproc3_readdir({:?},{:?}) ", xid, args);

    let dir = match context.handler.from_handle(&args.dir) {
        Ok(dir) => dir,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };

    let fs = super::filesystem(context);
    let dir_meta = match fs.stat(&dir).await.or_nfs_error() {
        Ok(meta) => meta,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };
    let dir_attr = Some(fs_util::path_fattr3(&dir, &dir_meta));
    if !dir_meta.is_dir() {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_NOTDIR.serialize(output)?;
        dir_attr.serialize(output)?;
        return Ok(());
    }

    let page = async {
        let listing = DirListing::read(fs, &dir, &dir_meta).await?;
        let start = listing.resume_index(args.cookie, &args.cookieverf)?;
        let page =
            dir_pager::paginate(&listing, start, PageBudget::readdir(args.count), |entry, cookie| {
                nfs3::dir::entry3 {
                    fileid: entry.fileid(),
                    name: entry.name.clone().into(),
                    cookie,
                }
            })?;
        Ok::<_, nfs3::nfsstat3>((listing.verifier(), page))
    }
    .await;

    match page {
        Ok((cookieverf, page)) => {
            trace!("readdir {:?} --> {} entries, eof {}", xid, page.entries.len(), page.eof);
            let res = nfs3::dir::READDIR3resok {
                dir_attributes: dir_attr,
                cookieverf,
                entries: page.entries,
                eof: page.eof,
            };
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            debug!("readdir error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_attr.serialize(output)?;
        }
    }
    Ok(())
}
