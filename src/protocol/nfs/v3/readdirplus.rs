//! READDIRPLUS (procedure 17), RFC 1813 section 3.3.17.
//!
//! Same paging as READDIR; every entry additionally carries its attributes
//! and a file handle. Handing out handles for a whole directory page is what
//! fills the handle cache fastest.

use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::dir_pager::{self, DirListing, PageBudget};
use crate::error::NfsResultExt;
use crate::fs_util;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles `NFSv3` `READDIRPLUS` procedure (procedure 17)
///
/// `dircount` limits the names, file ids and cookies of a page, `maxcount`
/// the whole reply including attributes and handles.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID
/// * `input` - Input stream containing the `READDIRPLUS3args`
/// * `output` - Output stream for writing the response
/// * `context` - Connection context holding the handler
pub async fn nfsproc3_readdirplus(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::READDIRPLUS3args>(input)?;
    debug!("nfsproc3_readdirplus({:?},{:?}) ", xid, args);

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
        let budget = PageBudget::readdirplus(args.dircount, args.maxcount);
        let mut page = dir_pager::paginate(&listing, start, budget, |entry, cookie| {
            nfs3::dir::entryplus3 {
                fileid: entry.fileid(),
                name: entry.name.clone().into(),
                cookie,
                name_attributes: Some(entry.attributes()),
                name_handle: None,
            }
        })?;
        // handles only for entries the client receives
        for (entry, listed) in page.entries.iter_mut().zip(&listing.entries()[start..]) {
            entry.name_handle = Some(context.handler.to_handle(&listed.path));
        }
        Ok::<_, nfs3::nfsstat3>((listing.verifier(), page))
    }
    .await;

    match page {
        Ok((cookieverf, page)) => {
            trace!("readdirplus {:?} --> {} entries, eof {}", xid, page.entries.len(), page.eof);
            let res = nfs3::dir::READDIRPLUS3resok {
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
            debug!("readdirplus error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_attr.serialize(output)?;
        }
    }
    Ok(())
}
