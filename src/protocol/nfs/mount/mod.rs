//! MOUNT version 3 procedures (RFC 1813 Appendix I).

use std::io::{Read, Write};
use std::path::PathBuf;

use crate::protocol::rpc;
use crate::protocol::xdr::mount;

mod dump;
mod export;
mod mnt;
mod null;
mod umnt;
mod umnt_all;

use dump::mountproc3_dump;
use export::mountproc3_export;
use mnt::mountproc3_mnt;
use null::mountproc3_null;
use umnt::mountproc3_umnt;
use umnt_all::mountproc3_umnt_all;

pub async fn handle_mount(
    xid: u32,
    proc: mount::MountProgram,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    match proc {
        mount::MountProgram::MOUNTPROC3_NULL => mountproc3_null(xid, output),
        mount::MountProgram::MOUNTPROC3_MNT => mountproc3_mnt(xid, input, output, context).await,
        mount::MountProgram::MOUNTPROC3_DUMP => mountproc3_dump(xid, output),
        mount::MountProgram::MOUNTPROC3_UMNT => {
            mountproc3_umnt(xid, input, output, context).await
        }
        mount::MountProgram::MOUNTPROC3_UMNTALL => {
            mountproc3_umnt_all(xid, output, context).await
        }
        mount::MountProgram::MOUNTPROC3_EXPORT => mountproc3_export(xid, output, context),
    }
}

/// Path inside the export that `dirpath` names, or `None` when `dirpath` is
/// outside of `export_name`.
fn export_relative(export_name: &str, dirpath: &str) -> Option<PathBuf> {
    let export = export_name.trim_end_matches('/');
    let rest = dirpath.strip_prefix(export)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }
    let rest = rest.trim_matches('/').trim();
    Some(PathBuf::from(format!("/{rest}")))
}
