//! Program/version/procedure lookup for incoming calls.

use std::collections::HashMap;

use num_traits::FromPrimitive;

use crate::protocol::xdr::{self, mount, nfs3};

/// A procedure this server implements.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Procedure {
    Nfs(nfs3::NFSProgram),
    Mount(mount::MountProgram),
}

/// Why a call could not be routed. Each maps onto an accepted RPC reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DispatchError {
    ProgUnavail,
    ProgMismatch { low: u32, high: u32 },
    ProcUnavail,
}

impl DispatchError {
    pub fn reply(self, xid: u32) -> xdr::rpc::rpc_msg {
        match self {
            DispatchError::ProgUnavail => xdr::rpc::prog_unavail_reply_message(xid),
            DispatchError::ProgMismatch { low, high } => {
                xdr::rpc::prog_mismatch_reply_message(xid, low, high)
            }
            DispatchError::ProcUnavail => xdr::rpc::proc_unavail_reply_message(xid),
        }
    }
}

#[derive(Debug)]
struct ProgramEntry {
    low: u32,
    high: u32,
    procedures: HashMap<u32, Procedure>,
}

/// Immutable routing table, built once per listener and shared by all
/// connections.
#[derive(Debug)]
pub struct DispatchTable {
    programs: HashMap<u32, ProgramEntry>,
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchTable {
    /// NFS version 3 and MOUNT version 3.
    pub fn new() -> DispatchTable {
        let nfs_procedures = (0..=21)
            .filter_map(|proc| {
                nfs3::NFSProgram::from_u32(proc).map(|p| (proc, Procedure::Nfs(p)))
            })
            .collect();
        let mount_procedures = (0..=5)
            .filter_map(|proc| {
                mount::MountProgram::from_u32(proc).map(|p| (proc, Procedure::Mount(p)))
            })
            .collect();

        let mut programs = HashMap::new();
        programs.insert(
            nfs3::PROGRAM,
            ProgramEntry { low: nfs3::VERSION, high: nfs3::VERSION, procedures: nfs_procedures },
        );
        programs.insert(
            mount::PROGRAM,
            ProgramEntry {
                low: mount::VERSION,
                high: mount::VERSION,
                procedures: mount_procedures,
            },
        );
        DispatchTable { programs }
    }

    pub fn lookup(&self, prog: u32, vers: u32, proc: u32) -> Result<Procedure, DispatchError> {
        let program = self.programs.get(&prog).ok_or(DispatchError::ProgUnavail)?;
        if vers < program.low || vers > program.high {
            return Err(DispatchError::ProgMismatch { low: program.low, high: program.high });
        }
        program.procedures.get(&proc).copied().ok_or(DispatchError::ProcUnavail)
    }
}
