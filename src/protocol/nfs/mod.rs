//! Procedure implementations of the programs served: NFS version 3
//! ([`v3`]) and MOUNT version 3 ([`mount`]).

pub mod mount;
pub mod v3;
