//! Wire protocols spoken by the server.
//!
//! - `xdr`: External Data Representation (RFC 4506) encoding and the message
//!   types of RPC, NFSv3 and MOUNT v3.
//!
//! - `rpc`: record marking, call routing, retransmission detection and the
//!   per-connection context (RFC 5531).
//!
//! - `nfs`: the procedures of the NFSv3 program (RFC 1813) and of the MOUNT
//!   v3 program (RFC 1813 appendix I).

pub mod nfs;
pub mod rpc;
pub mod xdr;
