//! NFS Gateway - an NFS version 3 server over pluggable backing stores.
//!
//! The server speaks ONC RPC version 2 over TCP and implements the NFSv3
//! (RFC 1813) and MOUNT v3 programs. Objects are exported from a
//! [`vfs::BackingFs`], which only knows about paths; a
//! [`handler::NfsHandler`] maps those paths to the opaque file handles
//! clients hold on to.
//!
//! ## Main Components
//!
//! - `vfs`: the backing store interface, with [`memfs::MemFs`] (in memory)
//!   and [`localfs::LocalFs`] (a local directory) as implementations.
//!
//! - `handler`: authentication and handle management. [`handler::CachingHandler`]
//!   hands out fixed-size handles from an LRU cache so arbitrarily deep paths
//!   fit into the 64 byte NFS handle limit.
//!
//! - `dir_pager`: cookie and verifier based paging for READDIR and READDIRPLUS.
//!
//! - `tcp`: the listener that accepts client connections.
//!
//! - `protocol`: XDR encoding, RPC framing and dispatch, and the procedures
//!   of both programs.
//!
//! ## Usage
//!
//! ```no_run
//! use nfs_gateway::handler::{CachingHandler, FsHandler, NullAuthHandler};
//! use nfs_gateway::memfs::MemFs;
//! use nfs_gateway::tcp::{NFSTcp, NFSTcpListener};
//!
//! # async fn run() -> std::io::Result<()> {
//! let handler = CachingHandler::new(NullAuthHandler::new(FsHandler::new(MemFs::new())), 1024);
//! let listener = NFSTcpListener::bind("127.0.0.1:11111", handler).await?;
//! listener.handle_forever().await
//! # }
//! ```

pub mod dir_pager;
pub mod error;
pub mod fs_util;
pub mod handler;
#[cfg(unix)]
pub mod localfs;
pub mod memfs;
pub mod protocol;
pub mod tcp;
pub mod vfs;

pub use protocol::xdr;
