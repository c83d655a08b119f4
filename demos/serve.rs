//! Serves a local directory, or an in-memory store when no directory is given.
//!
//! ```text
//! cargo run --example serve -- [--cache-size N] [--export NAME] [--read-only] [DIRECTORY]
//! mount -t nfs -o nolocks,vers=3,tcp,port=11111,mountport=11111,soft 127.0.0.1:/ mnt/
//! ```

use std::path::PathBuf;

use nfs_gateway::handler::{CachingHandler, FsHandler, NullAuthHandler, DEFAULT_HANDLE_LIMIT};
use nfs_gateway::localfs::LocalFs;
use nfs_gateway::memfs::MemFs;
use nfs_gateway::tcp::{NFSTcp, NFSTcpListener};
use nfs_gateway::vfs::BackingFs;

const HOSTPORT: u32 = 11111;

struct Options {
    cache_size: usize,
    export: Option<String>,
    read_only: bool,
    path: Option<PathBuf>,
}

fn usage() -> ! {
    eprintln!(
        "Usage: serve [--cache-size N] [--export NAME] [--read-only] [DIRECTORY]\n\
         \n\
         Options:\n\
           --cache-size N   Number of file handles kept alive (default: {DEFAULT_HANDLE_LIMIT})\n\
           --export NAME    Path clients mount (default: /)\n\
           --read-only      Refuse every modification\n\
           -h, --help       Show this help and exit"
    );
    std::process::exit(2);
}

fn parse_args() -> Options {
    let mut options =
        Options { cache_size: DEFAULT_HANDLE_LIMIT, export: None, read_only: false, path: None };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--cache-size" => match args.next().and_then(|n| n.parse().ok()) {
                Some(n) => options.cache_size = n,
                None => usage(),
            },
            "--export" => match args.next() {
                Some(name) => options.export = Some(name),
                None => usage(),
            },
            "--read-only" => options.read_only = true,
            "--help" | "-h" => usage(),
            _ if arg.starts_with('-') => {
                eprintln!("Unknown flag: {arg}");
                usage();
            }
            _ => {
                if options.path.is_some() {
                    eprintln!("Unexpected extra argument: {arg}");
                    usage();
                }
                options.path = Some(PathBuf::from(arg));
            }
        }
    }
    options
}

async fn serve<F: BackingFs + 'static>(fs: F, options: &Options) -> std::io::Result<()> {
    let handler = CachingHandler::new(NullAuthHandler::new(FsHandler::new(fs)), options.cache_size);
    let mut listener = NFSTcpListener::bind(&format!("0.0.0.0:{HOSTPORT}"), handler).await?;
    if let Some(export) = &options.export {
        listener.with_export_name(export);
    }
    listener.handle_forever().await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args();
    let result = match &options.path {
        Some(path) => {
            let fs = LocalFs::new(path.clone());
            let fs = if options.read_only { fs.read_only() } else { fs };
            serve(fs, &options).await
        }
        None => {
            let fs = MemFs::new();
            let fs = if options.read_only { fs.read_only() } else { fs };
            serve(fs, &options).await
        }
    };
    if let Err(e) = result {
        eprintln!("server failed: {e}");
        std::process::exit(1);
    }
}
