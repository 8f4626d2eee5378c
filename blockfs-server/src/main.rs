mod command;
mod session;

use std::net::TcpListener;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};

use clap::Parser;
use log::{error, info, warn};
use threadpool::ThreadPool;

use blockfs::{BlockFs, Geometry};

#[derive(Parser, Debug)]
#[clap(
    name = "blockfs-server",
    version,
    about = "Serves a user-level block file system over a line-based TCP protocol"
)]
struct Cli {
    /// Port to listen on
    #[clap(long, short, default_value_t = 12345)]
    port: u16,
    /// Backing store for the metadata image
    #[clap(long, default_value = "filesystem.dat")]
    disk: PathBuf,
    /// Number of file slots in the catalog
    #[clap(long, default_value_t = 5)]
    max_files: usize,
    /// Number of storage blocks
    #[clap(long, default_value_t = 10)]
    blocks: usize,
    /// Block size in bytes
    #[clap(long, default_value_t = 128)]
    block_size: usize,
    /// Worker threads serving client connections
    #[clap(long, default_value_t = 4)]
    workers: usize,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let geom = Geometry {
        max_files: cli.max_files,
        total_blocks: cli.blocks,
        block_size: cli.block_size,
    };
    let fs = match BlockFs::mount(&cli.disk, geom) {
        Ok(fs) => fs,
        Err(e) => {
            error!("could not mount {}: {}", cli.disk.display(), e);
            process::exit(1);
        }
    };
    let shared = Arc::new(Mutex::new(fs));

    let listener = match TcpListener::bind(("127.0.0.1", cli.port)) {
        Ok(listener) => listener,
        Err(e) => {
            error!("could not listen on port {}: {}", cli.port, e);
            process::exit(1);
        }
    };
    info!("listening on 127.0.0.1:{}", cli.port);

    let pool = ThreadPool::new(cli.workers);
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let fs = Arc::clone(&shared);
                pool.execute(move || session::serve(stream, fs));
            }
            Err(e) => warn!("failed to accept connection: {}", e),
        }
    }
}
