use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use blockfs::io::BlockStorage;
use blockfs::BlockFs;

use crate::command;

/// Serves one client connection: reads line-delimited commands and writes one
/// response line per command until the client quits or hangs up.
///
/// The engine lock is taken per command and released before the response is
/// written, so no session blocks the others on socket I/O.
pub fn serve<T: BlockStorage>(stream: TcpStream, fs: Arc<Mutex<BlockFs<T>>>) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!("client connected: {}", peer);

    let reader = match stream.try_clone() {
        Ok(read_half) => BufReader::new(read_half),
        Err(e) => {
            warn!("could not clone stream for {}: {}", peer, e);
            return;
        }
    };
    let mut writer = stream;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("read error from {}: {}", peer, e);
                break;
            }
        };
        let line = line.trim_end_matches('\r');
        debug!("{} -> {}", peer, line);

        let response = {
            let mut engine = fs.lock().expect("storage engine lock poisoned");
            command::process(&mut engine, line)
        };
        if writeln!(writer, "{}", response.text).is_err() {
            break;
        }
        if response.disconnect {
            break;
        }
    }
    info!("client disconnected: {}", peer);
}
