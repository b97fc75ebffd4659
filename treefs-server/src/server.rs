use std::io::{self, ErrorKind};
use std::os::unix::net::{SocketAddr, UnixDatagram};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};
use thiserror::Error;
use treefs::TreeFs;
use zerocopy::AsBytes;

use crate::command::{Command, ERROR_OTHER};
use crate::wire::{decode_request, Response, MAX_REQUEST_SIZE};

/// How long a worker blocks in `recv_from` before checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("a worker thread panicked")]
    WorkerPanicked,
}

/// Serves one shared tree over a Unix datagram socket.
pub struct Server {
    socket: UnixDatagram,
    path: PathBuf,
    fs: Arc<TreeFs>,
}

impl Server {
    /// Binds `path`, replacing a stale socket file left behind by a previous run.
    pub fn bind<P: AsRef<Path>>(path: P, fs: Arc<TreeFs>) -> Result<Self, ServerError> {
        let path = path.as_ref().to_path_buf();
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => (),
        }
        let socket = UnixDatagram::bind(&path)?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;
        info!("listening on {}", path.display());
        Ok(Server { socket, path, fs })
    }

    /// Starts `workers` threads that share the socket. Each receives a
    /// request, applies it and replies to the sender.
    pub fn spawn(self, workers: usize) -> Result<ServerHandle, ServerError> {
        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers.max(1) {
            let socket = self.socket.try_clone()?;
            let fs = Arc::clone(&self.fs);
            let stop = Arc::clone(&stop);
            handles.push(thread::spawn(move || serve(id, &socket, &fs, &stop)));
        }
        Ok(ServerHandle {
            stop,
            workers: handles,
            path: self.path,
        })
    }
}

/// Running server. Dropping the handle leaves the workers running.
pub struct ServerHandle {
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    path: PathBuf,
}

impl ServerHandle {
    /// Blocks until every worker exits.
    pub fn wait(self) -> Result<(), ServerError> {
        for worker in self.workers {
            worker.join().map_err(|_| ServerError::WorkerPanicked)?;
        }
        Ok(())
    }

    /// Stops the workers after their current request and removes the socket file.
    pub fn shutdown(self) -> Result<(), ServerError> {
        self.stop.store(true, Ordering::SeqCst);
        let path = self.path.clone();
        self.wait()?;
        std::fs::remove_file(&path)?;
        info!("server on {} shut down", path.display());
        Ok(())
    }
}

fn serve(id: usize, socket: &UnixDatagram, fs: &TreeFs, stop: &AtomicBool) {
    // Leave room past the limit so an oversized request is seen as oversized
    // rather than silently truncated.
    let mut buf = [0u8; MAX_REQUEST_SIZE + 2];
    while !stop.load(Ordering::SeqCst) {
        let (len, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                continue
            }
            Err(e) => {
                error!("worker {}: receive failed: {}", id, e);
                continue;
            }
        };
        let code = handle_request(&buf[..len], fs);
        reply(socket, &from, code);
    }
    debug!("worker {} exiting", id);
}

/// Decodes, parses and applies one request. Never fails: problems with the
/// request itself are reported through the result code.
pub fn handle_request(request: &[u8], fs: &TreeFs) -> i32 {
    let text = match decode_request(request) {
        Ok(text) => text,
        Err(e) => {
            warn!("dropping request: {}", e);
            return ERROR_OTHER;
        }
    };
    match Command::parse(text) {
        Ok(Some(command)) => command.apply(fs),
        Ok(None) => ERROR_OTHER,
        Err(e) => {
            warn!("malformed request {:?}: {}", text, e);
            ERROR_OTHER
        }
    }
}

fn reply(socket: &UnixDatagram, to: &SocketAddr, code: i32) {
    let path = match to.as_pathname() {
        Some(path) => path,
        None => {
            warn!("request from an unbound socket, cannot reply");
            return;
        }
    };
    if let Err(e) = socket.send_to(Response::new(code).as_bytes(), path) {
        warn!("failed to reply to {}: {}", path.display(), e);
    }
}
