use std::io::{self, ErrorKind};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use treefs::NodeKind;

use crate::wire::{encode_request, Response, WireError};

/// How long to wait for the server's reply before giving up.
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// A session with a tree server. The client binds its own socket path so the
/// server has somewhere to send replies; the file is removed on unmount.
pub struct Client {
    socket: UnixDatagram,
    server: PathBuf,
    own_path: PathBuf,
}

impl Client {
    pub fn mount<S, C>(server: S, own_path: C) -> Result<Self, ClientError>
    where
        S: AsRef<Path>,
        C: AsRef<Path>,
    {
        let own_path = own_path.as_ref().to_path_buf();
        match std::fs::remove_file(&own_path) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => (),
        }
        let socket = UnixDatagram::bind(&own_path)?;
        socket.set_read_timeout(Some(REPLY_TIMEOUT))?;
        Ok(Client {
            socket,
            server: server.as_ref().to_path_buf(),
            own_path,
        })
    }

    pub fn create(&self, path: &str, kind: NodeKind) -> Result<i32, ClientError> {
        let kind = match kind {
            NodeKind::File => 'f',
            NodeKind::Directory => 'd',
        };
        self.request(&format!("c {} {}", path, kind))
    }

    pub fn delete(&self, path: &str) -> Result<i32, ClientError> {
        self.request(&format!("d {}", path))
    }

    pub fn move_node(&self, from: &str, to: &str) -> Result<i32, ClientError> {
        self.request(&format!("m {} {}", from, to))
    }

    /// Returns the inumber on success or a negative code.
    pub fn lookup(&self, path: &str) -> Result<i32, ClientError> {
        self.request(&format!("l {}", path))
    }

    /// Asks the server to dump its tree into `out_file`, a path on the server's
    /// machine.
    pub fn print(&self, out_file: &str) -> Result<i32, ClientError> {
        self.request(&format!("p {}", out_file))
    }

    /// Closes the session and removes the client's socket file.
    pub fn unmount(self) -> Result<(), ClientError> {
        std::fs::remove_file(&self.own_path)?;
        Ok(())
    }

    fn request(&self, text: &str) -> Result<i32, ClientError> {
        self.socket.send_to(&encode_request(text)?, &self.server)?;
        let mut buf = [0u8; 4];
        let len = self.socket.recv(&mut buf)?;
        Ok(Response::parse(&buf[..len])?.code())
    }
}
