//! Datagram encoding shared by the server and the client.
//!
//! A request is the command text (see [`crate::command::Command::parse`]),
//! optionally followed by NUL padding. A response is exactly one 4-byte
//! signed integer in big-endian order.

use thiserror::Error;
use zerocopy::byteorder::{BigEndian, I32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Longest command text accepted in one datagram.
pub const MAX_REQUEST_SIZE: usize = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("request of {0} bytes exceeds the size limit")]
    RequestTooLong(usize),
    #[error("request is not valid UTF-8")]
    InvalidUtf8,
    #[error("response must be 4 bytes, got {0}")]
    MalformedResponse(usize),
}

#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Clone, Copy, Debug)]
pub struct Response {
    code: I32<BigEndian>,
}

impl Response {
    pub fn new(code: i32) -> Self {
        Self {
            code: I32::new(code),
        }
    }

    pub fn code(&self) -> i32 {
        self.code.get()
    }

    pub fn parse(buf: &[u8]) -> Result<Self, WireError> {
        Response::read_from(buf).ok_or(WireError::MalformedResponse(buf.len()))
    }
}

pub fn encode_request(text: &str) -> Result<Vec<u8>, WireError> {
    if text.len() > MAX_REQUEST_SIZE {
        return Err(WireError::RequestTooLong(text.len()));
    }
    let mut buf = Vec::with_capacity(text.len() + 1);
    buf.extend_from_slice(text.as_bytes());
    buf.push(0);
    Ok(buf)
}

/// Extracts the command text, ignoring anything from the first NUL on.
pub fn decode_request(buf: &[u8]) -> Result<&str, WireError> {
    let end = buf.iter().position(|b| *b == 0).unwrap_or_else(|| buf.len());
    if end > MAX_REQUEST_SIZE {
        return Err(WireError::RequestTooLong(end));
    }
    std::str::from_utf8(&buf[..end]).map_err(|_| WireError::InvalidUtf8)
}
