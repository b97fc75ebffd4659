//! Front ends for a shared [`treefs::TreeFs`]: a batch runner that applies a
//! command file with a pool of worker threads, and a datagram server with a
//! matching client.
pub mod batch;
pub mod client;
pub mod command;
pub mod server;
pub mod wire;

pub use crate::batch::{run_batch, BatchError};
pub use crate::client::{Client, ClientError};
pub use crate::command::{Command, ParseError, ERROR_OTHER};
pub use crate::server::{Server, ServerError, ServerHandle};
