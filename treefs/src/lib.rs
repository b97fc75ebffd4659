//! An in-memory directory tree that many threads can modify at once.
//!
//! Nodes live in a fixed-capacity inode table; each directory owns a
//! fixed-capacity entry table mapping names to inumbers. Operations on
//! [`TreeFs`] lock the nodes along the paths they touch, in ascending
//! `(depth, inumber)` order, so concurrent creates, deletes, moves and prints
//! never deadlock. The table and its locks are only reachable through those
//! operations.
mod alloc;
mod dir;
mod fs;
mod lock;
mod node;
mod path;
mod table;

pub use crate::dir::{DirEntries, DirEntry};
pub use crate::fs::{
    result_code, FsError, TreeFs, TreeFsBuilder, INODE_TABLE_SIZE, MAX_DIR_ENTRIES,
    MAX_FILE_NAME, SUCCESS,
};
pub use crate::node::{Content, Inode, Inumber, NodeKind, ROOT};
pub use crate::path::FsPath;
