use std::io::{self, Write};

use log::{debug, info};
use thiserror::Error;

use crate::dir::DirEntries;
use crate::lock::{LockMode, LockSet};
use crate::node::{Inode, Inumber, NodeKind, ROOT};
use crate::path::FsPath;
use crate::table::InodeTable;

/// Default number of inode slots.
pub const INODE_TABLE_SIZE: usize = 50;
/// Default number of entry slots per directory.
pub const MAX_DIR_ENTRIES: usize = 20;
/// Default upper bound, in bytes, on a single path component.
pub const MAX_FILE_NAME: usize = 100;

/// Result code reported for a successful operation.
pub const SUCCESS: i32 = 0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("an entry with that name already exists")]
    AlreadyExists,
    #[error("not a directory")]
    NotADirectory,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("inode table or directory is full")]
    CapacityExceeded,
    #[error("operation not permitted on this node")]
    InvalidOperation,
    #[error("invalid name: {0}")]
    InvalidName(String),
}

impl FsError {
    /// The negative result code carried over the wire for this error.
    pub fn code(&self) -> i32 {
        match self {
            FsError::AlreadyExists => -4,
            FsError::NotFound => -5,
            FsError::InvalidOperation => -10,
            // Same code as a malformed request on the wire; clients cannot
            // tell the two apart.
            FsError::InvalidName(_) => -11,
            FsError::NotADirectory => -13,
            FsError::CapacityExceeded => -14,
            FsError::DirectoryNotEmpty => -18,
        }
    }
}

/// Collapses an operation result into a wire result code.
pub fn result_code<T>(result: &Result<T, FsError>) -> i32 {
    match result {
        Ok(_) => SUCCESS,
        Err(e) => e.code(),
    }
}

/// Configures and initializes a [`TreeFs`].
///
/// ```
/// use treefs::{NodeKind, TreeFsBuilder};
///
/// let fs = TreeFsBuilder::new().with_inode_capacity(8).build().unwrap();
/// fs.create("/docs", NodeKind::Directory).unwrap();
/// assert_eq!(fs.lookup("/docs").unwrap(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct TreeFsBuilder {
    inode_capacity: usize,
    dir_capacity: usize,
    max_name_len: usize,
}

impl Default for TreeFsBuilder {
    fn default() -> Self {
        Self {
            inode_capacity: INODE_TABLE_SIZE,
            dir_capacity: MAX_DIR_ENTRIES,
            max_name_len: MAX_FILE_NAME,
        }
    }
}

impl TreeFsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total number of nodes, root included, the tree can hold.
    pub fn with_inode_capacity(mut self, inodes: usize) -> Self {
        self.inode_capacity = inodes;
        self
    }

    /// Sets how many entries each directory can hold.
    pub fn with_dir_capacity(mut self, entries: usize) -> Self {
        self.dir_capacity = entries;
        self
    }

    pub fn with_max_name_len(mut self, bytes: usize) -> Self {
        self.max_name_len = bytes;
        self
    }

    /// Creates the inode table and allocates the root directory. Fails only if
    /// the table cannot hold the root.
    pub fn build(self) -> Result<TreeFs, FsError> {
        let table = InodeTable::new(self.inode_capacity, self.dir_capacity);
        let root = table.allocate(NodeKind::Directory)?;
        debug_assert_eq!(root, ROOT);
        info!(
            "initialized tree with {} inodes, {} entries per directory",
            self.inode_capacity, self.dir_capacity
        );
        Ok(TreeFs {
            table,
            max_name_len: self.max_name_len,
        })
    }
}

/// An in-memory directory tree safe to share between threads.
///
/// Every operation locks the nodes it touches and has released all of them
/// by the time it returns, whatever the outcome. Failed
/// operations leave the tree unchanged.
pub struct TreeFs {
    table: InodeTable,
    max_name_len: usize,
}

impl TreeFs {
    /// Number of live inodes, root included.
    pub fn live_inodes(&self) -> usize {
        self.table.live_count()
    }

    /// Creates an empty file or directory at `path` and returns its inumber.
    pub fn create(&self, path: &str, kind: NodeKind) -> Result<Inumber, FsError> {
        self.create_node(&FsPath::parse(path), kind).map_err(|e| {
            debug!("failed to create {}: {}", path, e);
            e
        })
    }

    fn create_node(&self, path: &FsPath<'_>, kind: NodeKind) -> Result<Inumber, FsError> {
        let (parent_path, name) = path.split_parent().ok_or(FsError::AlreadyExists)?;
        self.check_name(name)?;

        let mut locks = LockSet::new(&self.table);
        let parent = locks.resolve(&parent_path, LockMode::Write)?;
        let entries = dir_entries(&locks, parent)?;
        if entries.lookup(name).is_some() {
            return Err(FsError::AlreadyExists);
        }

        let child = self.table.allocate(kind)?;
        let inserted = locks
            .write(parent)
            .and_then(Inode::entries_mut)
            .map(|entries| entries.insert(name, child).is_ok())
            .unwrap_or(false);
        if !inserted {
            self.table.discard(child);
            return Err(FsError::CapacityExceeded);
        }
        Ok(child)
    }

    /// Removes the file or empty directory at `path`.
    pub fn delete(&self, path: &str) -> Result<(), FsError> {
        self.delete_node(&FsPath::parse(path)).map_err(|e| {
            debug!("failed to delete {}: {}", path, e);
            e
        })
    }

    fn delete_node(&self, path: &FsPath<'_>) -> Result<(), FsError> {
        let (parent_path, name) = path.split_parent().ok_or(FsError::InvalidOperation)?;

        let mut locks = LockSet::new(&self.table);
        let parent = locks.resolve(&parent_path, LockMode::Write)?;
        let child = dir_entries(&locks, parent)?
            .lookup(name)
            .ok_or(FsError::NotFound)?;

        locks.lock(child, LockMode::Write)?;
        let child_node = locks.read(child).ok_or(FsError::NotFound)?;
        if matches!(child_node.entries(), Some(entries) if !entries.is_empty()) {
            return Err(FsError::DirectoryNotEmpty);
        }

        if let Some(entries) = locks.write(parent).and_then(Inode::entries_mut) {
            entries.remove(name);
        }
        locks.free(child);
        Ok(())
    }

    /// Moves the node at `src` to `dest`, keeping its inumber. Moving to a
    /// different name in the same directory is a rename.
    pub fn move_node(&self, src: &str, dest: &str) -> Result<(), FsError> {
        self.move_path(&FsPath::parse(src), &FsPath::parse(dest))
            .map_err(|e| {
                debug!("failed to move {} to {}: {}", src, dest, e);
                e
            })
    }

    fn move_path(&self, src: &FsPath<'_>, dest: &FsPath<'_>) -> Result<(), FsError> {
        let (src_parent, src_name) = src.split_parent().ok_or(FsError::InvalidOperation)?;
        let (dest_parent, dest_name) = dest.split_parent().ok_or(FsError::AlreadyExists)?;
        self.check_name(dest_name)?;
        // A node cannot become its own descendant.
        if dest.is_strictly_below(src) {
            return Err(FsError::InvalidOperation);
        }

        let mut locks = LockSet::new(&self.table);
        let mut parents = locks
            .resolve_all(&[
                (&src_parent, LockMode::Write),
                (&dest_parent, LockMode::Write),
            ])
            .into_iter();
        let (src_dir, dest_dir) = match (parents.next(), parents.next()) {
            (Some(src_dir), Some(dest_dir)) => (src_dir, dest_dir),
            _ => return Err(FsError::NotFound),
        };

        let dest_dir = dest_dir?;
        if dir_entries(&locks, dest_dir)?.lookup(dest_name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let src_dir = src_dir?;
        let moved = dir_entries(&locks, src_dir)?
            .lookup(src_name)
            .ok_or(FsError::NotFound)?;

        if src_dir == dest_dir {
            let entries = locks
                .write(src_dir)
                .and_then(Inode::entries_mut)
                .ok_or(FsError::NotADirectory)?;
            entries.remove(src_name);
            return entries
                .insert(dest_name, moved)
                .map_err(|_| FsError::CapacityExceeded);
        }

        let (from, to) = locks
            .write_pair(src_dir, dest_dir)
            .ok_or(FsError::NotFound)?;
        let (from, to) = match (from.entries_mut(), to.entries_mut()) {
            (Some(from), Some(to)) => (from, to),
            _ => return Err(FsError::NotADirectory),
        };
        if to.is_full() {
            return Err(FsError::CapacityExceeded);
        }
        from.remove(src_name);
        to.insert(dest_name, moved)
            .map_err(|_| FsError::CapacityExceeded)
    }

    /// Returns the inumber of the node at `path`. No lock is held on return.
    pub fn lookup(&self, path: &str) -> Result<Inumber, FsError> {
        let mut locks = LockSet::new(&self.table);
        locks.resolve(&FsPath::parse(path), LockMode::Read)
    }

    /// Looks up several paths while holding all of their locks at once, so the
    /// results describe a single state of the tree.
    pub fn lookup_many(&self, paths: &[&str]) -> Vec<Result<Inumber, FsError>> {
        let parsed: Vec<FsPath<'_>> = paths.iter().map(|p| FsPath::parse(p)).collect();
        let targets: Vec<(&FsPath<'_>, LockMode)> =
            parsed.iter().map(|p| (p, LockMode::Read)).collect();
        let mut locks = LockSet::new(&self.table);
        locks.resolve_all(&targets)
    }

    /// Replaces the content of the file at `path`.
    pub fn write_file(&self, path: &str, data: &[u8]) -> Result<(), FsError> {
        let mut locks = LockSet::new(&self.table);
        let inumber = locks.resolve(&FsPath::parse(path), LockMode::Write)?;
        let buf = locks
            .write(inumber)
            .ok_or(FsError::NotFound)?
            .data_mut()
            .ok_or(FsError::InvalidOperation)?;
        buf.clear();
        buf.extend_from_slice(data);
        Ok(())
    }

    /// Returns a copy of the content of the file at `path`.
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let mut locks = LockSet::new(&self.table);
        let inumber = locks.resolve(&FsPath::parse(path), LockMode::Read)?;
        locks
            .read(inumber)
            .ok_or(FsError::NotFound)?
            .data()
            .map(<[u8]>::to_vec)
            .ok_or(FsError::InvalidOperation)
    }

    /// Writes the whole tree to `out` in pre-order, one full path per line.
    /// The root prints as an empty line.
    ///
    /// Each node is read-locked while it and its subtree are printed, so the
    /// walk only ever holds one root-to-node chain of read locks.
    pub fn print_tree<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.print_node(ROOT, "", out)
    }

    fn print_node<W: Write>(&self, inumber: Inumber, name: &str, out: &mut W) -> io::Result<()> {
        let mut locks = LockSet::new(&self.table);
        locks
            .lock(inumber, LockMode::Read)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        writeln!(out, "{}", name)?;

        let children: Vec<(String, Inumber)> = match locks.read(inumber).and_then(Inode::entries) {
            Some(entries) => entries
                .iter()
                .map(|entry| (entry.name.clone(), entry.inumber))
                .collect(),
            None => return Ok(()),
        };
        for (child_name, child) in children {
            self.print_node(child, &format!("{}/{}", name, child_name), out)?;
        }
        Ok(())
    }

    /// Releases every node and returns how many were live, root included.
    pub fn teardown(mut self) -> usize {
        let released = self.release_all();
        info!("tree torn down, {} inodes released", released);
        released
    }

    fn release_all(&mut self) -> usize {
        let live = self.table.live_count();
        self.table.teardown();
        live
    }

    fn check_name(&self, name: &str) -> Result<(), FsError> {
        if name.len() > self.max_name_len {
            return Err(FsError::InvalidName(format!(
                "{} bytes exceeds the {} byte limit",
                name.len(),
                self.max_name_len
            )));
        }
        Ok(())
    }
}

/// Entries of a held directory.
fn dir_entries<'l>(locks: &'l LockSet<'_>, inumber: Inumber) -> Result<&'l DirEntries, FsError> {
    locks
        .read(inumber)
        .ok_or(FsError::NotFound)?
        .entries()
        .ok_or(FsError::NotADirectory)
}
