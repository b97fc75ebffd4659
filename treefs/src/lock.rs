//! Per-node locking and path resolution.
//!
//! Every operation that touches the tree goes through a [`LockSet`]. It walks
//! paths from the root, locks each node it passes, and releases everything
//! when it is dropped, on success and error paths alike.
//!
//! # Lock order
//!
//! Locks are requested in ascending `(depth, inumber)` order:
//!
//! * a walk always locks a node's parent before the node itself, and
//! * when several paths are walked together, the nodes needed at one depth
//!   are locked lowest inumber first, and a node shared by several paths is
//!   locked once, in the strongest mode any of them needs.
//!
//! A holder always holds every ancestor of the nodes it holds, so no node it
//! holds can be moved to a different depth underneath it. Every wait is
//! therefore for a node that sorts after everything the waiter holds, and no
//! cycle of waits can form.

use std::fmt;

use log::error;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::fs::FsError;
use crate::node::{Inode, Inumber, ROOT};
use crate::path::FsPath;
use crate::table::{InodeTable, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum LockMode {
    Read,
    Write,
}

enum Guard<'a> {
    Read(RwLockReadGuard<'a, Slot>),
    Write(RwLockWriteGuard<'a, Slot>),
}

impl Guard<'_> {
    fn mode(&self) -> LockMode {
        match self {
            Guard::Read(_) => LockMode::Read,
            Guard::Write(_) => LockMode::Write,
        }
    }

    fn node(&self) -> Option<&Inode> {
        match self {
            Guard::Read(slot) => Option::as_ref(slot),
            Guard::Write(slot) => Option::as_ref(slot),
        }
    }
}

/// The set of node locks held by one operation.
///
/// Each inumber appears at most once. Locks are released in reverse
/// acquisition order when the set is dropped.
pub(crate) struct LockSet<'a> {
    table: &'a InodeTable,
    held: Vec<(Inumber, Guard<'a>)>,
}

impl<'a> LockSet<'a> {
    pub(crate) fn new(table: &'a InodeTable) -> Self {
        Self {
            table,
            held: Vec::new(),
        }
    }

    pub(crate) fn mode(&self, inumber: Inumber) -> Option<LockMode> {
        self.position(inumber).map(|i| self.held[i].1.mode())
    }

    /// Inumbers held, in acquisition order.
    #[cfg(test)]
    fn inumbers(&self) -> Vec<Inumber> {
        self.held.iter().map(|(inumber, _)| *inumber).collect()
    }

    fn position(&self, inumber: Inumber) -> Option<usize> {
        self.held.iter().position(|(held, _)| *held == inumber)
    }

    /// Locks `inumber` in `mode` unless it is already held.
    ///
    /// A node already held for reading cannot be upgraded: releasing the read
    /// lock first would let the node change under the caller's ancestors, and
    /// waiting for the write lock while holding the read lock never finishes.
    pub(crate) fn lock(&mut self, inumber: Inumber, mode: LockMode) -> Result<(), FsError> {
        if let Some(held) = self.mode(inumber) {
            if held < mode {
                error!("inode {} held for reading, cannot lock it for writing", inumber);
                return Err(FsError::InvalidOperation);
            }
            return Ok(());
        }

        let table = self.table;
        let slot = table.slot(inumber).ok_or(FsError::NotFound)?;
        let guard = match mode {
            LockMode::Read => Guard::Read(slot.read()),
            LockMode::Write => Guard::Write(slot.write()),
        };
        self.held.push((inumber, guard));
        Ok(())
    }

    /// The node behind a held lock, read or write.
    pub(crate) fn read(&self, inumber: Inumber) -> Option<&Inode> {
        self.position(inumber).and_then(|i| self.held[i].1.node())
    }

    /// The node behind a held write lock.
    pub(crate) fn write(&mut self, inumber: Inumber) -> Option<&mut Inode> {
        let i = self.position(inumber)?;
        match &mut self.held[i].1 {
            Guard::Write(slot) => Option::as_mut(slot),
            Guard::Read(_) => None,
        }
    }

    /// Two distinct write-locked nodes at once, e.g. the source and
    /// destination directories of a move.
    pub(crate) fn write_pair(
        &mut self,
        a: Inumber,
        b: Inumber,
    ) -> Option<(&mut Inode, &mut Inode)> {
        if a == b {
            return None;
        }
        let mut first = None;
        let mut second = None;
        for (inumber, guard) in self.held.iter_mut() {
            if let Guard::Write(slot) = guard {
                if *inumber == a {
                    first = Option::as_mut(slot);
                } else if *inumber == b {
                    second = Option::as_mut(slot);
                }
            }
        }
        Some((first?, second?))
    }

    /// Frees a write-locked node. The lock itself stays held until the set is
    /// dropped. The root is never freed.
    pub(crate) fn free(&mut self, inumber: Inumber) -> Option<Inode> {
        if inumber == ROOT {
            error!("refusing to free the root inode");
            return None;
        }
        let table = self.table;
        let i = self.position(inumber)?;
        match &mut self.held[i].1 {
            Guard::Write(slot) => table.free(inumber, slot),
            Guard::Read(_) => None,
        }
    }

    /// Resolves a single path, locking every ancestor for reading and the
    /// final node in `mode`. The root is always part of the set.
    pub(crate) fn resolve(&mut self, path: &FsPath<'_>, mode: LockMode) -> Result<Inumber, FsError> {
        self.resolve_all(&[(path, mode)]).remove(0)
    }

    /// Resolves several paths together under one lock order.
    ///
    /// Nodes already held by this set are not locked again, so two paths that
    /// share ancestors (or end on the same node) hold each node exactly once.
    /// A path that fails stops contributing locks; whatever was locked before
    /// the failure stays in the set until it is released.
    pub(crate) fn resolve_all(
        &mut self,
        targets: &[(&FsPath<'_>, LockMode)],
    ) -> Vec<Result<Inumber, FsError>> {
        let mut cursors: Vec<Result<Inumber, FsError>> = vec![Ok(ROOT); targets.len()];

        let max_depth = targets.iter().map(|(path, _)| path.depth()).max().unwrap_or(0);
        for depth in 0..=max_depth {
            // The node each still-walking path needs at this depth, and in what mode.
            let mut wanted: Vec<(Inumber, LockMode)> = Vec::new();
            for (cursor, (path, mode)) in cursors.iter_mut().zip(targets.iter()) {
                let current = match *cursor {
                    Ok(current) if depth <= path.depth() => current,
                    _ => continue,
                };
                let next = if depth == 0 {
                    Ok(ROOT)
                } else {
                    self.child_of(current, path.components()[depth - 1])
                };
                match next {
                    Ok(next) => {
                        let need = if depth == path.depth() { *mode } else { LockMode::Read };
                        *cursor = Ok(next);
                        match wanted.iter_mut().find(|(inumber, _)| *inumber == next) {
                            Some(entry) => entry.1 = entry.1.max(need),
                            None => wanted.push((next, need)),
                        }
                    }
                    Err(e) => *cursor = Err(e),
                }
            }

            wanted.sort_by_key(|(inumber, _)| *inumber);
            for (inumber, mode) in wanted {
                if let Err(e) = self.lock(inumber, mode) {
                    for (cursor, (path, _)) in cursors.iter_mut().zip(targets.iter()) {
                        if depth <= path.depth() && matches!(cursor, Ok(c) if *c == inumber) {
                            *cursor = Err(e.clone());
                        }
                    }
                }
            }
        }
        cursors
    }

    /// Looks `name` up in a held directory.
    fn child_of(&self, parent: Inumber, name: &str) -> Result<Inumber, FsError> {
        let node = self.read(parent).ok_or(FsError::NotFound)?;
        let entries = node.entries().ok_or(FsError::NotADirectory)?;
        entries.lookup(name).ok_or(FsError::NotFound)
    }
}

/// Releases every lock, most recently acquired first.
impl Drop for LockSet<'_> {
    fn drop(&mut self) {
        while let Some(guard) = self.held.pop() {
            drop(guard);
        }
    }
}

impl fmt::Debug for LockSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.held.iter().map(|(inumber, guard)| (inumber, guard.mode())))
            .finish()
    }
}
