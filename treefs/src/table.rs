use log::trace;
use parking_lot::{Mutex, RwLock};

use crate::alloc::{Bitmap, NextAvailableAllocation, State};
use crate::fs::FsError;
use crate::node::{Inode, Inumber, NodeKind};

/// What a node lock protects: the inode itself, or `None` while the slot is free.
pub(crate) type Slot = Option<Inode>;

/// Fixed-capacity arena of inodes addressed by inumber.
///
/// Two kinds of locks guard the table and they are never conflated:
///
/// * `allocations` is the table-level allocation lock. It protects only the
///   occupancy bitmap and is held for the duration of a single bitmap update.
/// * Each slot has its own reader/writer lock protecting that inode's content.
///   Callers acquire these through [`crate::lock::LockSet`].
pub(crate) struct InodeTable {
    slots: Box<[RwLock<Slot>]>,
    allocations: Mutex<Bitmap>,
    dir_capacity: usize,
}

impl InodeTable {
    /// A table with every slot free.
    pub(crate) fn new(capacity: usize, dir_capacity: usize) -> Self {
        let slots: Vec<RwLock<Slot>> = (0..capacity).map(|_| RwLock::new(None)).collect();
        Self {
            slots: slots.into_boxed_slice(),
            allocations: Mutex::new(Bitmap::new(capacity)),
            dir_capacity,
        }
    }

    pub(crate) fn slot(&self, inumber: Inumber) -> Option<&RwLock<Slot>> {
        self.slots.get(inumber)
    }

    /// Reserves the lowest free slot and initializes it with an empty node of
    /// `kind`.
    ///
    /// The new inode is not reachable from any directory yet, so taking its
    /// node lock to fill it in cannot contend with a resolver. The only other
    /// possible holder is a `delete` that freed the slot and has not released
    /// its guard yet; it waits on nothing, so the wait here is bounded.
    pub(crate) fn allocate(&self, kind: NodeKind) -> Result<Inumber, FsError> {
        let inumber = {
            let mut map = self.allocations.lock();
            let inumber = NextAvailableAllocation::new(&map)
                .next()
                .ok_or(FsError::CapacityExceeded)?;
            map.set_reserved(inumber);
            inumber
        };

        *self.slots[inumber].write() = Some(Inode::new(kind, self.dir_capacity));
        trace!("allocated inode {} ({:?})", inumber, kind);
        Ok(inumber)
    }

    /// Releases the content of `inumber` and marks its slot free.
    ///
    /// `slot` must be the caller's write guard on that very inumber; this
    /// function does not lock or unlock the node itself.
    pub(crate) fn free(&self, inumber: Inumber, slot: &mut Slot) -> Option<Inode> {
        let node = slot.take();
        self.allocations.lock().set_free(inumber);
        trace!("freed inode {}", inumber);
        node
    }

    /// Frees a node that was allocated but never linked into a directory.
    pub(crate) fn discard(&self, inumber: Inumber) {
        let mut slot = self.slots[inumber].write();
        self.free(inumber, &mut slot);
    }

    #[cfg(test)]
    pub(crate) fn is_free(&self, inumber: Inumber) -> bool {
        inumber >= self.slots.len() || self.allocations.lock().get(inumber) == State::Free
    }

    /// Number of allocated slots.
    pub(crate) fn live_count(&self) -> usize {
        self.allocations.lock().count_used()
    }

    /// Releases all node storage. Exclusive access means no locking is needed.
    pub(crate) fn teardown(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.get_mut().take();
        }
        *self.allocations.get_mut() = Bitmap::new(self.slots.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_table_has_nothing_allocated() {
        let table = InodeTable::new(50, 20);
        assert_eq!(table.slots.len(), 50);
        assert_eq!(table.live_count(), 0);
        assert!((0..50).all(|i| table.is_free(i)));
    }

    #[test]
    fn allocation_is_first_fit_and_reuses_freed_slots() {
        let table = InodeTable::new(4, 2);
        assert_eq!(table.allocate(NodeKind::Directory).unwrap(), 0);
        assert_eq!(table.allocate(NodeKind::File).unwrap(), 1);
        assert_eq!(table.allocate(NodeKind::File).unwrap(), 2);

        table.discard(1);
        assert!(table.is_free(1));
        assert_eq!(table.allocate(NodeKind::Directory).unwrap(), 1);
    }

    #[test]
    fn allocation_initializes_content_for_kind() {
        let table = InodeTable::new(4, 7);
        let dir = table.allocate(NodeKind::Directory).unwrap();
        let file = table.allocate(NodeKind::File).unwrap();

        let dir_slot = table.slot(dir).unwrap().read();
        let entries = dir_slot.as_ref().and_then(Inode::entries).unwrap();
        assert!(entries.is_empty());
        assert_eq!(entries.capacity(), 7);

        let file_slot = table.slot(file).unwrap().read();
        assert_eq!(file_slot.as_ref().map(Inode::kind), Some(NodeKind::File));
    }

    #[test]
    fn full_table_refuses_allocation() {
        let table = InodeTable::new(2, 2);
        table.allocate(NodeKind::File).unwrap();
        table.allocate(NodeKind::File).unwrap();

        match table.allocate(NodeKind::File) {
            Err(FsError::CapacityExceeded) => (),
            other => panic!("expected capacity error, got {:?}", other),
        }
        assert_eq!(table.live_count(), 2);
    }

    #[test]
    fn free_clears_slot_under_callers_guard() {
        let table = InodeTable::new(2, 2);
        let inumber = table.allocate(NodeKind::File).unwrap();

        let mut guard = table.slot(inumber).unwrap().write();
        let node = table.free(inumber, &mut guard);
        assert_eq!(node.map(|n| n.kind()), Some(NodeKind::File));
        assert!(guard.is_none());
        drop(guard);

        assert!(table.is_free(inumber));
    }

    #[test]
    fn teardown_releases_everything() {
        let mut table = InodeTable::new(3, 2);
        table.allocate(NodeKind::Directory).unwrap();
        table.allocate(NodeKind::File).unwrap();

        table.teardown();
        assert_eq!(table.live_count(), 0);
        assert!(table.slot(0).unwrap().read().is_none());
    }
}
