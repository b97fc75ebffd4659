use crate::node::Inumber;

/// A single occupied directory slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inumber: Inumber,
}

/// The fixed-capacity entry table owned by a directory inode.
///
/// Slots are scanned linearly. A `None` slot is free; inserts always take the
/// lowest free slot, so iteration order is insertion order except where a
/// removed entry's slot was reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntries {
    slots: Box<[Option<DirEntry>]>,
}

/// Returned by [`DirEntries::insert`] when every slot is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryFull;

impl DirEntries {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// A directory is empty iff all of its slots are free.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Exact, byte-for-byte name match.
    pub fn lookup(&self, name: &str) -> Option<Inumber> {
        self.iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.inumber)
    }

    pub fn insert(&mut self, name: &str, inumber: Inumber) -> Result<(), DirectoryFull> {
        debug_assert!(self.lookup(name).is_none(), "duplicate entry {}", name);
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.is_none())
            .ok_or(DirectoryFull)?;
        *slot = Some(DirEntry {
            name: name.to_string(),
            inumber,
        });
        Ok(())
    }

    /// Frees the slot holding `name`, returning the inumber it pointed at.
    pub fn remove(&mut self, name: &str) -> Option<Inumber> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(entry) if entry.name == name))?;
        slot.take().map(|entry| entry.inumber)
    }

    /// Occupied entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &DirEntry> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}
