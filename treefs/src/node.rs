use crate::dir::DirEntries;

/// Index of an inode in the inode table. Unique among live inodes and reused
/// after the inode is freed.
pub type Inumber = usize;

/// The root directory always lives in the first slot and is never freed.
pub const ROOT: Inumber = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// Node payload. The variant is fixed when the inode is allocated and matches
/// the node's kind for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    File(Vec<u8>),
    Directory(DirEntries),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    content: Content,
}

impl Inode {
    /// An empty node of `kind`. Directories get `dir_capacity` entry slots.
    pub fn new(kind: NodeKind, dir_capacity: usize) -> Self {
        let content = match kind {
            NodeKind::File => Content::File(Vec::new()),
            NodeKind::Directory => Content::Directory(DirEntries::with_capacity(dir_capacity)),
        };
        Self { content }
    }

    pub fn kind(&self) -> NodeKind {
        match self.content {
            Content::File(_) => NodeKind::File,
            Content::Directory(_) => NodeKind::Directory,
        }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn entries(&self) -> Option<&DirEntries> {
        match &self.content {
            Content::Directory(entries) => Some(entries),
            Content::File(_) => None,
        }
    }

    pub fn entries_mut(&mut self) -> Option<&mut DirEntries> {
        match &mut self.content {
            Content::Directory(entries) => Some(entries),
            Content::File(_) => None,
        }
    }

    pub fn data(&self) -> Option<&[u8]> {
        match &self.content {
            Content::File(data) => Some(data),
            Content::Directory(_) => None,
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut Vec<u8>> {
        match &mut self.content {
            Content::File(data) => Some(data),
            Content::Directory(_) => None,
        }
    }
}
