use std::fmt;

/// A normalized `/`-separated path.
///
/// Leading, trailing and repeated slashes carry no meaning: `"/a/b/"`, `"a/b"`
/// and `"//a//b"` all name the same node. The empty path (and `"/"`) is the
/// root directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsPath<'a> {
    components: Vec<&'a str>,
}

impl<'a> FsPath<'a> {
    pub fn parse(path: &'a str) -> Self {
        Self {
            components: path.split('/').filter(|c| !c.is_empty()).collect(),
        }
    }

    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Number of components, which is also the depth of the named node.
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> &[&'a str] {
        &self.components
    }

    /// Splits into `(parent, child_name)`. The root has no parent.
    pub fn split_parent(&self) -> Option<(FsPath<'a>, &'a str)> {
        let (child, parent) = self.components.split_last()?;
        Some((
            FsPath {
                components: parent.to_vec(),
            },
            *child,
        ))
    }

    /// True when `self` names a node strictly below `ancestor`.
    pub fn is_strictly_below(&self, ancestor: &FsPath<'_>) -> bool {
        self.depth() > ancestor.depth()
            && self
                .components
                .iter()
                .zip(ancestor.components.iter())
                .all(|(a, b)| a == b)
    }
}

impl fmt::Display for FsPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}
