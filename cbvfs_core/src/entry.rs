//! The entry tree: one interface shared by every backend.
//!
//! Ownership flows strictly from a directory to its children. A child never
//! holds its parent; it only remembers the path derived from it at
//! construction, so an entry's path is stable for its lifetime.

use crate::error::{Error, Result};
use crate::upload::CookbookSource;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Shared handle to an entry.
pub type EntryRef = Arc<dyn Entry>;

/// A node in the virtual filesystem tree, directory or leaf.
pub trait Entry: fmt::Debug + Send + Sync {
    /// Name of the entry, unique among its siblings.
    fn name(&self) -> &str;

    /// Full path from the tree root (`/` for the root itself).
    fn path(&self) -> &str;

    /// Whether the entry is a directory.
    fn is_dir(&self) -> bool {
        false
    }

    /// List children, populating the cache on the first call.
    fn children(&self) -> Result<&[EntryRef]> {
        Err(Error::not_a_directory(self.path()))
    }

    /// Structural pre-check for creating a child. Performs no I/O.
    fn can_have_child(&self, _name: &str, _is_dir: bool) -> bool {
        false
    }

    /// Return the cached child called `name`, or a detached entry for it.
    ///
    /// A detached entry makes no claim that `name` exists.
    fn make_child_entry(&self, _name: &str) -> Result<EntryRef> {
        Err(Error::not_a_directory(self.path()))
    }

    /// Capability used by the upload staging protocol.
    fn as_cookbook_source(&self) -> Option<&dyn CookbookSource> {
        None
    }
}

/// Identity of an entry: its name and the path derived from its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    name: String,
    path: String,
}

impl Node {
    /// The root node, named `""` with path `/`.
    pub fn root() -> Self {
        Self {
            name: String::new(),
            path: "/".to_string(),
        }
    }

    /// A node named `name` under `parent_path`.
    pub fn child(parent_path: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        let path = if parent_path == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", parent_path, name)
        };
        Self { name, path }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Lazily populated, ordered children of a directory entry.
///
/// Once populated the same sequence, with the same child identities, is
/// returned until the owning entry is dropped.
#[derive(Default)]
pub struct ChildrenCache {
    cell: OnceLock<Vec<EntryRef>>,
}

impl ChildrenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached children, running `list` only if not yet populated.
    ///
    /// A failing `list` leaves the cache empty so a later call retries.
    pub fn get_or_try_init<F>(&self, list: F) -> Result<&[EntryRef]>
    where
        F: FnOnce() -> Result<Vec<EntryRef>>,
    {
        if let Some(children) = self.cell.get() {
            return Ok(children);
        }
        let children = list()?;
        // A concurrent first call may have won; its result is kept.
        Ok(self.cell.get_or_init(|| children))
    }

    /// Whether the cache has been populated.
    pub fn is_populated(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Find a cached child by name. Never triggers a listing.
    pub fn lookup(&self, name: &str) -> Option<EntryRef> {
        self.cell
            .get()?
            .iter()
            .find(|child| child.name() == name)
            .cloned()
    }
}

impl fmt::Debug for ChildrenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(children) => write!(f, "ChildrenCache({} cached)", children.len()),
            None => f.write_str("ChildrenCache(empty)"),
        }
    }
}

/// Sort entries by plain lexical order of their names.
pub(crate) fn sort_by_name(entries: &mut [EntryRef]) {
    entries.sort_by(|a, b| a.name().cmp(b.name()));
}

/// Walk `path` (slash separated, relative to `root`) one segment at a time.
pub fn resolve(root: &EntryRef, path: &str) -> Result<EntryRef> {
    let mut current = Arc::clone(root);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let next = current
            .children()?
            .iter()
            .find(|child| child.name() == segment)
            .cloned()
            .ok_or_else(|| Error::not_found(Node::child(current.path(), segment).path()))?;
        current = next;
    }
    Ok(current)
}
