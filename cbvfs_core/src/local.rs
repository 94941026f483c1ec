//! Local versioned repository: a directory of `{package}-{version}` cookbooks.

use crate::chefignore::Chefignore;
use crate::config::Config;
use crate::entry::{ChildrenCache, Entry, EntryRef, Node, sort_by_name};
use crate::error::{Error, Result};
use crate::manifest;
use crate::name;
use crate::upload::CookbookSource;
use crate::walk;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Read the immediate children of `dir`, following links.
///
/// Yields `(name, path, is_dir)`. Names that are not UTF-8, dangling links
/// and link cycles are skipped.
fn read_children(dir: &Path, entry_path: &str) -> Result<Vec<(String, PathBuf, bool)>> {
    if !dir.is_dir() {
        return Err(Error::not_found(entry_path));
    }

    let walker = walk::builder(dir)
        .max_depth(Some(1)) // Only immediate children
        .build();

    let mut children = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if walk::is_skippable(&err) => {
                debug!(error = %err, "skipping unresolvable link");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        if entry.depth() == 0 {
            continue;
        }
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            debug!(path = %path.display(), "skipping non UTF-8 name");
            continue;
        };
        children.push((name.to_string(), path.to_path_buf(), path.is_dir()));
    }
    Ok(children)
}

/// The repository directory holding every cookbook at every version.
#[derive(Debug)]
pub struct LocalCookbooksDir {
    node: Node,
    file_path: PathBuf,
    chefignore: Arc<Chefignore>,
    children: ChildrenCache,
}

impl LocalCookbooksDir {
    /// Create the directory entry at `/cookbooks` for `file_path`.
    pub fn new(file_path: impl Into<PathBuf>, chefignore: Chefignore) -> Self {
        Self {
            node: Node::child("/", crate::root::COOKBOOKS_DIR),
            file_path: file_path.into(),
            chefignore: Arc::new(chefignore),
            children: ChildrenCache::new(),
        }
    }

    /// Open a repository, loading its config and ignore file.
    pub fn open(file_path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = file_path.into();
        let config = Config::load(&file_path)?;
        let chefignore = Chefignore::load(&file_path, &config.chefignore)?;
        Ok(Self::new(file_path, chefignore))
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn chefignore(&self) -> &Chefignore {
        &self.chefignore
    }

    fn child(&self, name: &str) -> LocalCookbookDir {
        LocalCookbookDir {
            node: Node::child(self.node.path(), name),
            file_path: self.file_path.join(name),
            chefignore: Arc::clone(&self.chefignore),
            children: ChildrenCache::new(),
        }
    }

    fn list(&self) -> Result<Vec<EntryRef>> {
        debug!(path = %self.file_path.display(), "listing local cookbooks");
        let mut children: Vec<EntryRef> = Vec::new();
        for (name, _, is_dir) in read_children(&self.file_path, self.node.path())? {
            if !is_dir
                || name.starts_with('.')
                || !name::matches(&name)
                || self.chefignore.is_ignored(Path::new(&name), true)
            {
                continue;
            }
            children.push(Arc::new(self.child(&name)));
        }
        sort_by_name(&mut children);
        Ok(children)
    }
}

impl Entry for LocalCookbooksDir {
    fn name(&self) -> &str {
        self.node.name()
    }

    fn path(&self) -> &str {
        self.node.path()
    }

    fn is_dir(&self) -> bool {
        true
    }

    fn children(&self) -> Result<&[EntryRef]> {
        self.children.get_or_try_init(|| self.list())
    }

    fn can_have_child(&self, name: &str, is_dir: bool) -> bool {
        is_dir && name::matches(name)
    }

    fn make_child_entry(&self, name: &str) -> Result<EntryRef> {
        if let Some(child) = self.children.lookup(name) {
            return Ok(child);
        }
        Ok(Arc::new(self.child(name)))
    }
}

/// One versioned cookbook on disk, e.g. `apache2-1.0.1/`.
#[derive(Debug)]
pub struct LocalCookbookDir {
    node: Node,
    file_path: PathBuf,
    chefignore: Arc<Chefignore>,
    children: ChildrenCache,
}

impl LocalCookbookDir {
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn list(&self) -> Result<Vec<EntryRef>> {
        list_tree(
            self.node.path(),
            &self.file_path,
            Path::new(""),
            &self.chefignore,
        )
    }
}

impl CookbookSource for LocalCookbookDir {
    fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn chefignore(&self) -> &Chefignore {
        &self.chefignore
    }
}

impl Entry for LocalCookbookDir {
    fn name(&self) -> &str {
        self.node.name()
    }

    fn path(&self) -> &str {
        self.node.path()
    }

    fn is_dir(&self) -> bool {
        true
    }

    fn children(&self) -> Result<&[EntryRef]> {
        self.children.get_or_try_init(|| self.list())
    }

    fn can_have_child(&self, name: &str, is_dir: bool) -> bool {
        manifest::can_have_root_child(name, is_dir)
    }

    fn make_child_entry(&self, name: &str) -> Result<EntryRef> {
        if let Some(child) = self.children.lookup(name) {
            return Ok(child);
        }
        let relative = PathBuf::from(name);
        let file_path = self.file_path.join(name);
        if manifest::COOKBOOK_SEGMENTS.contains(&name) {
            Ok(Arc::new(LocalDir::new(
                self.node.path(),
                name,
                file_path,
                relative,
                Arc::clone(&self.chefignore),
            )))
        } else {
            Ok(Arc::new(LocalFile::new(self.node.path(), name, file_path)))
        }
    }

    fn as_cookbook_source(&self) -> Option<&dyn CookbookSource> {
        Some(self)
    }
}

/// List the entries of `dir`, whose path relative to the cookbook root is
/// `relative`, dropping anything the ignore file matches.
fn list_tree(
    parent_path: &str,
    dir: &Path,
    relative: &Path,
    chefignore: &Arc<Chefignore>,
) -> Result<Vec<EntryRef>> {
    let mut children: Vec<EntryRef> = Vec::new();
    for (name, path, is_dir) in read_children(dir, parent_path)? {
        let child_relative = relative.join(&name);
        if chefignore.is_ignored(&child_relative, is_dir) {
            continue;
        }
        if is_dir {
            children.push(Arc::new(LocalDir::new(
                parent_path,
                name,
                path,
                child_relative,
                Arc::clone(chefignore),
            )));
        } else {
            children.push(Arc::new(LocalFile::new(parent_path, name, path)));
        }
    }
    sort_by_name(&mut children);
    Ok(children)
}

/// A directory inside a local cookbook.
#[derive(Debug)]
pub struct LocalDir {
    node: Node,
    file_path: PathBuf,
    relative: PathBuf,
    chefignore: Arc<Chefignore>,
    children: ChildrenCache,
}

impl LocalDir {
    fn new(
        parent_path: &str,
        name: impl Into<String>,
        file_path: PathBuf,
        relative: PathBuf,
        chefignore: Arc<Chefignore>,
    ) -> Self {
        Self {
            node: Node::child(parent_path, name),
            file_path,
            relative,
            chefignore,
            children: ChildrenCache::new(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Top-level segment (first path component) of this directory.
    fn segment(&self) -> &str {
        self.relative
            .components()
            .next()
            .and_then(|c| c.as_os_str().to_str())
            .unwrap_or_default()
    }
}

impl Entry for LocalDir {
    fn name(&self) -> &str {
        self.node.name()
    }

    fn path(&self) -> &str {
        self.node.path()
    }

    fn is_dir(&self) -> bool {
        true
    }

    fn children(&self) -> Result<&[EntryRef]> {
        self.children.get_or_try_init(|| {
            list_tree(
                self.node.path(),
                &self.file_path,
                &self.relative,
                &self.chefignore,
            )
        })
    }

    fn can_have_child(&self, name: &str, is_dir: bool) -> bool {
        manifest::can_have_segment_child(self.segment(), name, is_dir)
    }

    fn make_child_entry(&self, name: &str) -> Result<EntryRef> {
        if let Some(child) = self.children.lookup(name) {
            return Ok(child);
        }
        Ok(Arc::new(LocalFile::new(
            self.node.path(),
            name,
            self.file_path.join(name),
        )))
    }
}

/// A file inside a local cookbook.
#[derive(Debug)]
pub struct LocalFile {
    node: Node,
    file_path: PathBuf,
}

impl LocalFile {
    fn new(parent_path: &str, name: impl Into<String>, file_path: PathBuf) -> Self {
        Self {
            node: Node::child(parent_path, name),
            file_path,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Read the file's content.
    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.file_path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::not_found(self.node.path()),
            _ => Error::Io { source: e },
        })
    }
}

impl Entry for LocalFile {
    fn name(&self) -> &str {
        self.node.name()
    }

    fn path(&self) -> &str {
        self.node.path()
    }
}
