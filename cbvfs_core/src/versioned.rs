//! Remote versioned cookbooks: one `{package}-{version}` directory per
//! version held by the server.

use crate::entry::{ChildrenCache, Entry, EntryRef, Node, sort_by_name};
use crate::error::{Error, Result};
use crate::manifest::{self, Manifest};
use crate::name::{self, VersionedName};
use crate::root::{Rest, api_child_path};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Query string selecting every version of every cookbook.
const ALL_VERSIONS_QUERY: &str = "num_versions=all";

/// Listing response: package name to its versions.
type Listing = HashMap<String, PackageVersions>;

#[derive(Debug, Deserialize)]
struct PackageVersions {
    #[serde(default)]
    versions: Vec<VersionDescriptor>,
}

#[derive(Debug, Deserialize)]
struct VersionDescriptor {
    version: String,
}

/// The directory of all cookbooks at all versions.
#[derive(Debug)]
pub struct VersionedCookbooksDir {
    node: Node,
    api_path: String,
    rest: Arc<dyn Rest>,
    children: ChildrenCache,
}

impl VersionedCookbooksDir {
    /// Create the directory under `parent_path`, addressed at `api_path`.
    pub fn new(parent_path: &str, api_path: impl Into<String>, rest: Arc<dyn Rest>) -> Self {
        let api_path = api_path.into();
        let name = api_path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            node: Node::child(parent_path, name),
            api_path,
            rest,
            children: ChildrenCache::new(),
        }
    }

    pub fn api_path(&self) -> &str {
        &self.api_path
    }

    pub fn rest(&self) -> &Arc<dyn Rest> {
        &self.rest
    }

    fn child(&self, name: impl Into<String>) -> VersionedCookbookDir {
        VersionedCookbookDir::new(
            self.node.path(),
            name,
            self.api_path.clone(),
            Arc::clone(&self.rest),
        )
    }

    fn list(&self) -> Result<Vec<EntryRef>> {
        let request = format!("{}?{}", self.api_path, ALL_VERSIONS_QUERY);
        debug!(path = %self.node.path(), %request, "listing versioned cookbooks");

        let body = self.rest.get_json(&request)?;
        let listing: Listing = serde_json::from_value(body).map_err(|e| {
            Error::remote_listing(&request, format!("unexpected listing format: {}", e))
        })?;

        let mut children: Vec<EntryRef> = listing
            .iter()
            .flat_map(|(package, entry)| {
                entry
                    .versions
                    .iter()
                    .map(move |v| name::join(package, &v.version))
            })
            .map(|composite| Arc::new(self.child(composite)) as EntryRef)
            .collect();

        // Plain lexical order, not version order: "1.10.0" sorts before "1.2.0".
        sort_by_name(&mut children);
        debug!(path = %self.node.path(), count = children.len(), "cached cookbook versions");
        Ok(children)
    }
}

impl Entry for VersionedCookbooksDir {
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

/// One cookbook version on the server, e.g. `apache2-1.0.1`.
#[derive(Debug)]
pub struct VersionedCookbookDir {
    node: Node,
    parent_api_path: String,
    rest: Arc<dyn Rest>,
    children: ChildrenCache,
}

impl VersionedCookbookDir {
    pub fn new(
        parent_path: &str,
        name: impl Into<String>,
        parent_api_path: impl Into<String>,
        rest: Arc<dyn Rest>,
    ) -> Self {
        Self {
            node: Node::child(parent_path, name),
            parent_api_path: parent_api_path.into(),
            rest,
            children: ChildrenCache::new(),
        }
    }

    /// Canonical name and version of this cookbook.
    pub fn versioned_name(&self) -> Result<VersionedName> {
        VersionedName::parse(self.node.name())
    }

    /// API path of the version manifest: `cookbooks/{name}/{version}`.
    pub fn api_path(&self) -> Result<String> {
        let versioned = self.versioned_name()?;
        let package = api_child_path(&self.parent_api_path, &versioned.name);
        Ok(api_child_path(&package, &versioned.version))
    }

    pub fn rest(&self) -> &Arc<dyn Rest> {
        &self.rest
    }

    fn list(&self) -> Result<Vec<EntryRef>> {
        let api_path = self.api_path()?;
        debug!(path = %self.node.path(), %api_path, "fetching cookbook manifest");
        let body = self.rest.get_json(&api_path)?;
        let manifest = Manifest::from_value(&api_path, &body)?;
        Ok(manifest::materialize(self.node.path(), None, manifest.files()))
    }
}

impl Entry for VersionedCookbookDir {
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
        Ok(manifest::detached(self.node.path(), None, name))
    }
}
