//! Remote tree root and the session it hands to every remote entry.

use crate::entry::{ChildrenCache, Entry, EntryRef, Node};
use crate::error::Result;
use crate::versioned::VersionedCookbooksDir;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Session with the configuration server.
///
/// Authentication and retries are the implementation's concern. Every
/// error is surfaced unchanged to the entry that made the call.
pub trait Rest: Send + Sync {
    /// GET a path relative to the API base and decode the JSON body.
    fn get_json(&self, relative_path: &str) -> Result<Value>;

    /// API base URL, for diagnostics.
    fn url(&self) -> &str;
}

impl fmt::Debug for dyn Rest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rest({})", self.url())
    }
}

/// Name of the versioned cookbooks directory under the server root.
pub const COOKBOOKS_DIR: &str = "cookbooks";

/// Join an API path with a child name.
pub fn api_child_path(parent_api_path: &str, name: &str) -> String {
    if parent_api_path.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent_api_path, name)
    }
}

/// Root of the remote tree.
#[derive(Debug)]
pub struct ServerRoot {
    node: Node,
    rest: Arc<dyn Rest>,
    cookbooks: Arc<VersionedCookbooksDir>,
    children: ChildrenCache,
}

impl ServerRoot {
    pub fn new(rest: Arc<dyn Rest>) -> Self {
        let node = Node::root();
        let cookbooks = Arc::new(VersionedCookbooksDir::new(
            node.path(),
            api_child_path("", COOKBOOKS_DIR),
            Arc::clone(&rest),
        ));
        Self {
            node,
            rest,
            cookbooks,
            children: ChildrenCache::new(),
        }
    }

    /// The session shared by every entry under this root.
    pub fn rest(&self) -> &Arc<dyn Rest> {
        &self.rest
    }

    /// API path of the root: the empty string.
    pub fn api_path(&self) -> &str {
        ""
    }

    /// The versioned cookbooks directory. Always the same instance.
    pub fn cookbooks(&self) -> &Arc<VersionedCookbooksDir> {
        &self.cookbooks
    }
}

impl Entry for ServerRoot {
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
        self.children
            .get_or_try_init(|| Ok(vec![Arc::clone(&self.cookbooks) as EntryRef]))
    }

    fn can_have_child(&self, _name: &str, _is_dir: bool) -> bool {
        false
    }

    fn make_child_entry(&self, name: &str) -> Result<EntryRef> {
        if let Some(child) = self.children.lookup(name) {
            return Ok(child);
        }
        if name == COOKBOOKS_DIR {
            return Ok(Arc::clone(&self.cookbooks) as EntryRef);
        }
        Ok(Arc::new(Placeholder {
            node: Node::child(self.node.path(), name),
        }))
    }
}

/// Detached entry for a name the root does not serve.
#[derive(Debug)]
struct Placeholder {
    node: Node,
}

impl Entry for Placeholder {
    fn name(&self) -> &str {
        self.node.name()
    }

    fn path(&self) -> &str {
        self.node.path()
    }
}
