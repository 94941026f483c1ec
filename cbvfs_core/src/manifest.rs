//! Contents of one remote cookbook version, materialized from its manifest.

use crate::entry::{ChildrenCache, Entry, EntryRef, Node, sort_by_name};
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Directories a cookbook may contain at its top level.
pub const COOKBOOK_SEGMENTS: &[&str] = &[
    "attributes",
    "definitions",
    "files",
    "libraries",
    "providers",
    "recipes",
    "resources",
    "templates",
];

/// Segments holding only Ruby files, with no subdirectories.
pub const RUBY_ONLY_SEGMENTS: &[&str] = &[
    "attributes",
    "definitions",
    "libraries",
    "providers",
    "recipes",
    "resources",
];

/// Legacy manifest keys, each an array of files.
const LEGACY_SEGMENT_KEYS: &[&str] = &[
    "attributes",
    "definitions",
    "files",
    "libraries",
    "providers",
    "recipes",
    "resources",
    "templates",
    "root_files",
];

#[derive(Debug, Deserialize)]
struct RawFile {
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    checksum: Option<String>,
}

/// A file listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    /// Path relative to the cookbook root, `/` separated.
    pub path: String,
    pub checksum: Option<String>,
}

/// Decoded cookbook version manifest.
#[derive(Debug, Default)]
pub struct Manifest {
    files: Vec<ManifestFile>,
}

impl Manifest {
    /// Decode a manifest, preferring `all_files` over the legacy segments.
    pub fn from_value(api_path: &str, body: &Value) -> Result<Self> {
        let object = body
            .as_object()
            .ok_or_else(|| Error::remote_listing(api_path, "manifest is not a JSON object"))?;

        let raw: Vec<RawFile> = match object.get("all_files") {
            Some(all_files) => decode_files(api_path, all_files)?,
            None => {
                let mut merged = Vec::new();
                for key in LEGACY_SEGMENT_KEYS {
                    if let Some(segment) = object.get(*key) {
                        merged.extend(decode_files(api_path, segment)?);
                    }
                }
                merged
            }
        };

        let files = raw
            .into_iter()
            .map(|f| ManifestFile {
                path: f.path.unwrap_or(f.name),
                checksum: f.checksum,
            })
            .filter(|f| !f.path.is_empty())
            .collect();
        Ok(Self { files })
    }

    pub fn files(&self) -> &[ManifestFile] {
        &self.files
    }
}

fn decode_files(api_path: &str, value: &Value) -> Result<Vec<RawFile>> {
    Vec::<RawFile>::deserialize(value)
        .map_err(|e| Error::remote_listing(api_path, format!("unexpected manifest format: {}", e)))
}

/// Whether a cookbook root may contain `name`.
pub fn can_have_root_child(name: &str, is_dir: bool) -> bool {
    !is_dir || COOKBOOK_SEGMENTS.contains(&name)
}

/// Whether a directory within `segment` may contain `name`.
pub fn can_have_segment_child(segment: &str, name: &str, is_dir: bool) -> bool {
    if RUBY_ONLY_SEGMENTS.contains(&segment) {
        !is_dir && name.ends_with(".rb")
    } else {
        true
    }
}

/// Build the sorted entries directly under `parent_path` from manifest files
/// whose paths are relative to that directory.
pub(crate) fn materialize(
    parent_path: &str,
    segment: Option<&str>,
    files: &[ManifestFile],
) -> Vec<EntryRef> {
    let mut dirs: BTreeMap<&str, Vec<ManifestFile>> = BTreeMap::new();
    let mut entries: Vec<EntryRef> = Vec::new();

    for file in files {
        match file.path.split_once('/') {
            Some((dir, rest)) => dirs.entry(dir).or_default().push(ManifestFile {
                path: rest.to_string(),
                checksum: file.checksum.clone(),
            }),
            None => entries.push(Arc::new(RemoteCookbookFile {
                node: Node::child(parent_path, file.path.as_str()),
                checksum: file.checksum.clone(),
            })),
        }
    }

    for (dir, files) in dirs {
        let segment = segment.unwrap_or(dir).to_string();
        entries.push(Arc::new(RemoteCookbookSubdir {
            node: Node::child(parent_path, dir),
            segment,
            files,
            children: ChildrenCache::new(),
        }));
    }

    sort_by_name(&mut entries);
    entries
}

/// Detached entry for `name`: a directory when it names a top-level
/// segment, a file otherwise.
pub(crate) fn detached(parent_path: &str, segment: Option<&str>, name: &str) -> EntryRef {
    let as_dir = match segment {
        None => COOKBOOK_SEGMENTS.contains(&name),
        Some(_) => false,
    };
    let node = Node::child(parent_path, name);
    if as_dir {
        Arc::new(RemoteCookbookSubdir {
            node,
            segment: name.to_string(),
            files: Vec::new(),
            children: ChildrenCache::new(),
        })
    } else {
        Arc::new(RemoteCookbookFile {
            node,
            checksum: None,
        })
    }
}

/// A directory inside a remote cookbook version.
#[derive(Debug)]
pub struct RemoteCookbookSubdir {
    node: Node,
    segment: String,
    files: Vec<ManifestFile>,
    children: ChildrenCache,
}

impl RemoteCookbookSubdir {
    /// Top-level segment this directory belongs to.
    pub fn segment(&self) -> &str {
        &self.segment
    }
}

impl Entry for RemoteCookbookSubdir {
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
            Ok(materialize(
                self.node.path(),
                Some(&self.segment),
                &self.files,
            ))
        })
    }

    fn can_have_child(&self, name: &str, is_dir: bool) -> bool {
        can_have_segment_child(&self.segment, name, is_dir)
    }

    fn make_child_entry(&self, name: &str) -> Result<EntryRef> {
        if let Some(child) = self.children.lookup(name) {
            return Ok(child);
        }
        Ok(detached(self.node.path(), Some(&self.segment), name))
    }
}

/// A file inside a remote cookbook version.
#[derive(Debug)]
pub struct RemoteCookbookFile {
    node: Node,
    checksum: Option<String>,
}

impl RemoteCookbookFile {
    /// Content checksum from the manifest; `None` for detached entries.
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }
}

impl Entry for RemoteCookbookFile {
    fn name(&self) -> &str {
        self.node.name()
    }

    fn path(&self) -> &str {
        self.node.path()
    }
}
