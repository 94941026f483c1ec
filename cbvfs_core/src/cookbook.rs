//! Loaded cookbook content and the loader/uploader collaborators.

use crate::chefignore::Chefignore;
use crate::error::{Error, Result};
use crate::root::Rest;
use crate::walk;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Metadata file read by [`FsLoader`].
pub const METADATA_JSON: &str = "metadata.json";

/// Version used when a cookbook declares none.
pub const DEFAULT_VERSION: &str = "0.0.0";

/// One cookbook version as loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookbookVersion {
    pub name: String,
    pub version: String,
    /// Locked against future overwrite on the server.
    pub frozen: bool,
    /// Directory the content was loaded from.
    pub root_dir: PathBuf,
    /// File paths relative to `root_dir`, sorted.
    pub files: Vec<PathBuf>,
}

impl CookbookVersion {
    pub fn new(name: impl Into<String>, version: impl Into<String>, root_dir: PathBuf) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            frozen: false,
            root_dir,
            files: Vec::new(),
        }
    }

    /// Mark this version as frozen before upload.
    pub fn freeze_version(&mut self) {
        self.frozen = true;
    }
}

/// Parses a cookbook directory into uploadable content.
pub trait CookbookLoader {
    fn load(&self, path: &Path, ignore: &Chefignore) -> Result<CookbookVersion>;
}

/// Arguments handed to the uploader for one call.
#[derive(Clone, Copy)]
pub struct UploadRequest<'a> {
    /// Overwrite a version that already exists on the server.
    pub force: bool,
    pub rest: &'a dyn Rest,
    /// Directory the uploader must treat as its cookbooks root for this
    /// call only.
    pub cookbooks_root: &'a Path,
}

/// Sends loaded cookbook content to the server.
pub trait CookbookUploader {
    fn upload(&self, cookbook: &CookbookVersion, request: UploadRequest<'_>) -> Result<()>;
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// Loads a cookbook straight from a directory.
///
/// The cookbook name comes from `metadata.json` when present, otherwise
/// from the directory's final path segment.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl FsLoader {
    pub fn new() -> Self {
        Self
    }

    fn read_metadata(path: &Path) -> Result<Metadata> {
        let metadata_path = path.join(METADATA_JSON);
        if !metadata_path.is_file() {
            return Ok(Metadata::default());
        }
        let content = fs::read(&metadata_path)
            .map_err(|e| Error::load(&metadata_path, format!("cannot read metadata: {}", e)))?;
        serde_json::from_slice(&content)
            .map_err(|e| Error::load(&metadata_path, format!("invalid metadata: {}", e)))
    }

    /// Files under `path`, relative to it. Ignored directories are never
    /// descended into, and walk errors on ignored paths are skipped.
    fn collect_files(path: &Path, ignore: &Chefignore) -> Result<Vec<PathBuf>> {
        let root = path.to_path_buf();
        let prune = ignore.clone();
        let walker = walk::builder(path)
            .filter_entry(move |entry| match entry.path().strip_prefix(&root) {
                Ok(relative) => !prune.is_ignored(relative, entry.path().is_dir()),
                Err(_) => true,
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let ignored = walk::error_path(&err)
                        .and_then(|p| p.strip_prefix(path).ok())
                        .is_some_and(|relative| ignore.is_ignored(relative, false));
                    if ignored || walk::is_loop(&err) {
                        trace!(error = %err, "skipping link");
                        continue;
                    }
                    return Err(Error::load(path, err.to_string()));
                }
            };
            let entry_path = entry.path();
            let Ok(relative) = entry_path.strip_prefix(path) else {
                continue;
            };
            if entry_path.is_dir() {
                continue;
            }
            files.push(relative.to_path_buf());
        }
        files.sort();
        Ok(files)
    }
}

impl CookbookLoader for FsLoader {
    fn load(&self, path: &Path, ignore: &Chefignore) -> Result<CookbookVersion> {
        if !path.is_dir() {
            return Err(Error::load(path, "cookbook directory does not exist"));
        }

        let metadata = Self::read_metadata(path)?;
        let name = match metadata.name {
            Some(name) => name,
            None => path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| Error::load(path, "cannot derive cookbook name"))?,
        };
        let version = metadata
            .version
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());

        let mut cookbook = CookbookVersion::new(name, version, path.to_path_buf());
        cookbook.files = Self::collect_files(path, ignore)?;
        trace!(
            cookbook = %cookbook.name,
            version = %cookbook.version,
            files = cookbook.files.len(),
            "loaded cookbook"
        );
        Ok(cookbook)
    }
}
