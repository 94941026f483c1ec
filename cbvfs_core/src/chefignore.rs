//! Repository ignore file (`chefignore`).
//!
//! Patterns use gitignore syntax and match paths relative to the cookbook
//! being walked.

use crate::error::Result;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Default ignore file name at the repository root.
pub const DEFAULT_CHEFIGNORE: &str = "chefignore";

/// Compiled ignore patterns of one repository.
#[derive(Debug, Clone)]
pub struct Chefignore {
    matcher: Gitignore,
    source: Option<PathBuf>,
}

impl Chefignore {
    /// Load `file_name` from `repo`. A missing file ignores nothing.
    pub fn load(repo: &Path, file_name: &str) -> Result<Self> {
        let path = repo.join(file_name);
        if !path.is_file() {
            return Ok(Self::empty());
        }

        let mut builder = GitignoreBuilder::new(repo);
        if let Some(err) = builder.add(&path) {
            return Err(err.into());
        }
        Ok(Self {
            matcher: builder.build()?,
            source: Some(path),
        })
    }

    /// Build from in-memory pattern lines.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut builder = GitignoreBuilder::new("");
        for line in lines {
            builder.add_line(None, line)?;
        }
        Ok(Self {
            matcher: builder.build()?,
            source: None,
        })
    }

    /// Ignore nothing.
    pub fn empty() -> Self {
        Self {
            matcher: Gitignore::empty(),
            source: None,
        }
    }

    /// Path of the file the patterns came from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Whether `relative` (or any of its parents) is ignored.
    pub fn is_ignored(&self, relative: &Path, is_dir: bool) -> bool {
        if self.matcher.is_empty() || relative.as_os_str().is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}

impl Default for Chefignore {
    fn default() -> Self {
        Self::empty()
    }
}
