//! Ephemeral staging areas that present a versioned cookbook tree under its
//! canonical, unversioned name.

use crate::config::{Config, StagingMode};
use crate::error::{Error, Result};
use crate::walk;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Filesystem primitives a staging area is built from.
pub trait StagingFs: Send + Sync {
    /// Create a fresh, uniquely named directory.
    fn create_dir(&self, prefix: &str) -> io::Result<PathBuf> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        Ok(dir.keep())
    }

    /// Make `link` resolve to the content at `target`.
    fn create_reference(&self, target: &Path, link: &Path) -> io::Result<()>;

    /// Remove the reference itself, never its target.
    fn remove_reference(&self, link: &Path) -> io::Result<()>;

    /// Whether recursive removal of a directory destroys the targets of
    /// references inside it on this host.
    fn removal_follows_references(&self) -> bool;

    fn remove_dir_all(&self, dir: &Path) -> io::Result<()> {
        fs::remove_dir_all(dir)
    }
}

/// Symlink-based staging.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkStaging;

impl StagingFs for LinkStaging {
    fn create_reference(&self, target: &Path, link: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link)
        }
        #[cfg(windows)]
        {
            std::os::windows::fs::symlink_dir(target, link)
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = (target, link);
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "symbolic links are not available on this platform",
            ))
        }
    }

    fn remove_reference(&self, link: &Path) -> io::Result<()> {
        // Directory symlinks are removed as directories on Windows
        if cfg!(windows) {
            fs::remove_dir(link)
        } else {
            fs::remove_file(link)
        }
    }

    fn removal_follows_references(&self) -> bool {
        cfg!(windows)
    }
}

/// Copy-based staging for hosts without usable links.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyStaging;

impl StagingFs for CopyStaging {
    fn create_reference(&self, target: &Path, link: &Path) -> io::Result<()> {
        copy_tree(target, link)
    }

    fn remove_reference(&self, link: &Path) -> io::Result<()> {
        fs::remove_dir_all(link)
    }

    fn removal_follows_references(&self) -> bool {
        false
    }
}

/// Copy the tree at `src` to the new directory `dst`.
///
/// Links are followed and their content copied. Link cycles and dangling
/// links are left out of the copy.
fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir(dst)?;
    for entry in walk::builder(src).build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if walk::is_skippable(&err) => {
                debug!(error = %err, "not copying unresolvable link");
                continue;
            }
            Err(err) => return Err(walk::into_io(err)),
        };
        if entry.depth() == 0 {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let to = dst.join(relative);
        if entry.path().is_dir() {
            fs::create_dir(&to)?;
        } else {
            fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

/// The staging primitives selected by a repository config.
pub fn for_mode(mode: StagingMode) -> &'static dyn StagingFs {
    match mode {
        StagingMode::Link => &LinkStaging,
        StagingMode::Copy => &CopyStaging,
    }
}

/// The staging primitives selected by `config`.
pub fn for_config(config: &Config) -> &'static dyn StagingFs {
    for_mode(config.staging_mode)
}

/// A staging directory holding exactly one reference, named after the
/// canonical cookbook name.
///
/// Released explicitly with [`StagingArea::release`]; dropping the guard
/// (including during a panic) performs the same cleanup.
pub struct StagingArea<'a> {
    fs: &'a dyn StagingFs,
    root: Option<PathBuf>,
    reference: PathBuf,
    linked: bool,
}

impl<'a> StagingArea<'a> {
    /// Create a staging directory and a reference `canonical_name` inside it
    /// pointing at `target`.
    pub fn create(
        fs: &'a dyn StagingFs,
        prefix: &str,
        canonical_name: &str,
        target: &Path,
    ) -> Result<Self> {
        let root = fs
            .create_dir(prefix)
            .map_err(|e| Error::staging_io(std::env::temp_dir(), e))?;
        let reference = root.join(canonical_name);
        let mut area = Self {
            fs,
            root: Some(root),
            reference,
            linked: false,
        };

        // On failure `area` drops here and removes the empty directory.
        fs.create_reference(target, &area.reference)
            .map_err(|e| Error::staging_io(&area.reference, e))?;
        area.linked = true;

        debug!(
            reference = %area.reference.display(),
            target = %target.display(),
            "created staging area"
        );
        Ok(area)
    }

    /// The staging directory.
    pub fn root(&self) -> &Path {
        self.root.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// The reference inside the staging directory.
    pub fn reference(&self) -> &Path {
        &self.reference
    }

    /// Remove the staging area, reporting any failure.
    pub fn release(mut self) -> Result<()> {
        self.cleanup()
    }

    fn cleanup(&mut self) -> Result<()> {
        let Some(root) = self.root.take() else {
            return Ok(());
        };

        if self.linked && self.fs.removal_follows_references() {
            // Recursive removal would destroy the source tree: drop the
            // reference first and leave the directory behind if that fails.
            self.fs
                .remove_reference(&self.reference)
                .map_err(|e| Error::staging_io(&self.reference, e))?;
        }
        self.linked = false;

        self.fs
            .remove_dir_all(&root)
            .map_err(|e| Error::staging_io(&root, e))?;
        debug!(root = %root.display(), "released staging area");
        Ok(())
    }
}

impl Drop for StagingArea<'_> {
    fn drop(&mut self) {
        if self.root.is_some()
            && let Err(e) = self.cleanup()
        {
            warn!(error = %e, "failed to clean up staging area");
        }
    }
}
