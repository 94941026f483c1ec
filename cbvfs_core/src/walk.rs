//! Directory walking shared by the local backend, the loader and copy staging.
//!
//! Walks follow links. Link cycles and links whose target is gone surface
//! as walk errors; the helpers below let callers recognize and step over
//! them.

use ignore::WalkBuilder;
use std::io;
use std::path::Path;

/// A walker over `root` with no implicit ignore files, following links.
pub(crate) fn builder(root: &Path) -> WalkBuilder {
    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false) // chefignore is applied by the caller
        .follow_links(true);
    builder
}

/// The path a walk error refers to, if any.
pub(crate) fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path),
        ignore::Error::Loop { child, .. } => Some(child),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        _ => None,
    }
}

/// Whether the error is a link pointing back at one of its ancestors.
pub(crate) fn is_loop(err: &ignore::Error) -> bool {
    match err {
        ignore::Error::Loop { .. } => true,
        ignore::Error::WithPath { err, .. }
        | ignore::Error::WithDepth { err, .. }
        | ignore::Error::WithLineNumber { err, .. } => is_loop(err),
        _ => false,
    }
}

/// Whether the error is a link whose target does not exist.
pub(crate) fn is_dangling(err: &ignore::Error) -> bool {
    let Some(path) = error_path(err) else {
        return false;
    };
    err.io_error()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
        && path
            .symlink_metadata()
            .is_ok_and(|m| m.file_type().is_symlink())
}

/// Whether a walk may step over the error without losing content.
pub(crate) fn is_skippable(err: &ignore::Error) -> bool {
    is_loop(err) || is_dangling(err)
}

/// Convert a walk error for APIs that speak `io::Error`.
pub(crate) fn into_io(err: ignore::Error) -> io::Error {
    match err.io_error() {
        Some(io_err) => io::Error::new(io_err.kind(), err.to_string()),
        None => io::Error::other(err.to_string()),
    }
}
