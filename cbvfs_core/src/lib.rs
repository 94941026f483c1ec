//! # cbvfs core
//!
//! A virtual filesystem over versioned cookbook stores.
//!
//! A local repository and a remote configuration server are both presented
//! as trees of [`Entry`] values, so generic tooling (diff, copy, upload) can
//! walk either side the same way. Remote cookbooks are named
//! `{package}-{version}` so several versions of one package coexist.
//!
//! ## Features
//!
//! - One entry interface: `children`, `can_have_child`, `make_child_entry`
//! - Lazy, per-instance children caches with stable child identities
//! - Versioned cookbook name grammar shared by both backends
//! - Upload staging: a versioned source is presented to the uploader under
//!   its canonical name through a temporary link, removed on every exit path
//!
//! ## Example
//!
//! ```no_run
//! use cbvfs_core::{
//!     Entry, FsLoader, LocalCookbooksDir, Rest, ServerRoot, UploadContext, UploadOptions,
//! };
//! # use cbvfs_core::{CookbookUploader, CookbookVersion, UploadRequest};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # struct Session;
//! # impl Rest for Session {
//! #     fn get_json(&self, _: &str) -> cbvfs_core::Result<serde_json::Value> { unimplemented!() }
//! #     fn url(&self) -> &str { "" }
//! # }
//! # struct Uploader;
//! # impl CookbookUploader for Uploader {
//! #     fn upload(&self, _: &CookbookVersion, _: UploadRequest<'_>) -> cbvfs_core::Result<()> { Ok(()) }
//! # }
//! let server = ServerRoot::new(Arc::new(Session));
//! let repo = LocalCookbooksDir::open("./cookbooks")?;
//!
//! // Upload every local version the server lacks
//! let remote = server.cookbooks();
//! let (loader, uploader) = (FsLoader::new(), Uploader);
//! let ctx = UploadContext::new(&loader, &uploader);
//! for local in repo.children()? {
//!     let known = remote.children()?.iter().any(|r| r.name() == local.name());
//!     if !known && remote.can_have_child(local.name(), local.is_dir()) {
//!         remote.create_child_from(local.as_ref(), UploadOptions::default(), &ctx)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod chefignore;
mod config;
mod cookbook;
mod entry;
mod error;
mod local;
mod manifest;
pub mod name;
mod root;
mod staging;
mod upload;
mod versioned;
mod walk;

pub use chefignore::{Chefignore, DEFAULT_CHEFIGNORE};
pub use config::{CONFIG_FILE, Config, StagingMode};
pub use cookbook::{CookbookLoader, CookbookUploader, CookbookVersion, FsLoader, UploadRequest};
pub use entry::{ChildrenCache, Entry, EntryRef, Node, resolve};
pub use error::{Error, Result};
pub use local::{LocalCookbookDir, LocalCookbooksDir, LocalDir, LocalFile};
pub use manifest::{Manifest, ManifestFile, RemoteCookbookFile, RemoteCookbookSubdir};
pub use name::VersionedName;
pub use root::{COOKBOOKS_DIR, Rest, ServerRoot};
pub use staging::{CopyStaging, LinkStaging, StagingArea, StagingFs};
pub use upload::{CookbookSource, UploadContext, UploadOptions, upload_cookbook};
pub use versioned::{VersionedCookbookDir, VersionedCookbooksDir};
