//! Upload staging protocol.
//!
//! The uploader only understands one directory per cookbook name, while a
//! versioned source lives at `{package}-{version}`. Each upload therefore
//! gets its own staging directory holding a single reference named after the
//! canonical package, and the uploader is pointed at that directory for the
//! duration of the call.

use crate::chefignore::Chefignore;
use crate::config::{Config, DEFAULT_STAGING_PREFIX};
use crate::cookbook::{CookbookLoader, CookbookUploader, UploadRequest};
use crate::entry::{Entry, EntryRef};
use crate::error::{Error, Result};
use crate::name::VersionedName;
use crate::root::Rest;
use crate::staging::{self, LinkStaging, StagingArea, StagingFs};
use crate::versioned::VersionedCookbooksDir;
use std::path::Path;
use tracing::debug;

/// An entry whose on-disk tree can be uploaded.
pub trait CookbookSource: Entry {
    /// Directory holding the cookbook's files.
    fn file_path(&self) -> &Path;

    /// Ignore specification of the owning repository.
    fn chefignore(&self) -> &Chefignore;
}

/// Per-upload options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Overwrite an existing version on the server.
    pub force: bool,
    /// Lock the uploaded version against future overwrite.
    pub freeze: bool,
}

/// Collaborators an upload is carried out with.
#[derive(Clone, Copy)]
pub struct UploadContext<'a> {
    pub loader: &'a dyn CookbookLoader,
    pub uploader: &'a dyn CookbookUploader,
    pub staging: &'a dyn StagingFs,
    pub staging_prefix: &'a str,
}

impl<'a> UploadContext<'a> {
    /// Link-based staging with the default prefix.
    pub fn new(loader: &'a dyn CookbookLoader, uploader: &'a dyn CookbookUploader) -> Self {
        Self {
            loader,
            uploader,
            staging: &LinkStaging,
            staging_prefix: DEFAULT_STAGING_PREFIX,
        }
    }

    /// Staging mode and prefix taken from a repository config.
    pub fn with_config(mut self, config: &'a Config) -> Self {
        self.staging = staging::for_config(config);
        self.staging_prefix = &config.staging_prefix;
        self
    }

    pub fn with_staging(mut self, staging: &'a dyn StagingFs) -> Self {
        self.staging = staging;
        self
    }
}

/// Upload one versioned cookbook.
///
/// Collaborator errors are returned unchanged, after the staging area has
/// been removed. When both the upload and the cleanup fail, the upload
/// error wins.
pub fn upload_cookbook(
    source: &dyn CookbookSource,
    options: UploadOptions,
    rest: &dyn Rest,
    ctx: &UploadContext<'_>,
) -> Result<()> {
    let versioned = VersionedName::parse(source.name())?;
    debug!(
        source = %source.path(),
        cookbook = %versioned.name,
        version = %versioned.version,
        force = options.force,
        freeze = options.freeze,
        "uploading cookbook"
    );

    let area = StagingArea::create(
        ctx.staging,
        ctx.staging_prefix,
        &versioned.name,
        source.file_path(),
    )?;
    let outcome = load_and_upload(&area, source, options, rest, ctx);
    let released = area.release();
    outcome.and(released)
}

fn load_and_upload(
    area: &StagingArea<'_>,
    source: &dyn CookbookSource,
    options: UploadOptions,
    rest: &dyn Rest,
    ctx: &UploadContext<'_>,
) -> Result<()> {
    let mut cookbook = ctx.loader.load(area.reference(), source.chefignore())?;
    if options.freeze {
        cookbook.freeze_version();
    }

    let request = UploadRequest {
        force: options.force,
        rest,
        cookbooks_root: area.root(),
    };
    ctx.uploader.upload(&cookbook, request)?;
    debug!(cookbook = %cookbook.name, version = %cookbook.version, "upload complete");
    Ok(())
}

impl VersionedCookbooksDir {
    /// Upload `source` to the server this directory lists.
    pub fn upload_cookbook_from(
        &self,
        source: &dyn CookbookSource,
        options: UploadOptions,
        ctx: &UploadContext<'_>,
    ) -> Result<()> {
        upload_cookbook(source, options, self.rest().as_ref(), ctx)
    }

    /// Copy a local entry into this directory: upload it, then return the
    /// entry for it.
    pub fn create_child_from(
        &self,
        other: &dyn Entry,
        options: UploadOptions,
        ctx: &UploadContext<'_>,
    ) -> Result<EntryRef> {
        let source = other
            .as_cookbook_source()
            .ok_or_else(|| Error::not_a_cookbook_source(other.path()))?;
        self.upload_cookbook_from(source, options, ctx)?;
        self.make_child_entry(other.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookbook::{CookbookVersion, FsLoader};
    use crate::local::LocalCookbooksDir;
    use crate::root::ServerRoot;
    use crate::root::testing::FakeRest;
    use crate::staging::testing::RecordingStaging;
    use crate::staging::CopyStaging;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Loads through [`FsLoader`] and remembers the path it was given.
    #[derive(Default)]
    struct RecordingLoader {
        paths: Mutex<Vec<PathBuf>>,
        fail: bool,
        panic: bool,
    }

    impl RecordingLoader {
        fn last_path(&self) -> PathBuf {
            self.paths.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl CookbookLoader for RecordingLoader {
        fn load(&self, path: &Path, ignore: &Chefignore) -> Result<CookbookVersion> {
            self.paths.lock().unwrap().push(path.to_path_buf());
            if self.panic {
                panic!("loader blew up");
            }
            if self.fail {
                return Err(Error::load(path, "syntax error in metadata.rb"));
            }
            FsLoader::new().load(path, ignore)
        }
    }

    #[derive(Debug, Clone)]
    struct UploadCall {
        name: String,
        frozen: bool,
        force: bool,
        cookbooks_root: PathBuf,
        staged_dir_present: bool,
        files: Vec<PathBuf>,
    }

    #[derive(Default)]
    struct RecordingUploader {
        calls: Mutex<Vec<UploadCall>>,
        fail: bool,
    }

    impl RecordingUploader {
        fn calls(&self) -> Vec<UploadCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CookbookUploader for RecordingUploader {
        fn upload(&self, cookbook: &CookbookVersion, request: UploadRequest<'_>) -> Result<()> {
            self.calls.lock().unwrap().push(UploadCall {
                name: cookbook.name.clone(),
                frozen: cookbook.frozen,
                force: request.force,
                cookbooks_root: request.cookbooks_root.to_path_buf(),
                staged_dir_present: request.cookbooks_root.join(&cookbook.name).is_dir(),
                files: cookbook.files.clone(),
            });
            if self.fail {
                return Err(Error::upload(&cookbook.name, "409 Conflict: version is frozen"));
            }
            Ok(())
        }
    }

    struct Fixture {
        _temp_dir: TempDir,
        source_dir: PathBuf,
        repo: LocalCookbooksDir,
        server: ServerRoot,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let repo_dir = temp_dir.path().join("cookbooks");
        let source_dir = repo_dir.join("apache2-1.0.1");
        fs::create_dir_all(source_dir.join("recipes")).unwrap();
        fs::write(source_dir.join("recipes/default.rb"), b"package 'httpd'").unwrap();
        fs::write(source_dir.join("README.md"), b"docs").unwrap();
        fs::write(repo_dir.join("chefignore"), b"README*\n").unwrap();

        let repo = LocalCookbooksDir::open(&repo_dir).unwrap();
        let server = ServerRoot::new(Arc::new(FakeRest::new()));
        Fixture {
            _temp_dir: temp_dir,
            source_dir,
            repo,
            server,
        }
    }

    fn source(f: &Fixture) -> EntryRef {
        f.repo.children().unwrap()[0].clone()
    }

    fn assert_source_intact(f: &Fixture) {
        assert_eq!(
            fs::read(f.source_dir.join("recipes/default.rb")).unwrap(),
            b"package 'httpd'"
        );
    }

    #[test]
    fn test_upload_stages_under_canonical_name() {
        let f = fixture();
        let loader = RecordingLoader::default();
        let uploader = RecordingUploader::default();
        let ctx = UploadContext::new(&loader, &uploader);
        let entry = source(&f);

        f.server
            .cookbooks()
            .upload_cookbook_from(
                entry.as_cookbook_source().unwrap(),
                UploadOptions {
                    force: false,
                    freeze: true,
                },
                &ctx,
            )
            .unwrap();

        let loaded = loader.last_path();
        assert_eq!(loaded.file_name().unwrap(), "apache2");
        let staging_root = loaded.parent().unwrap().to_path_buf();
        assert!(!staging_root.exists());

        let calls = uploader.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "apache2");
        assert!(calls[0].frozen);
        assert!(!calls[0].force);
        assert_eq!(calls[0].cookbooks_root, staging_root);
        assert!(calls[0].staged_dir_present);
        // chefignore from the owning repository was applied
        assert_eq!(calls[0].files, vec![PathBuf::from("recipes/default.rb")]);

        assert_source_intact(&f);
    }

    #[test]
    fn test_uploader_failure_still_cleans_up() {
        let f = fixture();
        let loader = RecordingLoader::default();
        let uploader = RecordingUploader {
            fail: true,
            ..Default::default()
        };
        let ctx = UploadContext::new(&loader, &uploader);
        let entry = source(&f);

        let err = f
            .server
            .cookbooks()
            .upload_cookbook_from(
                entry.as_cookbook_source().unwrap(),
                UploadOptions {
                    force: false,
                    freeze: true,
                },
                &ctx,
            )
            .unwrap_err();

        match err {
            Error::Upload { cookbook, reason } => {
                assert_eq!(cookbook, "apache2");
                assert_eq!(reason, "409 Conflict: version is frozen");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(loader.last_path().file_name().unwrap(), "apache2");
        assert!(!loader.last_path().parent().unwrap().exists());
        assert_source_intact(&f);
    }

    #[test]
    fn test_loader_failure_cleans_up() {
        let f = fixture();
        let loader = RecordingLoader {
            fail: true,
            ..Default::default()
        };
        let uploader = RecordingUploader::default();
        let ctx = UploadContext::new(&loader, &uploader);
        let entry = source(&f);

        let err = f
            .server
            .cookbooks()
            .upload_cookbook_from(
                entry.as_cookbook_source().unwrap(),
                UploadOptions::default(),
                &ctx,
            )
            .unwrap_err();

        assert!(matches!(err, Error::Load { .. }));
        assert!(uploader.calls().is_empty());
        assert!(!loader.last_path().parent().unwrap().exists());
        assert_source_intact(&f);
    }

    #[test]
    fn test_panic_still_cleans_up() {
        let f = fixture();
        let loader = RecordingLoader {
            panic: true,
            ..Default::default()
        };
        let uploader = RecordingUploader::default();
        let ctx = UploadContext::new(&loader, &uploader);
        let entry = source(&f);
        let rest = FakeRest::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            upload_cookbook(
                entry.as_cookbook_source().unwrap(),
                UploadOptions::default(),
                &rest,
                &ctx,
            )
        }));

        assert!(result.is_err());
        assert!(!loader.last_path().parent().unwrap().exists());
        assert_source_intact(&f);
    }

    #[test]
    fn test_invalid_name_does_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let repo_dir = temp_dir.path().join("cookbooks");
        fs::create_dir_all(repo_dir.join("apache2")).unwrap();
        let repo = LocalCookbooksDir::new(&repo_dir, Chefignore::empty());
        // A detached entry with an unversioned name
        let entry = repo.make_child_entry("apache2").unwrap();

        let loader = RecordingLoader::default();
        let uploader = RecordingUploader::default();
        let staging = RecordingStaging::default();
        let ctx = UploadContext::new(&loader, &uploader).with_staging(&staging);
        let rest = FakeRest::new();

        let err = upload_cookbook(
            entry.as_cookbook_source().unwrap(),
            UploadOptions::default(),
            &rest,
            &ctx,
        )
        .unwrap_err();

        assert!(matches!(err, Error::NameGrammar { .. }));
        assert!(staging.ops().is_empty());
        assert!(loader.paths.lock().unwrap().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_hazardous_platform_order() {
        let f = fixture();
        let loader = RecordingLoader::default();
        let uploader = RecordingUploader {
            fail: true,
            ..Default::default()
        };
        let staging = RecordingStaging {
            hazard: true,
            ..Default::default()
        };
        let ctx = UploadContext::new(&loader, &uploader).with_staging(&staging);
        let entry = source(&f);

        let result = f.server.cookbooks().upload_cookbook_from(
            entry.as_cookbook_source().unwrap(),
            UploadOptions::default(),
            &ctx,
        );

        assert!(result.is_err());
        assert_eq!(
            staging.ops(),
            vec![
                "create_dir",
                "create_reference",
                "remove_reference",
                "remove_dir_all"
            ]
        );
        assert_source_intact(&f);
    }

    #[test]
    fn test_copy_staging_from_config() {
        let f = fixture();
        let loader = RecordingLoader::default();
        let uploader = RecordingUploader::default();
        let config = Config {
            staging_prefix: "cbvfs-copy-".to_string(),
            staging_mode: crate::config::StagingMode::Copy,
            ..Config::default()
        };
        let ctx = UploadContext::new(&loader, &uploader).with_config(&config);
        let entry = source(&f);

        f.server
            .cookbooks()
            .upload_cookbook_from(
                entry.as_cookbook_source().unwrap(),
                UploadOptions {
                    force: true,
                    freeze: false,
                },
                &ctx,
            )
            .unwrap();

        let loaded = loader.last_path();
        assert_eq!(loaded.file_name().unwrap(), "apache2");
        let root_name = loaded.parent().unwrap().file_name().unwrap();
        assert!(root_name.to_str().unwrap().starts_with("cbvfs-copy-"));
        assert!(!loaded.parent().unwrap().exists());

        let calls = uploader.calls();
        assert!(calls[0].force);
        assert!(!calls[0].frozen);
        assert_source_intact(&f);
    }

    #[test]
    fn test_copy_staging_direct() {
        let f = fixture();
        let loader = RecordingLoader::default();
        let uploader = RecordingUploader::default();
        let ctx = UploadContext::new(&loader, &uploader).with_staging(&CopyStaging);
        let entry = source(&f);
        let rest = FakeRest::new();

        upload_cookbook(
            entry.as_cookbook_source().unwrap(),
            UploadOptions::default(),
            &rest,
            &ctx,
        )
        .unwrap();
        assert_eq!(uploader.calls()[0].name, "apache2");
        assert_source_intact(&f);
    }

    #[test]
    fn test_concurrent_uploads_use_distinct_staging() {
        let f = fixture();
        let entry = source(&f);
        let rest = FakeRest::new();

        let roots: Vec<PathBuf> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let entry = &entry;
                    let rest = &rest;
                    scope.spawn(move || {
                        let loader = RecordingLoader::default();
                        let uploader = RecordingUploader::default();
                        let ctx = UploadContext::new(&loader, &uploader);
                        upload_cookbook(
                            entry.as_cookbook_source().unwrap(),
                            UploadOptions::default(),
                            rest,
                            &ctx,
                        )
                        .unwrap();
                        uploader.calls()[0].cookbooks_root.clone()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut unique = roots.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), roots.len());
        assert!(roots.iter().all(|r| !r.exists()));
        assert_source_intact(&f);
    }

    #[test]
    fn test_create_child_from() {
        let f = fixture();
        let loader = RecordingLoader::default();
        let uploader = RecordingUploader::default();
        let ctx = UploadContext::new(&loader, &uploader);
        let entry = source(&f);

        let child = f
            .server
            .cookbooks()
            .create_child_from(entry.as_ref(), UploadOptions::default(), &ctx)
            .unwrap();
        assert_eq!(child.name(), "apache2-1.0.1");
        assert_eq!(child.path(), "/cookbooks/apache2-1.0.1");
        assert_eq!(uploader.calls().len(), 1);
    }

    #[test]
    fn test_create_child_from_rejects_non_source() {
        let f = fixture();
        let loader = RecordingLoader::default();
        let uploader = RecordingUploader::default();
        let ctx = UploadContext::new(&loader, &uploader);

        let err = f
            .server
            .cookbooks()
            .create_child_from(&f.repo, UploadOptions::default(), &ctx)
            .unwrap_err();
        assert!(matches!(err, Error::NotACookbookSource { .. }));
        assert!(uploader.calls().is_empty());
    }
}
