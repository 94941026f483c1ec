//! Repository configuration (`.cbvfs`).
//!
//! A `key=value` file at the repository root. Blank lines and `#` comments
//! are skipped, unknown keys are ignored, and a missing file means defaults.

use crate::chefignore::DEFAULT_CHEFIGNORE;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Config file name at the repository root.
pub const CONFIG_FILE: &str = ".cbvfs";

/// Default prefix for staging directory names.
pub const DEFAULT_STAGING_PREFIX: &str = "cbvfs-upload-";

/// How a staging area presents the source tree under its canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StagingMode {
    /// A same-target reference (symlink).
    #[default]
    Link,
    /// A full recursive copy.
    Copy,
}

impl StagingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagingMode::Link => "link",
            StagingMode::Copy => "copy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "link" => Some(StagingMode::Link),
            "copy" => Some(StagingMode::Copy),
            _ => None,
        }
    }
}

/// Repository-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Ignore file name, relative to the repository.
    pub chefignore: String,
    /// Prefix of staging directory names.
    pub staging_prefix: String,
    pub staging_mode: StagingMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chefignore: DEFAULT_CHEFIGNORE.to_string(),
            staging_prefix: DEFAULT_STAGING_PREFIX.to_string(),
            staging_mode: StagingMode::default(),
        }
    }
}

impl Config {
    /// Load the config of the repository at `repo`.
    pub fn load(repo: &Path) -> Result<Self> {
        let config_path = repo.join(CONFIG_FILE);
        if !config_path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&config_path)?;
        Self::parse(&config_path, &content)
    }

    /// Parse config content; `path` is only used in error messages.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::invalid_config(
                    path,
                    format!("expected key=value, got {:?}", line),
                ));
            };
            let value = value.trim();

            match key.trim() {
                "version" if value != "1" => {
                    return Err(Error::invalid_config(
                        path,
                        format!("unsupported config version: {}", value),
                    ));
                }
                "chefignore" if value.is_empty() => {
                    return Err(Error::invalid_config(path, "chefignore cannot be empty"));
                }
                "chefignore" => config.chefignore = value.to_string(),
                "staging_prefix" if value.contains(['/', '\\']) => {
                    return Err(Error::invalid_config(
                        path,
                        format!("staging_prefix must not contain a path separator: {}", value),
                    ));
                }
                "staging_prefix" => config.staging_prefix = value.to_string(),
                "staging_mode" => {
                    config.staging_mode = StagingMode::parse(value).ok_or_else(|| {
                        Error::invalid_config(path, format!("unknown staging_mode: {}", value))
                    })?;
                }
                _ => {}
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(temp_dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.chefignore, "chefignore");
        assert_eq!(config.staging_prefix, "cbvfs-upload-");
        assert_eq!(config.staging_mode, StagingMode::Link);
    }

    #[test]
    fn test_parse_all_keys() {
        let content = "# repo settings\nversion=1\n\nchefignore = .chefignore\nstaging_prefix=up-\nstaging_mode=copy\nfuture_key=whatever\n";
        let config = Config::parse(Path::new(".cbvfs"), content).unwrap();
        assert_eq!(config.chefignore, ".chefignore");
        assert_eq!(config.staging_prefix, "up-");
        assert_eq!(config.staging_mode, StagingMode::Copy);
    }

    #[test]
    fn test_invalid_values() {
        let path = Path::new(".cbvfs");
        assert!(matches!(
            Config::parse(path, "version=2"),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(Config::parse(path, "staging_mode=hardlink").is_err());
        assert!(Config::parse(path, "chefignore=").is_err());
        assert!(Config::parse(path, "no equals sign").is_err());
    }

    #[test]
    fn test_staging_prefix_rejects_separators() {
        let path = Path::new(".cbvfs");
        for value in ["../escape-", "nested/up-", "..\\win-", "/abs-"] {
            let content = format!("staging_prefix={}", value);
            assert!(
                matches!(
                    Config::parse(path, &content),
                    Err(Error::InvalidConfig { .. })
                ),
                "{:?} should be rejected",
                value
            );
        }
        let config = Config::parse(path, "staging_prefix=..upload-").unwrap();
        assert_eq!(config.staging_prefix, "..upload-");
    }

    #[test]
    fn test_load_from_repo() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE), "staging_mode=copy\n").unwrap();
        let config = Config::load(temp_dir.path()).unwrap();
        assert_eq!(config.staging_mode, StagingMode::Copy);
    }

    #[test]
    fn test_staging_mode_round_trip() {
        for mode in [StagingMode::Link, StagingMode::Copy] {
            assert_eq!(StagingMode::parse(mode.as_str()), Some(mode));
        }
    }
}
