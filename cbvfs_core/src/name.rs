//! Versioned cookbook names: `{package}-{version}`.
//!
//! The version is the trailing hyphen-delimited run of 2 to 4 dot-separated
//! numeric components. A package name may itself contain hyphens and dots,
//! so the split always happens at the last hyphen.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Separator between package name and version.
pub const SEPARATOR: char = '-';

/// Minimum number of numeric components in a version.
const MIN_VERSION_PARTS: usize = 2;

/// Maximum number of numeric components in a version.
const MAX_VERSION_PARTS: usize = 4;

/// A composite name split into its canonical package name and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionedName {
    /// Package name with the version suffix stripped.
    pub name: String,
    /// Dotted numeric version string.
    pub version: String,
}

impl VersionedName {
    /// Parse a composite name.
    pub fn parse(composite: &str) -> Result<Self> {
        let (name, version) = split(composite).ok_or_else(|| Error::name_grammar(composite))?;
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    /// Re-join into the composite form.
    pub fn composite(&self) -> String {
        join(&self.name, &self.version)
    }
}

impl fmt::Display for VersionedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, SEPARATOR, self.version)
    }
}

impl FromStr for VersionedName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Check whether `name` is a valid versioned cookbook name.
pub fn matches(name: &str) -> bool {
    split(name).is_some()
}

/// Split a composite name into `(canonical_name, version)`.
pub fn parse(name: &str) -> Result<(String, String)> {
    VersionedName::parse(name).map(|v| (v.name, v.version))
}

/// Join a canonical name and version into a composite name.
pub fn join(name: &str, version: &str) -> String {
    format!("{}{}{}", name, SEPARATOR, version)
}

/// Check whether `version` is 2 to 4 dot-separated numeric components.
pub fn is_version(version: &str) -> bool {
    let mut parts = 0;
    for part in version.split('.') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        parts += 1;
    }
    (MIN_VERSION_PARTS..=MAX_VERSION_PARTS).contains(&parts)
}

fn is_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn split(composite: &str) -> Option<(&str, &str)> {
    let (name, version) = composite.rsplit_once(SEPARATOR)?;
    (is_token(name) && is_version(version)).then_some((name, version))
}
