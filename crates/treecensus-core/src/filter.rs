//! Extension filtering strategy, chosen once per run.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;

use crate::error::CensusError;

/// How files are filtered by extension.
///
/// The variant is selected once from the configured extension list and
/// then passed to every worker, so the hot path never re-inspects the
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExtensionFilter {
    /// Keep every file.
    #[default]
    All,
    /// Exactly one extension, applied while a directory is read so that
    /// non-matching entries are dropped before they are yielded.
    Single(String),
    /// Several extensions, tested per file against a lowercase set.
    Set(HashSet<String>),
}

impl ExtensionFilter {
    /// Build the filter from user-supplied extensions.
    ///
    /// Accepts `exe`, `.exe` and `*.exe` forms; matching is case-insensitive.
    /// Wildcards inside an extension are rejected.
    pub fn from_extensions<I, S>(extensions: I) -> Result<Self, CensusError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = HashSet::new();
        for raw in extensions {
            let ext = normalize_extension(raw.as_ref());
            if ext.is_empty() {
                continue;
            }
            if ext.contains(['*', '?', '/', '\\']) {
                return Err(CensusError::invalid_config(format!(
                    "extension '{}' must be a literal extension",
                    raw.as_ref()
                )));
            }
            set.insert(ext);
        }

        Ok(match set.len() {
            0 => Self::All,
            1 => Self::Single(set.into_iter().next().unwrap_or_default()),
            _ => Self::Set(set),
        })
    }

    /// Whether this filter is applied at the enumeration source.
    pub fn prunes_at_source(&self) -> bool {
        matches!(self, Self::Single(_))
    }

    /// Check whether a file path passes the filter.
    pub fn matches(&self, path: &Path) -> bool {
        self.matches_name(path.file_name().unwrap_or_default())
    }

    /// Check whether a file name passes the filter.
    pub fn matches_name(&self, name: &OsStr) -> bool {
        match self {
            Self::All => true,
            Self::Single(ext) => extension_of(name).is_some_and(|e| e == *ext),
            Self::Set(set) => extension_of(name).is_some_and(|e| set.contains(&e)),
        }
    }
}

/// Strip `*` and `.` prefixes and lowercase.
fn normalize_extension(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('*')
        .trim_start_matches('.')
        .to_lowercase()
}

/// Lowercased extension of a file name, if any.
fn extension_of(name: &OsStr) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}
