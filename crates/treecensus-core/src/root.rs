//! Roots, root tags and scan targets.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Whether a root lives on a local volume or a network share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RootKind {
    /// Local drive or folder.
    Local,
    /// UNC share; `host` is probed before scanning.
    Network { host: String },
}

/// A user-supplied scan root, resolved once and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    /// Input string as given by the user.
    pub raw: String,
    /// Resolved absolute form.
    pub path: PathBuf,
    /// Local or network.
    pub kind: RootKind,
}

impl Root {
    /// Parse a raw root string.
    ///
    /// Returns `None` for blank input. Local roots are made absolute against
    /// the current directory; network roots keep their UNC form.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return None;
        }

        let kind = match network_host(trimmed) {
            Some(host) => RootKind::Network {
                host: host.to_string(),
            },
            None => RootKind::Local,
        };

        let path = match kind {
            RootKind::Local => {
                let absolute =
                    std::path::absolute(trimmed).unwrap_or_else(|_| PathBuf::from(trimmed));
                normalize(&absolute)
            }
            RootKind::Network { .. } => PathBuf::from(trim_unc(trimmed)),
        };

        Some(Self {
            raw: raw.to_string(),
            path,
            kind,
        })
    }

    /// Whether this root is a network share.
    pub fn is_network(&self) -> bool {
        matches!(self.kind, RootKind::Network { .. })
    }

    /// Host to probe, for network roots.
    pub fn host(&self) -> Option<&str> {
        match &self.kind {
            RootKind::Network { host } => Some(host),
            RootKind::Local => None,
        }
    }

    /// Identifier written into every record of this root.
    pub fn id(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Filesystem-safe tag naming this root's archive and entry.
    pub fn tag(&self) -> RootTag {
        RootTag::derive(&self.id(), self.is_network())
    }
}

/// Extract the host of a UNC path (`\\host\share`, `//host/share` or
/// `\\?\UNC\host\share`). Returns `None` for local paths.
pub fn network_host(path: &str) -> Option<&str> {
    let rest = unc_body(path)?;
    rest.split(['\\', '/']).find(|s| !s.is_empty())
}

/// Everything after the UNC prefix, or `None` for non-UNC paths.
fn unc_body(path: &str) -> Option<&str> {
    let lowered = path.get(..8).map(str::to_ascii_lowercase);
    if lowered.as_deref() == Some(r"\\?\unc\") {
        return path.get(8..);
    }
    // Device namespaces (`\\?\C:\`, `\\.\pipe`) are not shares.
    if [r"\\?\", r"\\.\", "//?/", "//./"]
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return None;
    }
    path.strip_prefix(r"\\")
        .or_else(|| path.strip_prefix("//"))
        .filter(|rest| !rest.is_empty())
}

/// Drop trailing separators from a UNC path.
fn trim_unc(path: &str) -> &str {
    path.trim_end_matches(['\\', '/'])
}

/// Rebuild a path from its components, dropping `.` and trailing separators.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Filesystem-safe name derived from a root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootTag(String);

impl RootTag {
    /// Derive the tag for a root identifier.
    ///
    /// Local roots drop a `\\?\` or `\\.\` prefix, replace `:`, `\` and `/`
    /// with `_` and trim surrounding underscores. Network roots become
    /// `UNC_` followed by host, share and sub-path segments joined by `_`.
    pub fn derive(id: &str, network: bool) -> Self {
        let tag = if network {
            let body = unc_body(id).unwrap_or(id);
            let segments: Vec<&str> = body.split(['\\', '/']).filter(|s| !s.is_empty()).collect();
            format!("UNC_{}", segments.join("_"))
        } else {
            let local = ["\\\\?\\", "//?/", "\\\\.\\", "//./"]
                .iter()
                .find_map(|prefix| id.strip_prefix(prefix))
                .unwrap_or(id);
            local.replace([':', '\\', '/'], "_").trim_matches('_').to_string()
        };

        if tag.is_empty() {
            Self("ROOT".to_string())
        } else {
            Self(tag)
        }
    }

    /// The tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The same tag with a numeric suffix, for roots whose tags collide.
    pub fn with_suffix(&self, n: usize) -> Self {
        Self(format!("{}_{n}", self.0))
    }

    /// Archive file name, `<tag>.zip`.
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.0)
    }

    /// Entry name inside the archive, `<tag>.csv`.
    pub fn entry_name(&self) -> String {
        format!("{}.csv", self.0)
    }
}

impl std::fmt::Display for RootTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How deep a target is enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetDepth {
    /// Files directly inside the directory. Used for the root itself, whose
    /// subdirectories are separate targets.
    Shallow,
    /// The whole subtree.
    Recursive,
}

/// A top-level directory of a root, queued for scanning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Directory to scan.
    pub path: PathBuf,
    /// Enumeration depth.
    pub depth: TargetDepth,
}

impl Target {
    /// The root itself: its own files only.
    pub fn root(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            depth: TargetDepth::Shallow,
        }
    }

    /// An immediate subdirectory: scanned recursively.
    pub fn subtree(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            depth: TargetDepth::Recursive,
        }
    }

    /// Whether this target lives on a network share.
    pub fn is_network(&self) -> bool {
        network_host(&self.path.to_string_lossy()).is_some()
    }
}

impl Ord for Target {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.depth.cmp(&other.depth))
    }
}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
