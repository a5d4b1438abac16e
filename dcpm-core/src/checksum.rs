//! Directory checksums.
//!
//! A project is fingerprinted as a flat manifest of every entry beneath its
//! root, sorted by relative path:
//!
//! ```text
//! dir   dependencies        -
//! file  templates/web.yaml  sha256(content)
//! file  values.yaml         sha256("")        # empty files still count
//! link  templates/shared    sha256(target path)
//! ```
//!
//! The digest is the SHA256 of the encoded manifest and is stored as the
//! sole content of `CHECKSUM` at the project root. The `CHECKSUM` file
//! itself is never part of the manifest.

use crate::error::{DcpmError, Result};
use crate::project::{Project, CHECKSUM_FILE};
use crate::render::walk_error;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

/// Fingerprint recorded for directories.
const DIR_MARKER: &str = "-";

/// Kind of a manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Dir,
    Link,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "dir",
            Self::Link => "link",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a directory manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path relative to the root, `/`-separated.
    pub path: String,
    pub kind: EntryKind,
    /// SHA256 of the content (files), of the target path (links), or `-` (directories).
    pub fingerprint: String,
}

/// Ordered manifest of a directory tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

/// Differences between two manifests, by relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

impl ManifestDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

impl Manifest {
    /// Build from entries in any order.
    pub fn from_entries(mut entries: Vec<ManifestEntry>) -> Self {
        entries.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
        Self { entries }
    }

    /// Walk `root` and fingerprint every entry except the root `CHECKSUM` file.
    ///
    /// Symlinks are recorded, never followed. File contents are hashed
    /// concurrently on the blocking pool.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub async fn build(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(DcpmError::DirectoryNotFound { path: root.to_path_buf() });
        }

        let mut entries = Vec::new();
        let mut hashing = JoinSet::new();

        for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            let relative = relative_path(root, entry.path())?;
            if entry.depth() == 1 && relative == CHECKSUM_FILE {
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                let target = std::fs::read_link(entry.path())
                    .map_err(|e| DcpmError::io(entry.path(), e))?;
                let fingerprint = sha256_hex(target.to_string_lossy().as_bytes());
                entries.push(ManifestEntry { path: relative, kind: EntryKind::Link, fingerprint });
            } else if file_type.is_dir() {
                entries.push(ManifestEntry {
                    path: relative,
                    kind: EntryKind::Dir,
                    fingerprint: DIR_MARKER.to_string(),
                });
            } else {
                let path = entry.into_path();
                hashing.spawn_blocking(move || {
                    let fingerprint = hash_file(&path)?;
                    Ok::<_, DcpmError>(ManifestEntry {
                        path: relative,
                        kind: EntryKind::File,
                        fingerprint,
                    })
                });
            }
        }

        while let Some(joined) = hashing.join_next().await {
            entries.push(joined.map_err(|e| DcpmError::Other(e.into()))??);
        }

        let manifest = Self::from_entries(entries);
        debug!(entries = manifest.len(), "Built manifest");
        Ok(manifest)
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lowercase hex SHA256 over the ordered manifest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update(entry.kind.as_str().as_bytes());
            hasher.update(b"\0");
            hasher.update(entry.path.as_bytes());
            hasher.update(b"\0");
            hasher.update(entry.fingerprint.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    /// What changed going from `self` to `other`.
    pub fn diff(&self, other: &Manifest) -> ManifestDiff {
        let before: BTreeMap<&str, &ManifestEntry> =
            self.entries.iter().map(|e| (e.path.as_str(), e)).collect();
        let after: BTreeMap<&str, &ManifestEntry> =
            other.entries.iter().map(|e| (e.path.as_str(), e)).collect();

        let mut diff = ManifestDiff::default();
        for (path, entry) in &after {
            match before.get(path) {
                None => diff.added.push(path.to_string()),
                Some(old) if old != entry => diff.changed.push(path.to_string()),
                Some(_) => {}
            }
        }
        diff.removed = before
            .keys()
            .filter(|path| !after.contains_key(*path))
            .map(|p| p.to_string())
            .collect();
        diff
    }
}

/// Compute the digest of `root` and store it in its `CHECKSUM` file.
#[instrument(skip_all, fields(root = %root.display()))]
pub async fn create(root: &Path) -> Result<String> {
    let manifest = Manifest::build(root).await?;
    let digest = manifest.digest();
    let path = Project::new(root).checksum_file();

    tokio::fs::write(&path, &digest).await.map_err(|e| DcpmError::io(&path, e))?;
    info!(entries = manifest.len(), digest = %digest, "Wrote checksum");
    Ok(digest)
}

/// Recompute the digest of `root` and compare it with the stored one.
#[instrument(skip_all, fields(root = %root.display()))]
pub async fn check(root: &Path) -> Result<String> {
    if !root.is_dir() {
        return Err(DcpmError::DirectoryNotFound { path: root.to_path_buf() });
    }

    let path = Project::new(root).checksum_file();
    if !path.is_file() {
        return Err(DcpmError::ChecksumFileNotFound { path });
    }

    let stored = tokio::fs::read_to_string(&path).await.map_err(|e| DcpmError::io(&path, e))?;
    let digest = Manifest::build(root).await?.digest();

    if stored.trim() == digest {
        info!(digest = %digest, "Checksum matches");
        Ok(digest)
    } else {
        debug!(stored = %stored.trim(), computed = %digest, "Checksum mismatch");
        Err(DcpmError::ChecksumMismatch)
    }
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|e| DcpmError::Other(e.into()))?;
    let parts: Vec<String> =
        relative.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect();
    Ok(parts.join("/"))
}

fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| DcpmError::io(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| DcpmError::io(path, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
