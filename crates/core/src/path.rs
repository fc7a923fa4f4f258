//! Path and key mapping
//!
//! Translates between filesystem paths under a sync root and object keys.
//! Keys use `/` as their only separator and never begin with it. The mapping
//! performs no escaping: characters the store treats specially are passed
//! through for the store client to deal with.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator used inside object keys
pub const KEY_SEPARATOR: char = '/';

/// An object key within a bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Wrap a raw key as reported by the store
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key looks like a directory marker (`photos/`)
    pub fn is_dir_marker(&self) -> bool {
        self.0.ends_with(KEY_SEPARATOR)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The anchor of a sync: a local directory paired with a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRoot {
    local: PathBuf,
    bucket: String,
}

impl SyncRoot {
    /// Create a sync root, making the local directory absolute
    pub fn new(local: impl AsRef<Path>, bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.trim().is_empty() {
            return Err(Error::InvalidPath("Bucket name cannot be empty".into()));
        }
        let local = local.as_ref();
        if local.as_os_str().is_empty() {
            return Err(Error::InvalidPath("Local directory cannot be empty".into()));
        }
        let local = std::path::absolute(local)?;
        Ok(Self { local, bucket })
    }

    pub fn local(&self) -> &Path {
        &self.local
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Map a local path under this root to its key
    pub fn key_for(&self, path: &Path) -> Result<ObjectKey> {
        to_key(&self.local, path)
    }

    /// Map a key to its absolute path under this root
    pub fn path_for(&self, key: &ObjectKey) -> Result<PathBuf> {
        to_local_path(&self.local, key)
    }
}

impl fmt::Display for SyncRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.local.display(), self.bucket)
    }
}

/// Translate a path under `root` into an object key
///
/// Absolute paths must start with `root`; relative paths are taken as
/// relative to `root`.
pub fn to_key(root: &Path, path: &Path) -> Result<ObjectKey> {
    let relative = if path.is_absolute() {
        path.strip_prefix(root).map_err(|_| {
            Error::InvalidPath(format!(
                "{} is not inside {}",
                path.display(),
                root.display()
            ))
        })?
    } else {
        path
    };

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment.to_str().ok_or_else(|| {
                    Error::InvalidPath(format!("{} is not valid UTF-8", path.display()))
                })?;
                segments.push(segment);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidPath(format!(
                    "{} escapes {}",
                    path.display(),
                    root.display()
                )));
            }
        }
    }

    if segments.is_empty() {
        return Err(Error::InvalidPath(format!(
            "{} is the sync root, not a file below it",
            path.display()
        )));
    }

    Ok(ObjectKey(segments.join("/")))
}

/// Translate an object key into a path under `root`
pub fn to_local_path(root: &Path, key: &ObjectKey) -> Result<PathBuf> {
    let raw = key.as_str();
    if raw.is_empty() {
        return Err(Error::InvalidPath("Object key cannot be empty".into()));
    }
    if raw.starts_with(KEY_SEPARATOR) {
        return Err(Error::InvalidPath(format!(
            "Key '{raw}' begins with '{KEY_SEPARATOR}'"
        )));
    }

    let mut path = root.to_path_buf();
    for segment in raw.split(KEY_SEPARATOR) {
        match segment {
            "" => {
                return Err(Error::InvalidPath(format!(
                    "Key '{raw}' contains an empty segment"
                )));
            }
            "." | ".." => {
                return Err(Error::InvalidPath(format!(
                    "Key '{raw}' escapes {}",
                    root.display()
                )));
            }
            segment => path.push(segment),
        }
    }
    Ok(path)
}
