//! Local tree enumeration
//!
//! Depth-first walk yielding regular files only. Symbolic links are neither
//! followed nor yielded, so link cycles cannot occur. A directory that cannot
//! be read produces one error and the walk moves on to its siblings.

use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A regular file found below the sync root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalEntry {
    /// Path relative to the walk root
    pub path: PathBuf,

    /// Size in bytes
    pub size: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,
}

impl LocalEntry {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            last_modified: None,
        }
    }
}

/// Walk `root` and lazily yield every regular file below it
pub fn walk(root: &Path) -> impl Iterator<Item = Result<LocalEntry>> + Send + use<> {
    let base = root.to_path_buf();

    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(entry) => {
                let file_type = entry.file_type();
                if !file_type.is_file() {
                    if file_type.is_symlink() {
                        debug!(path = %entry.path().display(), "Skipping symbolic link");
                    }
                    return None;
                }

                let relative = match entry.path().strip_prefix(&base) {
                    Ok(relative) => relative.to_path_buf(),
                    Err(_) => return None,
                };

                Some(match entry.metadata() {
                    Ok(metadata) => Ok(LocalEntry {
                        path: relative,
                        size: metadata.len(),
                        last_modified: metadata
                            .modified()
                            .ok()
                            .and_then(|t| Timestamp::try_from(t).ok()),
                    }),
                    Err(e) => Err(Error::LocalWalk {
                        path: entry.path().to_path_buf(),
                        message: e.to_string(),
                    }),
                })
            }
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| base.clone());
                warn!(path = %path.display(), error = %e, "Skipping unreadable subtree");
                Some(Err(Error::LocalWalk {
                    path,
                    message: e
                        .io_error()
                        .map(|io| io.to_string())
                        .unwrap_or_else(|| e.to_string()),
                }))
            }
        })
}
