//! Sync planning
//!
//! Turns a source enumeration into the ordered list of actions that make the
//! destination mirror it. Planning performs no I/O. Every source item is
//! transferred regardless of what the destination already holds; the
//! destination set only marks which transfers replace an existing item.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::path::{ObjectKey, SyncRoot};
use crate::sync::lister::RemoteEntry;
use crate::sync::walker::LocalEntry;

/// Which way a sync copies data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local tree to bucket
    Push,
    /// Bucket to local tree
    Pull,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Push => f.write_str("push"),
            Direction::Pull => f.write_str("pull"),
        }
    }
}

/// A single step of a sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TransferAction {
    /// Create a local directory if it is missing
    EnsureDirectory { path: PathBuf },

    /// Upload a local file
    PutObject {
        local: PathBuf,
        key: ObjectKey,
        replaces: bool,
    },

    /// Download an object into a local file
    GetObject {
        key: ObjectKey,
        local: PathBuf,
        replaces: bool,
    },
}

impl TransferAction {
    /// Whether this action moves object data
    pub fn is_transfer(&self) -> bool {
        !matches!(self, TransferAction::EnsureDirectory { .. })
    }

    /// The item this action is about, as shown to users
    pub fn item(&self) -> String {
        match self {
            TransferAction::EnsureDirectory { path } => path.display().to_string(),
            TransferAction::PutObject { key, .. } | TransferAction::GetObject { key, .. } => {
                key.to_string()
            }
        }
    }
}

impl fmt::Display for TransferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferAction::EnsureDirectory { path } => write!(f, "mkdir {}", path.display()),
            TransferAction::PutObject { local, key, .. } => {
                write!(f, "put {} -> {key}", local.display())
            }
            TransferAction::GetObject { key, local, .. } => {
                write!(f, "get {key} -> {}", local.display())
            }
        }
    }
}

/// An item from the side being copied from
#[derive(Debug, Clone)]
pub enum SourceEntry {
    Local(LocalEntry),
    Remote(RemoteEntry),
}

impl From<LocalEntry> for SourceEntry {
    fn from(entry: LocalEntry) -> Self {
        SourceEntry::Local(entry)
    }
}

impl From<RemoteEntry> for SourceEntry {
    fn from(entry: RemoteEntry) -> Self {
        SourceEntry::Remote(entry)
    }
}

/// An immutable, ordered set of actions
///
/// A plan is consumed by value when executed, so it runs at most once.
#[derive(Debug, Serialize)]
pub struct Plan {
    direction: Direction,
    actions: Vec<TransferAction>,
}

impl Plan {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn actions(&self) -> &[TransferAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of put or get actions
    pub fn transfer_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_transfer()).count()
    }

    pub(crate) fn into_actions(self) -> Vec<TransferAction> {
        self.actions
    }
}

/// Incremental planner, fed one source entry at a time
pub struct SyncPlanner<'a> {
    direction: Direction,
    root: &'a SyncRoot,
    existing: &'a HashSet<ObjectKey>,
    seen_dirs: HashSet<PathBuf>,
    actions: Vec<TransferAction>,
}

impl<'a> SyncPlanner<'a> {
    /// `existing` holds the destination's current items as keys
    pub fn new(direction: Direction, root: &'a SyncRoot, existing: &'a HashSet<ObjectKey>) -> Self {
        Self {
            direction,
            root,
            existing,
            seen_dirs: HashSet::new(),
            actions: Vec::new(),
        }
    }

    /// Append the actions for one source entry
    pub fn add(&mut self, entry: impl Into<SourceEntry>) -> Result<()> {
        match (self.direction, entry.into()) {
            (Direction::Push, SourceEntry::Local(entry)) => self.add_local(entry),
            (Direction::Pull, SourceEntry::Remote(entry)) => self.add_remote(entry),
            (direction, SourceEntry::Local(entry)) => Err(Error::General(format!(
                "local file {} cannot be planned for a {direction}",
                entry.path.display()
            ))),
            (direction, SourceEntry::Remote(entry)) => Err(Error::General(format!(
                "object {} cannot be planned for a {direction}",
                entry.key
            ))),
        }
    }

    fn add_local(&mut self, entry: LocalEntry) -> Result<()> {
        let key = self.root.key_for(&entry.path)?;
        let local = self.root.local().join(&entry.path);
        let replaces = self.existing.contains(&key);
        self.actions.push(TransferAction::PutObject {
            local,
            key,
            replaces,
        });
        Ok(())
    }

    fn add_remote(&mut self, entry: RemoteEntry) -> Result<()> {
        let local = self.root.path_for(&entry.key)?;

        let root = self.root.local();
        let mut parents: Vec<&Path> = local
            .ancestors()
            .skip(1)
            .take_while(|dir| *dir != root)
            .collect();
        parents.reverse();
        for dir in parents {
            if self.seen_dirs.insert(dir.to_path_buf()) {
                self.actions.push(TransferAction::EnsureDirectory {
                    path: dir.to_path_buf(),
                });
            }
        }

        let replaces = self.existing.contains(&entry.key);
        self.actions.push(TransferAction::GetObject {
            key: entry.key,
            local,
            replaces,
        });
        Ok(())
    }

    pub fn finish(self) -> Plan {
        Plan {
            direction: self.direction,
            actions: self.actions,
        }
    }
}

/// Plan a whole sync from an already available source enumeration
pub fn plan<I>(
    direction: Direction,
    root: &SyncRoot,
    sources: I,
    existing: &HashSet<ObjectKey>,
) -> Result<Plan>
where
    I: IntoIterator,
    I::Item: Into<SourceEntry>,
{
    let mut planner = SyncPlanner::new(direction, root, existing);
    for entry in sources {
        planner.add(entry)?;
    }
    Ok(planner.finish())
}
