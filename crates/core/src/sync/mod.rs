//! Bidirectional sync between a local tree and a bucket
//!
//! [`SyncEngine`] ties the pieces together: it enumerates the source side
//! (local walk or remote listing), builds a [`Plan`] against the destination's
//! current contents and hands the plan to a [`SyncExecutor`].

pub mod executor;
pub mod lister;
pub mod plan;
pub mod walker;

use std::collections::HashSet;
use std::path::Path;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_ACTION_TIMEOUT_SECS, DEFAULT_CONCURRENCY, SyncSettings};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::path::{ObjectKey, SyncRoot, to_key};
use crate::traits::ObjectStore;

pub use executor::{
    ActionRecord, ItemFailure, Outcome, SyncEvent, SyncExecutor, SyncResult, SyncSummary,
};
pub use lister::{RemoteEntry, RemoteLister};
pub use plan::{Direction, Plan, SourceEntry, SyncPlanner, TransferAction};
pub use walker::LocalEntry;

/// Execution tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Maximum number of transfers in flight
    pub concurrency: usize,

    /// Upper bound for a single get or put
    pub action_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            action_timeout: Duration::from_secs(DEFAULT_ACTION_TIMEOUT_SECS),
        }
    }
}

impl From<&SyncSettings> for SyncOptions {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            concurrency: settings.concurrency,
            action_timeout: settings.action_timeout(),
        }
    }
}

/// A plan plus the local items that could not be enumerated while building it
#[derive(Debug)]
pub struct PlannedSync {
    pub plan: Plan,
    pub walk_errors: Vec<ItemFailure>,
}

/// Plans and runs syncs between local trees and buckets
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
    fs: Arc<dyn FileSystem>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ObjectStore>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            store,
            fs,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Enumerate both sides and build the plan without transferring anything
    pub async fn plan(&self, direction: Direction, root: &SyncRoot) -> Result<PlannedSync> {
        info!(%direction, %root, "Planning sync");
        let planned = match direction {
            Direction::Push => self.plan_push(root).await?,
            Direction::Pull => self.plan_pull(root).await?,
        };
        info!(
            actions = planned.plan.len(),
            transfers = planned.plan.transfer_count(),
            walk_errors = planned.walk_errors.len(),
            "Sync planned"
        );
        Ok(planned)
    }

    /// Plan and execute one sync
    ///
    /// Returns `Err` only for structural failures found before any transfer.
    /// Per-item failures, walk errors and cancellation are reported in the
    /// [`SyncResult`].
    pub async fn run(
        &self,
        direction: Direction,
        root: &SyncRoot,
        events: Option<mpsc::UnboundedSender<SyncEvent>>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<SyncResult> {
        let planned = self.plan(direction, root).await?;
        self.execute(planned, root, events, cancel).await
    }

    /// Execute a plan built by [`SyncEngine::plan`] for the same root
    pub async fn execute(
        &self,
        planned: PlannedSync,
        root: &SyncRoot,
        events: Option<mpsc::UnboundedSender<SyncEvent>>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<SyncResult> {
        let PlannedSync { plan, walk_errors } = planned;

        if plan.direction() == Direction::Pull {
            self.fs.ensure_dir(root.local()).await?;
        }

        let mut executor = SyncExecutor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.fs),
            root.bucket(),
        )
        .with_options(self.options.clone());
        if let Some(events) = events {
            executor = executor.with_events(events);
        }
        if let Some(cancel) = cancel {
            executor = executor.with_cancel(cancel);
        }

        Ok(executor.execute(plan).await.with_walk_errors(walk_errors))
    }

    async fn remote_keys(&self, bucket: &str) -> Result<HashSet<ObjectKey>> {
        RemoteLister::new(self.store.as_ref())
            .list(bucket)
            .map_ok(|entry| entry.key)
            .try_collect()
            .await
    }

    async fn plan_push(&self, root: &SyncRoot) -> Result<PlannedSync> {
        if !self.fs.is_dir(root.local()).await {
            return Err(Error::InvalidPath(format!(
                "{} is not a directory",
                root.local().display()
            )));
        }

        let existing = self.remote_keys(root.bucket()).await?;
        debug!(bucket = root.bucket(), objects = existing.len(), "Listed destination");

        let fs = Arc::clone(&self.fs);
        let root = root.clone();
        tokio::task::spawn_blocking(move || plan_local_tree(fs.as_ref(), &root, &existing))
            .await
            .map_err(|e| Error::General(format!("local walk stopped: {e}")))?
    }

    async fn plan_pull(&self, root: &SyncRoot) -> Result<PlannedSync> {
        let existing = if self.fs.is_dir(root.local()).await {
            let fs = Arc::clone(&self.fs);
            let local = root.local().to_path_buf();
            tokio::task::spawn_blocking(move || local_keys(fs.as_ref(), &local))
                .await
                .map_err(|e| Error::General(format!("local walk stopped: {e}")))?
        } else {
            HashSet::new()
        };
        debug!(path = %root.local().display(), files = existing.len(), "Listed destination");

        let mut planner = SyncPlanner::new(Direction::Pull, root, &existing);
        let lister = RemoteLister::new(self.store.as_ref());
        let mut entries = pin!(lister.list(root.bucket()));
        while let Some(entry) = entries.try_next().await? {
            planner.add(entry)?;
        }

        Ok(PlannedSync {
            plan: planner.finish(),
            walk_errors: Vec::new(),
        })
    }
}

/// Plan a push from a blocking walk of the local root
///
/// Unreadable subtrees and files whose names cannot become keys are reported
/// as walk errors and left out of the plan.
fn plan_local_tree(
    fs: &dyn FileSystem,
    root: &SyncRoot,
    existing: &HashSet<ObjectKey>,
) -> Result<PlannedSync> {
    let mut planner = SyncPlanner::new(Direction::Push, root, existing);
    let mut walk_errors = Vec::new();

    for entry in fs.walk(root.local()) {
        let failure = match entry {
            Ok(entry) => {
                let path = root.local().join(&entry.path);
                match planner.add(entry) {
                    Ok(()) => continue,
                    Err(Error::InvalidPath(message)) => ItemFailure {
                        item: path.display().to_string(),
                        reason: message,
                    },
                    Err(e) => return Err(e),
                }
            }
            Err(Error::LocalWalk { path, message }) => ItemFailure {
                item: path.display().to_string(),
                reason: message,
            },
            Err(e) => ItemFailure {
                item: root.local().display().to_string(),
                reason: e.to_string(),
            },
        };
        warn!(item = %failure.item, reason = %failure.reason, "Local item skipped");
        walk_errors.push(failure);
    }

    Ok(PlannedSync {
        plan: planner.finish(),
        walk_errors,
    })
}

/// Keys of the files already present below a pull destination
fn local_keys(fs: &dyn FileSystem, local: &Path) -> HashSet<ObjectKey> {
    fs.walk(local)
        .filter_map(|entry| match entry {
            Ok(entry) => to_key(local, &entry.path).ok(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable destination item");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;
    use crate::traits::{ListResult, MockObjectStore, ObjectInfo};
    use tempfile::TempDir;

    fn listing(keys: &[&str]) -> ListResult {
        ListResult {
            items: keys.iter().map(|k| ObjectInfo::file(*k, 1)).collect(),
            truncated: false,
            continuation_token: None,
        }
    }

    #[test]
    fn test_options_from_settings() {
        let settings = SyncSettings {
            concurrency: 3,
            action_timeout_secs: 12,
        };
        let options = SyncOptions::from(&settings);
        assert_eq!(options.concurrency, 3);
        assert_eq!(options.action_timeout, Duration::from_secs(12));
    }

    #[tokio::test]
    async fn test_push_root_must_be_a_directory() {
        let temp = TempDir::new().unwrap();
        let root = SyncRoot::new(temp.path().join("missing"), "bucket").unwrap();

        let mut store = MockObjectStore::new();
        store.expect_list_objects().never();

        let engine = SyncEngine::new(Arc::new(store), Arc::new(LocalFs));
        let result = engine.plan(Direction::Push, &root).await;
        assert!(matches!(result, Err(Error::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_push_marks_replaced_objects() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("old.txt"), "1").unwrap();
        std::fs::write(temp.path().join("new.txt"), "2").unwrap();
        let root = SyncRoot::new(temp.path(), "bucket").unwrap();

        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .returning(|_, _| Ok(listing(&["old.txt", "stale.txt"])));

        let engine = SyncEngine::new(Arc::new(store), Arc::new(LocalFs));
        let planned = engine.plan(Direction::Push, &root).await.unwrap();

        let replaced: Vec<(String, bool)> = planned
            .plan
            .actions()
            .iter()
            .map(|a| match a {
                TransferAction::PutObject { key, replaces, .. } => (key.to_string(), *replaces),
                other => panic!("unexpected action {other}"),
            })
            .collect();
        assert_eq!(
            replaced,
            vec![("new.txt".to_string(), false), ("old.txt".to_string(), true)]
        );
        assert!(planned.walk_errors.is_empty());
    }

    #[tokio::test]
    async fn test_pull_into_missing_root_creates_it() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let root = SyncRoot::new(&out, "bucket").unwrap();

        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .returning(|_, _| Ok(listing(&["readme.md"])));
        store
            .expect_get_object()
            .returning(|_, _| Ok(b"hello".to_vec()));

        let engine = SyncEngine::new(Arc::new(store), Arc::new(LocalFs));
        let result = engine.run(Direction::Pull, &root, None, None).await.unwrap();

        assert!(result.is_success());
        assert_eq!(std::fs::read(out.join("readme.md")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_pull_marks_existing_local_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("kept"), "x").unwrap();
        let root = SyncRoot::new(temp.path(), "bucket").unwrap();

        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .returning(|_, _| Ok(listing(&["kept", "fresh"])));

        let engine = SyncEngine::new(Arc::new(store), Arc::new(LocalFs));
        let planned = engine.plan(Direction::Pull, &root).await.unwrap();

        assert!(matches!(
            &planned.plan.actions()[0],
            TransferAction::GetObject { replaces: true, .. }
        ));
        assert!(matches!(
            &planned.plan.actions()[1],
            TransferAction::GetObject { replaces: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_execute_runs_an_earlier_plan() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let root = SyncRoot::new(&out, "bucket").unwrap();

        let mut store = MockObjectStore::new();
        store
            .expect_list_objects()
            .times(1)
            .returning(|_, _| Ok(listing(&["docs/a.md", "b.md"])));
        store
            .expect_get_object()
            .times(2)
            .returning(|_, key| Ok(key.as_bytes().to_vec()));

        let engine = SyncEngine::new(Arc::new(store), Arc::new(LocalFs));
        let planned = engine.plan(Direction::Pull, &root).await.unwrap();
        assert!(!out.exists());

        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let result = engine
            .execute(planned, &root, None, Some(cancel_rx))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.transferred(), 2);
        assert_eq!(std::fs::read(out.join("docs/a.md")).unwrap(), b"docs/a.md");
    }
}
