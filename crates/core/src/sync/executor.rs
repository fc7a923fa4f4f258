//! Plan execution
//!
//! Runs a [`Plan`] against the object store and the local filesystem. Every
//! action's failure is recorded and execution carries on. Directory actions
//! are awaited inline before any later action is dispatched, which keeps a
//! directory ahead of every download into it; puts and gets run on a bounded
//! pool of tasks. The driver task is the only writer of the result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::sync::SyncOptions;
use crate::sync::plan::{Direction, Plan, TransferAction};
use crate::traits::ObjectStore;

/// How a single action ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Succeeded,
    Failed { reason: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }
}

/// An executed action and its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub action: TransferAction,
    pub outcome: Outcome,
}

/// A failed item and why it failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub reason: String,
}

/// Progress notifications for the presentation layer
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Execution is starting
    Started { actions: usize, transfers: usize },
    /// One action has finished
    Finished(ActionRecord),
}

/// Summary of one sync run
///
/// Records appear in completion order.
#[derive(Debug, Clone)]
pub struct SyncResult {
    direction: Direction,
    records: Vec<ActionRecord>,
    walk_errors: Vec<ItemFailure>,
    cancelled: bool,
}

/// Serializable view of a [`SyncResult`]
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub direction: Direction,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub transferred: usize,
    pub cancelled: bool,
    pub failures: Vec<ItemFailure>,
    pub walk_errors: Vec<ItemFailure>,
}

impl SyncResult {
    pub(crate) fn new(direction: Direction) -> Self {
        Self {
            direction,
            records: Vec::new(),
            walk_errors: Vec::new(),
            cancelled: false,
        }
    }

    pub(crate) fn with_walk_errors(mut self, errors: Vec<ItemFailure>) -> Self {
        self.walk_errors = errors;
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    /// Actions that ran, successfully or not
    pub fn attempted(&self) -> usize {
        self.records.len()
    }

    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    /// Puts or gets that completed
    pub fn transferred(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.action.is_transfer() && r.outcome.is_success())
            .count()
    }

    pub fn failures(&self) -> Vec<ItemFailure> {
        self.records
            .iter()
            .filter_map(|r| match &r.outcome {
                Outcome::Failed { reason } => Some(ItemFailure {
                    item: r.action.item(),
                    reason: reason.clone(),
                }),
                Outcome::Succeeded => None,
            })
            .collect()
    }

    /// Local subtrees that could not be enumerated
    pub fn walk_errors(&self) -> &[ItemFailure] {
        &self.walk_errors
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// True when every planned item made it across
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.walk_errors.is_empty() && !self.cancelled
    }

    pub fn summary(&self) -> SyncSummary {
        SyncSummary {
            direction: self.direction,
            attempted: self.attempted(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            transferred: self.transferred(),
            cancelled: self.cancelled,
            failures: self.failures(),
            walk_errors: self.walk_errors.clone(),
        }
    }
}

/// Executes plans against one bucket
pub struct SyncExecutor {
    store: Arc<dyn ObjectStore>,
    fs: Arc<dyn FileSystem>,
    bucket: String,
    options: SyncOptions,
    events: Option<mpsc::UnboundedSender<SyncEvent>>,
    cancel: Option<watch::Receiver<bool>>,
}

impl SyncExecutor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        fs: Arc<dyn FileSystem>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            fs,
            bucket: bucket.into(),
            options: SyncOptions::default(),
            events: None,
            cancel: None,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Send a [`SyncEvent`] for every finished action
    pub fn with_events(mut self, events: mpsc::UnboundedSender<SyncEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Stop dispatching new actions once `cancel` becomes true
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(events) = &self.events {
            // The receiver going away only means nobody is watching progress.
            let _ = events.send(event);
        }
    }

    fn record(&self, result: &mut SyncResult, record: ActionRecord) {
        match &record.outcome {
            Outcome::Succeeded => debug!(action = %record.action, "Action succeeded"),
            Outcome::Failed { reason } => {
                warn!(action = %record.action, reason = %reason, "Action failed")
            }
        }
        self.emit(SyncEvent::Finished(record.clone()));
        result.records.push(record);
    }

    fn collect(
        &self,
        result: &mut SyncResult,
        in_flight: &mut HashMap<Id, TransferAction>,
        joined: std::result::Result<(Id, ActionRecord), JoinError>,
    ) {
        match joined {
            Ok((id, record)) => {
                in_flight.remove(&id);
                self.record(result, record);
            }
            Err(e) => {
                if let Some(action) = in_flight.remove(&e.id()) {
                    self.record(
                        result,
                        ActionRecord {
                            action,
                            outcome: Outcome::Failed {
                                reason: format!("worker stopped: {e}"),
                            },
                        },
                    );
                }
            }
        }
    }

    /// Run every action of `plan` and summarise the outcome
    pub async fn execute(&self, plan: Plan) -> SyncResult {
        let mut result = SyncResult::new(plan.direction());
        let concurrency = self.options.concurrency.max(1);

        info!(
            direction = %plan.direction(),
            bucket = %self.bucket,
            actions = plan.len(),
            concurrency,
            "Executing sync plan"
        );
        self.emit(SyncEvent::Started {
            actions: plan.len(),
            transfers: plan.transfer_count(),
        });

        let mut workers = JoinSet::new();
        let mut in_flight = HashMap::new();
        let mut cancel = self.cancel.clone();

        for action in plan.into_actions() {
            if self.is_cancelled() {
                info!("Sync cancelled, no further actions will start");
                result.cancelled = true;
                break;
            }

            if let TransferAction::EnsureDirectory { path } = &action {
                let outcome = match self.fs.ensure_dir(path).await {
                    Ok(()) => Outcome::Succeeded,
                    Err(e) => Outcome::Failed {
                        reason: e.to_string(),
                    },
                };
                self.record(&mut result, ActionRecord { action, outcome });
                continue;
            }

            while workers.len() >= concurrency {
                tokio::select! {
                    Some(joined) = workers.join_next_with_id() => {
                        self.collect(&mut result, &mut in_flight, joined);
                    }
                    () = cancelled(&mut cancel) => break,
                }
            }

            // A cancel may land while waiting for a free slot.
            if self.is_cancelled() {
                info!("Sync cancelled, no further actions will start");
                result.cancelled = true;
                break;
            }

            let task = run_transfer(
                Arc::clone(&self.store),
                Arc::clone(&self.fs),
                self.bucket.clone(),
                self.options.action_timeout,
                action.clone(),
            );
            let handle = workers.spawn(task);
            in_flight.insert(handle.id(), action);
        }

        while let Some(joined) = workers.join_next_with_id().await {
            self.collect(&mut result, &mut in_flight, joined);
        }

        info!(
            succeeded = result.succeeded(),
            failed = result.failed(),
            cancelled = result.cancelled,
            "Sync plan finished"
        );
        result
    }
}

/// Resolves once the cancel flag is raised, never if there is none
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = cancel
        && rx.wait_for(|cancelled| *cancelled).await.is_ok()
    {
        return;
    }
    std::future::pending::<()>().await
}

async fn run_transfer(
    store: Arc<dyn ObjectStore>,
    fs: Arc<dyn FileSystem>,
    bucket: String,
    timeout: Duration,
    action: TransferAction,
) -> ActionRecord {
    let work = async {
        match &action {
            TransferAction::PutObject { local, key, .. } => {
                let data = fs.read(local).await?;
                store.put_object(&bucket, key.as_str(), data).await?;
                Ok(())
            }
            TransferAction::GetObject { key, local, .. } => {
                let data = store.get_object(&bucket, key.as_str()).await?;
                fs.write(local, data).await
            }
            TransferAction::EnsureDirectory { path } => fs.ensure_dir(path).await,
        }
    };

    let result: Result<()> = match tokio::time::timeout(timeout, work).await {
        Ok(done) => done,
        Err(_) => Err(Error::Transfer {
            item: action.item(),
            message: format!("timed out after {}s", timeout.as_secs_f64()),
        }),
    };

    let outcome = match result {
        Ok(()) => Outcome::Succeeded,
        Err(Error::Transfer { message, .. }) => Outcome::Failed { reason: message },
        Err(e) => Outcome::Failed {
            reason: e.to_string(),
        },
    };
    ActionRecord { action, outcome }
}
