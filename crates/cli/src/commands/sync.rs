//! push and pull commands - Mirror a directory tree to or from a bucket
//!
//! Both directions share the same flow: plan against the destination, run the
//! plan with a progress bar, then report a summary. Ctrl-C while planning
//! ends the process; once transfers start it stops new ones from starting and
//! reports what finished.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use bsync_core::sync::{ItemFailure, SyncEvent, SyncResult};
use bsync_core::{Direction, LocalFs, Plan, PlannedSync, SyncEngine, SyncOptions, SyncRoot};

use super::{Context, fail};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Options shared by push and pull
#[derive(Args, Debug)]
pub struct SyncFlags {
    /// Show the planned actions without transferring anything
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of transfers in flight (overrides the config file)
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,
}

/// Upload a local directory into a bucket
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Local directory to upload
    pub local_dir: PathBuf,

    /// Destination bucket
    pub bucket: String,

    #[command(flatten)]
    pub sync: SyncFlags,
}

/// Download a bucket into a local directory
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Source bucket
    pub bucket: String,

    /// Local directory to download into (created if missing)
    pub local_dir: PathBuf,

    #[command(flatten)]
    pub sync: SyncFlags,
}

#[derive(Debug, Serialize)]
struct DryRunOutput<'a> {
    dry_run: bool,
    #[serde(flatten)]
    plan: &'a Plan,
    walk_errors: &'a [ItemFailure],
}

/// Execute the push command
pub async fn push(args: PushArgs, ctx: &Context) -> ExitCode {
    run(Direction::Push, &args.local_dir, &args.bucket, &args.sync, ctx).await
}

/// Execute the pull command
pub async fn pull(args: PullArgs, ctx: &Context) -> ExitCode {
    run(Direction::Pull, &args.local_dir, &args.bucket, &args.sync, ctx).await
}

async fn run(
    direction: Direction,
    local: &Path,
    bucket: &str,
    flags: &SyncFlags,
    ctx: &Context,
) -> ExitCode {
    let formatter = ctx.formatter();

    let root = match SyncRoot::new(local, bucket) {
        Ok(root) => root,
        Err(e) => return fail(&formatter, "Invalid sync root", &e),
    };

    let mut options = SyncOptions::from(&ctx.config.sync);
    if let Some(concurrency) = flags.concurrency {
        options.concurrency = usize::from(concurrency);
    }

    let client = match ctx.connect().await {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };
    let engine = SyncEngine::new(Arc::new(client), Arc::new(LocalFs)).with_options(options);

    // No interrupt handler yet: Ctrl-C while enumerating ends the process.
    let spinner = ProgressBar::spinner(
        formatter.config(),
        &format!("Planning {direction} of {root}"),
    );
    let planned = engine.plan(direction, &root).await;
    spinner.finish_and_clear();
    let planned = match planned {
        Ok(planned) => planned,
        Err(e) => return fail(&formatter, &format!("Cannot plan {direction} {root}"), &e),
    };

    if flags.dry_run {
        return report_plan(&formatter, &planned);
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let progress = tokio::spawn(show_progress(events_rx, formatter.config().clone()));
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, letting in-flight transfers finish");
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = engine
        .execute(planned, &root, Some(events_tx), Some(cancel_rx))
        .await;
    interrupt.abort();
    // The progress task ends once the engine drops its event sender.
    let _ = progress.await;

    match outcome {
        Ok(result) => report(&formatter, &root, &result),
        Err(e) => fail(&formatter, &format!("Cannot {direction} {root}"), &e),
    }
}

fn report_plan(formatter: &Formatter, planned: &PlannedSync) -> ExitCode {
    if formatter.is_json() {
        formatter.json(&DryRunOutput {
            dry_run: true,
            plan: &planned.plan,
            walk_errors: &planned.walk_errors,
        });
    } else {
        for action in planned.plan.actions() {
            formatter.println(&action.to_string());
        }
        for failure in &planned.walk_errors {
            formatter.warning(&format!("Skipping {}: {}", failure.item, failure.reason));
        }
        formatter.println(&formatter.dim(&format!(
            "{} actions planned ({} transfers), nothing was changed",
            planned.plan.len(),
            planned.plan.transfer_count()
        )));
    }

    if planned.walk_errors.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    }
}

async fn show_progress(mut events: mpsc::UnboundedReceiver<SyncEvent>, config: OutputConfig) {
    let mut bar: Option<ProgressBar> = None;

    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::Started { actions, .. } => {
                bar = Some(ProgressBar::new(&config, actions as u64));
            }
            SyncEvent::Finished(record) => {
                if let Some(bar) = &bar {
                    bar.set_message(&record.action.item());
                    bar.inc(1);
                }
            }
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
}

fn report(formatter: &Formatter, root: &SyncRoot, result: &SyncResult) -> ExitCode {
    let summary = result.summary();

    if formatter.is_json() {
        formatter.json(&summary);
    } else {
        for failure in &summary.walk_errors {
            formatter.warning(&format!("Skipped {}: {}", failure.item, failure.reason));
        }
        for failure in &summary.failures {
            formatter.error(&format!("Failed {}: {}", failure.item, failure.reason));
        }

        let line = format!(
            "{} {root}: {} transferred, {} failed, {} skipped",
            summary.direction, summary.transferred, summary.failed, summary.walk_errors.len()
        );
        if result.is_cancelled() {
            formatter.warning(&format!("Interrupted. {line}"));
        } else if result.is_success() {
            formatter.success(&line);
        } else {
            formatter.println(&line);
        }
    }

    exit_code_for(result.is_cancelled(), result.is_success())
}

fn exit_code_for(cancelled: bool, success: bool) -> ExitCode {
    if cancelled {
        ExitCode::Interrupted
    } else if success {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsync_core::sync::LocalEntry;
    use std::collections::HashSet;

    #[test]
    fn test_exit_code_for_outcomes() {
        assert_eq!(exit_code_for(false, true), ExitCode::Success);
        assert_eq!(exit_code_for(false, false), ExitCode::GeneralError);
        assert_eq!(exit_code_for(true, false), ExitCode::Interrupted);
    }

    #[test]
    fn test_plan_with_walk_errors_is_not_clean() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = SyncRoot::new(temp.path(), "www").unwrap();
        let plan = bsync_core::sync::plan::plan(
            Direction::Push,
            &root,
            [LocalEntry::new("index.html", 3)],
            &HashSet::new(),
        )
        .unwrap();
        let quiet = Formatter::new(OutputConfig {
            quiet: true,
            ..Default::default()
        });

        let clean = PlannedSync {
            plan,
            walk_errors: Vec::new(),
        };
        assert_eq!(report_plan(&quiet, &clean), ExitCode::Success);

        let skipped = PlannedSync {
            walk_errors: vec![ItemFailure {
                item: "locked".into(),
                reason: "permission denied".into(),
            }],
            ..clean
        };
        assert_eq!(report_plan(&quiet, &skipped), ExitCode::GeneralError);
    }

    #[tokio::test]
    async fn test_progress_task_ends_with_sender() {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = OutputConfig {
            no_progress: true,
            ..Default::default()
        };
        let task = tokio::spawn(show_progress(rx, config));
        tx.send(SyncEvent::Started {
            actions: 1,
            transfers: 1,
        })
        .unwrap();
        drop(tx);
        task.await.unwrap();
    }
}
