//! empty command - Delete every object in a bucket
//!
//! Streams the bucket listing and deletes keys in batches as they arrive.

use std::pin::pin;

use bsync_core::traits::MAX_KEYS_PER_PAGE;
use bsync_core::{ObjectStore, RemoteLister};
use clap::Args;
use futures::TryStreamExt;
use serde::Serialize;
use tracing::debug;

use super::{Context, fail};
use crate::exit_code::ExitCode;
use crate::output::ProgressBar;

/// Largest batch a single DeleteObjects request accepts
const DELETE_BATCH: usize = MAX_KEYS_PER_PAGE as usize;

/// Delete every object in a bucket
#[derive(Args, Debug)]
pub struct EmptyArgs {
    /// Bucket to empty
    pub bucket: String,
}

#[derive(Debug, Serialize)]
struct EmptyOutput {
    bucket: String,
    deleted: usize,
    failed: usize,
}

/// Execute the empty command
pub async fn execute(args: EmptyArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();

    let client = match ctx.connect().await {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    let spinner = ProgressBar::spinner(
        formatter.config(),
        &format!("Emptying bucket '{}'", args.bucket),
    );

    let lister = RemoteLister::new(&client).with_markers();
    let mut entries = pin!(lister.list(&args.bucket));
    let mut batch = Vec::with_capacity(DELETE_BATCH);
    let mut deleted = 0;
    let mut failed = 0;

    loop {
        let next = match entries.try_next().await {
            Ok(next) => next,
            Err(e) => {
                spinner.finish_and_clear();
                return fail(&formatter, "Failed to list objects", &e);
            }
        };
        let done = next.is_none();
        if let Some(entry) = next {
            batch.push(entry.key.into_string());
        }

        if batch.len() == DELETE_BATCH || (done && !batch.is_empty()) {
            let requested = batch.len();
            match client.delete_objects(&args.bucket, std::mem::take(&mut batch)).await {
                Ok(keys) => {
                    deleted += keys.len();
                    failed += requested - keys.len().min(requested);
                }
                Err(e) => {
                    spinner.finish_and_clear();
                    return fail(&formatter, "Failed to delete objects", &e);
                }
            }
            debug!(bucket = %args.bucket, deleted, "Deleted batch");
            spinner.set_message(&format!("Emptying bucket '{}': {deleted} deleted", args.bucket));
        }

        if done {
            break;
        }
    }
    spinner.finish_and_clear();

    if formatter.is_json() {
        formatter.json(&EmptyOutput {
            bucket: args.bucket,
            deleted,
            failed,
        });
    } else if failed == 0 {
        formatter.success(&format!(
            "Deleted {deleted} objects from '{}'.",
            args.bucket
        ));
    } else {
        formatter.error(&format!(
            "Deleted {deleted} objects from '{}', {failed} could not be deleted.",
            args.bucket
        ));
    }

    if failed == 0 {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    }
}
