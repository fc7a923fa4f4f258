//! rm command - Remove an object
//!
//! Deletes a single object from a bucket.

use bsync_core::ObjectStore as _;
use clap::Args;
use serde::Serialize;

use super::{Context, fail};
use crate::exit_code::ExitCode;

/// Remove an object
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Bucket holding the object
    pub bucket: String,

    /// Object key
    pub key: String,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    bucket: String,
    key: String,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();

    let client = match ctx.connect().await {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    if let Err(e) = client.delete_object(&args.bucket, &args.key).await {
        return fail(&formatter, "Failed to remove object", &e);
    }

    if formatter.is_json() {
        formatter.json(&RmOutput {
            status: "success",
            bucket: args.bucket,
            key: args.key,
        });
    } else {
        formatter.success(&format!("Removed '{}/{}'.", args.bucket, args.key));
    }
    ExitCode::Success
}
