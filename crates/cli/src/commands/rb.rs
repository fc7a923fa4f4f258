//! rb command - Remove bucket
//!
//! Deletes an empty bucket.

use bsync_core::{Error, ObjectStore as _};
use clap::Args;
use serde::Serialize;

use super::{Context, fail};
use crate::exit_code::ExitCode;

/// Remove an empty bucket
#[derive(Args, Debug)]
pub struct RbArgs {
    /// Bucket name
    pub bucket: String,
}

#[derive(Debug, Serialize)]
struct RbOutput {
    status: &'static str,
    bucket: String,
}

/// Execute the rb command
pub async fn execute(args: RbArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();

    let client = match ctx.connect().await {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    match client.delete_bucket(&args.bucket).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&RbOutput {
                    status: "success",
                    bucket: args.bucket,
                });
            } else {
                formatter.success(&format!("Bucket '{}' removed.", args.bucket));
            }
            ExitCode::Success
        }
        Err(e @ Error::Conflict(_)) => {
            let code = fail(&formatter, &format!("Cannot remove bucket '{}'", args.bucket), &e);
            formatter.warning(&format!(
                "Run 'bsync empty {}' first to delete its objects.",
                args.bucket
            ));
            code
        }
        Err(e) => fail(&formatter, &format!("Cannot remove bucket '{}'", args.bucket), &e),
    }
}
