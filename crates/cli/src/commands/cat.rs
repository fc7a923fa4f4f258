//! cat command - Display object contents
//!
//! Outputs the entire content of an object to stdout.

use std::io::{self, Write};

use bsync_core::ObjectStore as _;
use clap::Args;

use super::{Context, fail};
use crate::exit_code::ExitCode;

/// Display object contents
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Bucket holding the object
    pub bucket: String,

    /// Object key
    pub key: String,
}

/// Execute the cat command
pub async fn execute(args: CatArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();

    let client = match ctx.connect().await {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    let data = match client.get_object(&args.bucket, &args.key).await {
        Ok(data) => data,
        Err(e) => return fail(&formatter, "Failed to read object", &e),
    };

    // Raw bytes go straight to stdout so binary content survives
    let mut stdout = io::stdout().lock();
    if let Err(e) = stdout.write_all(&data).and_then(|()| stdout.flush()) {
        formatter.error(&format!("Failed to write to stdout: {e}"));
        return ExitCode::GeneralError;
    }

    ExitCode::Success
}
