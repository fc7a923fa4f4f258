//! mb command - Make bucket
//!
//! Creates a new bucket in the profile's region.

use bsync_core::{Error, ObjectStore as _};
use clap::Args;
use serde::Serialize;

use super::{Context, fail};
use crate::exit_code::ExitCode;

/// Create a bucket
#[derive(Args, Debug)]
pub struct MbArgs {
    /// Bucket name
    pub bucket: String,

    /// Ignore error if bucket already exists
    #[arg(short = 'p', long)]
    pub ignore_existing: bool,
}

#[derive(Debug, Serialize)]
struct MbOutput {
    status: &'static str,
    bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Check the length and character rules S3 applies to bucket names
fn validate_bucket_name(bucket: &str) -> Result<(), String> {
    if bucket.len() < 3 || bucket.len() > 63 {
        return Err("Bucket name must be between 3 and 63 characters".to_string());
    }
    if !bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(
            "Bucket name may only contain lowercase letters, digits, '-' and '.'".to_string(),
        );
    }
    Ok(())
}

/// Execute the mb command
pub async fn execute(args: MbArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();

    if let Err(message) = validate_bucket_name(&args.bucket) {
        formatter.error(&message);
        return ExitCode::UsageError;
    }

    let client = match ctx.connect().await {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    let already_exists = |bucket: String| {
        if formatter.is_json() {
            formatter.json(&MbOutput {
                status: "success",
                message: Some("Bucket already exists".to_string()),
                bucket,
            });
        } else {
            formatter.success(&format!("Bucket '{bucket}' already exists."));
        }
        ExitCode::Success
    };

    if args.ignore_existing {
        match client.bucket_exists(&args.bucket).await {
            Ok(true) => return already_exists(args.bucket),
            Ok(false) => {}
            Err(e) => return fail(&formatter, "Failed to check bucket existence", &e),
        }
    }

    match client.create_bucket(&args.bucket).await {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&MbOutput {
                    status: "success",
                    bucket: args.bucket,
                    message: None,
                });
            } else {
                formatter.success(&format!("Bucket '{}' created successfully.", args.bucket));
            }
            ExitCode::Success
        }
        Err(Error::Conflict(_)) if args.ignore_existing => already_exists(args.bucket),
        Err(e) => fail(&formatter, &format!("Cannot create bucket '{}'", args.bucket), &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_bucket_names() {
        assert!(validate_bucket_name("photos").is_ok());
        assert!(validate_bucket_name("my-site.example").is_ok());
    }

    #[test]
    fn test_invalid_bucket_names() {
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name(&"x".repeat(64)).is_err());
        assert!(validate_bucket_name("Photos").is_err());
        assert!(validate_bucket_name("my_bucket").is_err());
    }
}
