//! get command - Download a single object
//!
//! Writes one object to a local file. Without a destination the object lands
//! in the current directory under the last segment of its key.

use std::path::{Path, PathBuf};

use bsync_core::{Error, ObjectStore as _};
use clap::Args;
use humansize::{BINARY, format_size};
use serde::Serialize;

use super::{Context, fail};
use crate::exit_code::ExitCode;

/// Download a single object
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Bucket holding the object
    pub bucket: String,

    /// Object key
    pub key: String,

    /// Destination file or directory (defaults to the current directory)
    pub dest: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    status: &'static str,
    bucket: String,
    key: String,
    path: String,
    size_bytes: usize,
}

/// Last non-empty segment of a key, used as a file name
fn key_file_name(key: &str) -> Result<&str, Error> {
    match key.rsplit('/').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => Ok(name),
        _ => Err(Error::InvalidPath(format!(
            "cannot derive a file name from key '{key}', pass a destination"
        ))),
    }
}

/// Resolve where the object should be written
fn destination(key: &str, dest: Option<&Path>, dest_is_dir: bool) -> Result<PathBuf, Error> {
    match dest {
        Some(dest) if dest_is_dir => Ok(dest.join(key_file_name(key)?)),
        Some(dest) => Ok(dest.to_path_buf()),
        None => Ok(PathBuf::from(key_file_name(key)?)),
    }
}

/// Execute the get command
pub async fn execute(args: GetArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();

    let dest_is_dir = match &args.dest {
        Some(dest) => tokio::fs::metadata(dest)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false),
        None => false,
    };
    let path = match destination(&args.key, args.dest.as_deref(), dest_is_dir) {
        Ok(path) => path,
        Err(e) => return fail(&formatter, "Invalid destination", &e),
    };

    let client = match ctx.connect().await {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    let data = match client.get_object(&args.bucket, &args.key).await {
        Ok(data) => data,
        Err(e) => return fail(&formatter, "Failed to download", &e),
    };
    let size = data.len();

    if let Err(e) = tokio::fs::write(&path, data).await {
        return fail(
            &formatter,
            &format!("Cannot write {}", path.display()),
            &Error::from(e),
        );
    }

    if formatter.is_json() {
        formatter.json(&GetOutput {
            status: "success",
            bucket: args.bucket,
            key: args.key,
            path: path.display().to_string(),
            size_bytes: size,
        });
    } else {
        formatter.success(&format!(
            "Downloaded '{}/{}' to {} ({}).",
            args.bucket,
            args.key,
            path.display(),
            format_size(size, BINARY)
        ));
    }
    ExitCode::Success
}
