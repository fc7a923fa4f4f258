//! put command - Upload a single file
//!
//! Reads a local file and stores it under a key, replacing any existing object.

use std::path::{Path, PathBuf};

use bsync_core::{Error, ObjectStore as _};
use clap::Args;

use super::{Context, fail};
use crate::exit_code::ExitCode;

/// Upload a single file
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file to upload
    pub file: PathBuf,

    /// Destination bucket
    pub bucket: String,

    /// Object key (defaults to the file name)
    #[arg(long)]
    pub key: Option<String>,
}

/// Key used when none is given: the file's own name
fn default_key(file: &Path) -> Result<String, Error> {
    file.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::InvalidPath(format!(
                "{} has no usable file name, pass --key",
                file.display()
            ))
        })
}

/// Execute the put command
pub async fn execute(args: PutArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();

    let key = match args.key.map_or_else(|| default_key(&args.file), Ok) {
        Ok(key) if !key.is_empty() => key,
        Ok(_) => {
            formatter.error("Object key cannot be empty");
            return ExitCode::UsageError;
        }
        Err(e) => return fail(&formatter, "Invalid arguments", &e),
    };

    let data = match tokio::fs::read(&args.file).await {
        Ok(data) => data,
        Err(e) => {
            return fail(
                &formatter,
                &format!("Cannot read {}", args.file.display()),
                &Error::from(e),
            );
        }
    };

    let client = match ctx.connect().await {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    match client.put_object(&args.bucket, &key, data).await {
        Ok(info) => {
            if formatter.is_json() {
                formatter.json(&info);
            } else {
                formatter.success(&format!(
                    "Uploaded {} to '{}/{key}' ({}).",
                    args.file.display(),
                    args.bucket,
                    info.size_human.unwrap_or_default()
                ));
            }
            ExitCode::Success
        }
        Err(e) => fail(&formatter, "Failed to upload", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_key_is_file_name() {
        assert_eq!(default_key(Path::new("/tmp/site/index.html")).unwrap(), "index.html");
        assert_eq!(default_key(Path::new("notes.txt")).unwrap(), "notes.txt");
    }

    #[test]
    fn test_default_key_needs_a_name() {
        assert!(matches!(default_key(Path::new("/")), Err(Error::InvalidPath(_))));
        assert!(default_key(Path::new("..")).is_err());
    }
}
