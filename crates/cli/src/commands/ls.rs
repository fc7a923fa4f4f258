//! ls command - List objects in a bucket
//!
//! Streams the listing page by page, so the first lines appear before the
//! whole bucket has been enumerated.

use std::pin::pin;

use bsync_core::sync::RemoteEntry;
use bsync_core::RemoteLister;
use clap::Args;
use futures::TryStreamExt;
use humansize::{BINARY, format_size};
use serde::Serialize;

use super::{Context, fail};
use crate::exit_code::ExitCode;

/// List objects in a bucket
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Bucket to list
    pub bucket: String,

    /// Only list keys starting with this prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Summarize output (show totals only)
    #[arg(long)]
    pub summarize: bool,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    bucket: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    items: Vec<RemoteEntry>,
    summary: Summary,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    total_objects: usize,
    total_size_bytes: u64,
    total_size_human: String,
}

impl Summary {
    fn add(&mut self, entry: &RemoteEntry) {
        self.total_objects += 1;
        self.total_size_bytes += entry.size;
    }

    fn finish(mut self) -> Self {
        self.total_size_human = format_size(self.total_size_bytes, BINARY);
        self
    }
}

fn format_line(entry: &RemoteEntry) -> String {
    let date = entry
        .last_modified
        .map(|d| d.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| " ".repeat(19));
    format!(
        "[{date}] {:>10} {}",
        format_size(entry.size, BINARY),
        entry.key
    )
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();

    let client = match ctx.connect().await {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    let mut lister = RemoteLister::new(&client);
    if let Some(prefix) = args.prefix.as_deref() {
        lister = lister.with_prefix(prefix);
    }
    let mut entries = pin!(lister.list(&args.bucket));

    let mut summary = Summary::default();
    let mut items = Vec::new();
    loop {
        let entry = match entries.try_next().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => return fail(&formatter, "Failed to list objects", &e),
        };
        summary.add(&entry);
        if formatter.is_json() {
            if !args.summarize {
                items.push(entry);
            }
        } else if !args.summarize {
            formatter.println(&format_line(&entry));
        }
    }
    let summary = summary.finish();

    if formatter.is_json() {
        formatter.json(&LsOutput {
            bucket: args.bucket,
            items,
            summary,
        });
    } else if args.summarize || summary.total_objects == 0 {
        formatter.println(&format!(
            "Total: {} objects, {}",
            summary.total_objects, summary.total_size_human
        ));
    }

    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line() {
        let mut entry = RemoteEntry::new("img/1.png", 2048);
        entry.last_modified = Some("2024-03-01T12:00:00Z".parse().unwrap());
        assert_eq!(
            format_line(&entry),
            "[2024-03-01 12:00:00]      2 KiB img/1.png"
        );
    }

    #[test]
    fn test_summary_totals() {
        let mut summary = Summary::default();
        summary.add(&RemoteEntry::new("a", 1024));
        summary.add(&RemoteEntry::new("b", 1024));
        let summary = summary.finish();
        assert_eq!(summary.total_objects, 2);
        assert_eq!(summary.total_size_bytes, 2048);
        assert_eq!(summary.total_size_human, "2 KiB");
    }
}
