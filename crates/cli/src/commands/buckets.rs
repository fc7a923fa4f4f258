//! buckets command - List buckets
//!
//! Prints a table of every bucket the profile can see.

use bsync_core::{ObjectInfo, ObjectStore as _};
use comfy_table::{ContentArrangement, Table, presets};
use serde::Serialize;

use super::{Context, fail};
use crate::exit_code::ExitCode;

#[derive(Debug, Serialize)]
struct BucketsOutput {
    buckets: Vec<ObjectInfo>,
}

/// Execute the buckets command
pub async fn execute(ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();

    let client = match ctx.connect().await {
        Ok(client) => client,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    let buckets = match client.list_buckets().await {
        Ok(buckets) => buckets,
        Err(e) => return fail(&formatter, "Failed to list buckets", &e),
    };

    if formatter.is_json() {
        formatter.json(&BucketsOutput { buckets });
    } else if buckets.is_empty() {
        formatter.println("No buckets found.");
    } else {
        formatter.println(&bucket_table(&buckets).to_string());
    }

    ExitCode::Success
}

fn bucket_table(buckets: &[ObjectInfo]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Bucket", "Created"]);

    for bucket in buckets {
        let created = bucket
            .last_modified
            .map(|t| t.strftime("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        table.add_row(vec![bucket.key.clone(), created]);
    }
    table
}
