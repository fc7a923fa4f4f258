//! CLI command definitions and execution
//!
//! This module contains all CLI commands and their implementations.
//! Every command receives the loaded [`Context`] and returns an [`ExitCode`].

use clap::{Parser, Subcommand};

use bsync_core::{Config, ConfigManager, Error};
use bsync_s3::S3Client;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod buckets;
mod cat;
mod completions;
mod empty;
mod get;
mod ls;
mod mb;
mod put;
mod rb;
mod rm;
mod sync;

/// bsync - mirror local directories to and from S3 buckets
///
/// Pushes a local tree into a bucket or pulls a bucket into a local tree,
/// and offers the single-object operations needed around a sync.
#[derive(Parser, Debug)]
#[command(name = "bsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Profile from the configuration file to connect with
    #[arg(long, global = true, env = "BSYNC_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a local directory tree into a bucket
    Push(sync::PushArgs),

    /// Download a whole bucket into a local directory
    Pull(sync::PullArgs),

    /// List buckets
    Buckets,

    /// List objects in a bucket
    Ls(ls::LsArgs),

    /// Display object contents
    Cat(cat::CatArgs),

    /// Upload a single file
    Put(put::PutArgs),

    /// Download a single object
    Get(get::GetArgs),

    /// Remove an object
    Rm(rm::RmArgs),

    /// Create a bucket
    Mb(mb::MbArgs),

    /// Remove an empty bucket
    Rb(rb::RbArgs),

    /// Delete every object in a bucket
    Empty(empty::EmptyArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// State shared by every command that talks to a bucket
pub struct Context {
    pub config: Config,
    pub profile: Option<String>,
    pub output: OutputConfig,
}

impl Context {
    pub fn formatter(&self) -> Formatter {
        Formatter::new(self.output.clone())
    }

    /// Build a client for the selected profile
    pub async fn connect(&self) -> bsync_core::Result<S3Client> {
        let profile = self.config.profile(self.profile.as_deref())?;
        S3Client::new(profile).await
    }
}

/// Report `err` and pick the matching exit code
pub(crate) fn fail(formatter: &Formatter, context: &str, err: &Error) -> ExitCode {
    formatter.error(&format!("{context}: {err}"));
    ExitCode::from(err)
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let flags = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    if let Commands::Completions(args) = cli.command {
        return completions::execute(args);
    }

    let config = match ConfigManager::new().and_then(|manager| manager.load()) {
        Ok(config) => config,
        Err(e) => return fail(&Formatter::new(flags), "Failed to load configuration", &e),
    };

    let output = flags.with_defaults(&config.defaults);
    if output.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let ctx = Context {
        config,
        profile: cli.profile,
        output,
    };

    match cli.command {
        Commands::Push(args) => sync::push(args, &ctx).await,
        Commands::Pull(args) => sync::pull(args, &ctx).await,
        Commands::Buckets => buckets::execute(&ctx).await,
        Commands::Ls(args) => ls::execute(args, &ctx).await,
        Commands::Cat(args) => cat::execute(args, &ctx).await,
        Commands::Put(args) => put::execute(args, &ctx).await,
        Commands::Get(args) => get::execute(args, &ctx).await,
        Commands::Rm(args) => rm::execute(args, &ctx).await,
        Commands::Mb(args) => mb::execute(args, &ctx).await,
        Commands::Rb(args) => rb::execute(args, &ctx).await,
        Commands::Empty(args) => empty::execute(args, &ctx).await,
        Commands::Completions(args) => completions::execute(args),
    }
}
