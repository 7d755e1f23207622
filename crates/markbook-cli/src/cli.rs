use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "markbook", version, about = "Assignment store, index, and marking service")]
pub struct Cli {
    /// Data root directory (assignments tree, index snapshot, whitelist).
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the data tree, a default whitelist, and a sample assignment.
    Init,
    /// Force a full rescan of the assignments tree and rewrite the snapshot.
    Rebuild,
    /// List all indexed assignments.
    List,
    /// Look one assignment up by subject and name.
    Lookup(LookupArgs),
    /// Show recent request log entries.
    Logs(LogsArgs),
    /// Serve the REST API.
    Web(WebArgs),
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    pub subject: String,
    pub name: String,
}

#[derive(Debug, Args)]
pub struct LogsArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct WebArgs {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, default_value_t = 3000)]
    pub port: u16,
}
