pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "stockwatch")]
#[command(about = "Watches Zara and Bershka product pages for sizes coming back in stock", long_about = None)]
pub struct Cli {
    /// Database file (default: data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Number of parallel browser sessions (overrides the config file)
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subscribe to a product page
    Add {
        /// Product page URL
        url: String,

        /// Owner of the subscription
        #[arg(short, long)]
        user: i64,

        /// Chat that receives notifications (default: the user's private chat)
        #[arg(short, long)]
        chat: Option<i64>,

        /// Only notify about these sizes, e.g. "M,L,XL"
        #[arg(short, long)]
        sizes: Option<String>,
    },
    /// List subscriptions
    List {
        /// Only subscriptions of this user
        #[arg(short, long)]
        user: Option<i64>,

        /// Print the last known status block too
        #[arg(long)]
        status: bool,
    },
    /// Delete subscriptions
    Remove(RemoveArgs),
    /// Stop checking a subscription without deleting it
    Pause {
        id: i64,
    },
    /// Resume a paused subscription
    Resume {
        id: i64,
    },
    /// Change the sizes a subscription notifies about
    Sizes {
        id: i64,

        /// Comma-separated sizes; leave out to watch every size
        sizes: Option<String>,
    },
    /// Check pages once and print their status
    Check {
        /// Product page URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Run a single monitoring pass over all active subscriptions
    Pass {
        /// Log notifications instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Background monitoring loop
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct RemoveArgs {
    /// Subscription ID
    pub id: Option<i64>,

    /// Delete every subscription of this user
    #[arg(long)]
    pub all_for: Option<i64>,
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the monitoring loop in the foreground
    Start {
        /// Pass interval (e.g., "60s", "5m", "1h"); defaults to the config file
        #[arg(short, long)]
        interval: Option<String>,

        /// Skip the pass on start
        #[arg(long)]
        no_initial_pass: bool,

        /// Log notifications instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}
