/// CLI argument parsing

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use dropwatch::core::Overrides;

// Build timestamp injected at compile time
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser)]
#[command(name = "dropwatch")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Poll interval and metrics window ("30s", "1m")
    #[arg(long, global = true, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// Droplets fetched at the same time
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Filesystem shown in the File Storage column
    #[arg(long, global = true)]
    pub mountpoint: Option<String>,

    /// API base URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Append tables instead of clearing the screen
    #[arg(long, global = true)]
    pub no_clear: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Poll and redraw the table until interrupted (default)
    Watch,

    /// Poll once, print the table and exit
    Once,

    /// List droplets
    Hosts,

    /// Show metrics for a single droplet
    Show {
        /// Droplet id (defaults to DROPLET_ID)
        #[arg(long)]
        host: Option<u64>,
    },

    /// Print the resolved configuration
    Config,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            api_url: self.api_url.clone(),
            interval: self.interval,
            concurrency: self.concurrency,
            mountpoint: self.mountpoint.clone(),
            no_clear: self.no_clear,
        }
    }
}
