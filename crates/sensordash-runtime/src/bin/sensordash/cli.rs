//! CLI definitions for sensordash.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "sensordash",
    version,
    about = "Live sensor telemetry dashboard",
    after_help = "Examples:\n  sensordash                                   # watch with ./dashboard.toml\n  sensordash --url http://10.0.0.5:8000 watch\n  sensordash send home/entrada/door open"
)]
pub struct Cli {
    /// Dashboard configuration file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
    /// Bridge origin, overrides `server.url` (http://host:port).
    #[arg(long, global = true)]
    pub url: Option<String>,
    /// Log at debug level.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow the live stream and log card changes.
    Watch {
        /// Stop after this many seconds.
        #[arg(long = "for", value_name = "SECONDS")]
        duration: Option<u64>,
    },
    /// Publish one envelope on the live stream and exit.
    Send {
        /// Topic, e.g. home/entrada/door.
        topic: String,
        /// Payload text.
        payload: String,
        /// Seconds to wait for the connection.
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
}
