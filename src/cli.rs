//! CLI argument definitions using clap derive macros.

use clap::Parser;
use std::path::PathBuf;

/// Download new episodes from RSS feeds through a torrent client.
///
/// Each invocation checks every configured series once and exits; schedule it with cron or a
/// systemd timer.
#[derive(Parser, Debug)]
#[command(name = "series-dl")]
#[command(author, version, about)]
pub struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Check every series, ignoring airtimes
    #[arg(long)]
    pub skip_time_check: bool,

    /// Ignore each series' starting episode
    #[arg(long)]
    pub skip_start_check: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Default log filter when `RUST_LOG` is unset
    pub fn default_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
