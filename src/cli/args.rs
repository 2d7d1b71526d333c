//! CLI argument definitions (clap).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// callbrief - account briefs from recorded customer calls
#[derive(Parser, Debug)]
#[command(name = "callbrief")]
#[command(about = "Summarize an account's recorded calls into a living account brief")]
#[command(long_about = r#"
callbrief finds an account's recent calls, summarizes each one into the
account document exactly once, and rewrites the brief at the top of that
document from the full call history.

EXAMPLES:
  # Refresh the brief for an account
  callbrief run --account "Foo Inc"

  # Process at most 10 calls, 4 at a time, and print a JSON report
  callbrief run --account "Foo Inc" --max-items 10 --concurrency 4 --json

  # Show the effective configuration and where each value came from
  callbrief config

CONFIGURATION:
  Precedence: CLI flags > environment > config file > defaults
  The config file is discovered by searching upward from the current
  directory for .callbrief/config.toml; --config overrides discovery.

EXIT CODES:
  0 success, 1 internal error, 2 configuration error, 3 no such account,
  4 ambiguous account, 5 nothing summarized, 6 finalize failed,
  130 cancelled
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Timeout for each external call in seconds (default: 300, min: 5)
    #[arg(long, global = true)]
    pub call_timeout: Option<u64>,

    /// Directory holding the account folders
    #[arg(long, global = true)]
    pub store_root: Option<PathBuf>,

    /// Language model provider
    #[arg(long, global = true)]
    pub llm_provider: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refresh the brief for one account
    Run {
        /// Account name as users refer to it (e.g. "Foo Inc")
        #[arg(long, short)]
        account: String,

        /// Most recent calls to process (default: 30)
        #[arg(long)]
        max_items: Option<usize>,

        /// Calls processed at the same time (default: 8)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Short name used in error context.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Config { .. } => "config",
        }
    }
}
