use clap::Parser;
use std::path::PathBuf;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_NUMBER"));

#[derive(Parser, Debug)]
#[command(name = "rundash", version = VERSION, about = "Terminal dashboard for a remote runs service")]
pub struct Cli {
    /// Base URL of the runs service (e.g. https://runs.example.com/api)
    #[arg(long)]
    pub url: String,

    /// Environment variable holding the bearer token
    #[arg(long, default_value = "RUNDASH_TOKEN")]
    pub token_env: String,

    /// Repository to select on startup
    #[arg(long)]
    pub repo: Option<String>,

    /// Runs requested per page
    #[arg(short, long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: u64,

    /// Stop paging after this many runs
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_runs: u64,

    /// Background refresh interval in seconds while nothing is running
    #[arg(short, long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Attempts per foreground load before giving up
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub attempts: u32,

    /// Cache file (default: $XDG_STATE_HOME/rundash/cache.json)
    #[arg(long)]
    pub cache_file: Option<PathBuf>,

    /// Neither read nor write the on-disk cache
    #[arg(long, conflicts_with = "cache_file")]
    pub no_cache: bool,

    /// Enable verbose logging to $XDG_STATE_HOME/rundash/debug.log
    #[arg(short, long)]
    pub verbose: bool,
}
