use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Keeps a replica directory identical to a source directory.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Directory to mirror from; never modified
    pub source: PathBuf,

    /// Directory kept identical to the source; created if missing
    pub replica: PathBuf,

    /// Minutes between synchronization passes
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// File receiving the audit trail; truncated at startup
    pub log_file: PathBuf,

    /// Verbosity of diagnostic output on stderr
    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,

    /// Run a single pass and exit
    #[clap(long)]
    pub once: bool,
}
