use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;

const SECONDS_PER_MINUTE: u64 = 60;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub source: PathBuf,
    pub replica: PathBuf,
    pub interval: Duration,
    pub log_file: PathBuf,
    pub once: bool,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            source: cli.source,
            replica: cli.replica,
            interval: Duration::from_secs(cli.interval.saturating_mul(SECONDS_PER_MINUTE)),
            log_file: cli.log_file,
            once: cli.once,
        }
    }
}
