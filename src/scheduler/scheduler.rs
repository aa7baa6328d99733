use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::ext::BestEffortPathExt;
use crate::report::SyncReporter;
use crate::sync::{Mirror, PassError, PassSummary};

/// Calls [`Mirror::run_once`] on a fixed interval.
///
/// The interval is measured from the end of one pass to the start of the
/// next, so passes never overlap.
pub struct Scheduler<R> {
    mirror: Mirror<R>,
    source: PathBuf,
    replica: PathBuf,
    interval: Duration,
}

impl<R: SyncReporter> Scheduler<R> {
    pub fn new(mirror: Mirror<R>, source: PathBuf, replica: PathBuf, interval: Duration) -> Self {
        Self {
            mirror,
            source,
            replica,
            interval,
        }
    }

    pub fn mirror(&self) -> &Mirror<R> {
        &self.mirror
    }

    pub async fn run_once(&self) -> Result<PassSummary, PassError> {
        debug!(
            "Starting pass {} -> {}",
            self.source.best_effort_path_display(),
            self.replica.best_effort_path_display()
        );
        self.mirror.run_once(&self.source, &self.replica).await
    }

    /// Runs passes until Ctrl-C. A pass in progress is allowed to finish.
    pub async fn run(&self) {
        self.run_until(ctrl_c()).await
    }

    /// Runs passes until `shutdown` completes, checking it between passes.
    ///
    /// `shutdown` is polled once before the first pass so a signal listener
    /// is installed before any file is touched.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        let shutdown = shutdown.fuse();
        futures::pin_mut!(shutdown);
        let stop_requested = futures::poll!(shutdown.as_mut()).is_ready();

        loop {
            match self.run_once().await {
                Ok(summary) => debug!("Pass finished: {}", summary),
                Err(PassError::PassInProgress) => warn!("Previous pass still running, skipping this tick"),
                // Already reported; the next tick retries.
                Err(e) => debug!("Pass aborted: {}", e),
            }

            if stop_requested {
                info!("Shutdown requested, stopping");
                break;
            }
            futures::select! {
                () = shutdown => {
                    info!("Shutdown requested, stopping");
                    break;
                }
                () = compio::time::sleep(self.interval).fuse() => {}
            }
        }
    }
}

async fn ctrl_c() {
    if let Err(e) = compio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C, running until killed: {}", e);
        futures::future::pending::<()>().await;
    }
}
