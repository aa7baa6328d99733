use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::application::RuntimeConfig;
use crate::ext::BestEffortPathExt;
use crate::report::{AuditLog, AuditLogError};
use crate::scheduler::Scheduler;
use crate::sync::{Mirror, PassError};

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        debug!("Runtime config: {:?}", app_config);

        let audit_log = AuditLog::create(&app_config.log_file).context(AuditLogSnafu)?;
        let scheduler = Scheduler::new(
            Mirror::new(audit_log),
            app_config.source,
            app_config.replica,
            app_config.interval,
        );
        info!(
            "Writing audit trail to {}",
            scheduler.mirror().reporter().path().best_effort_path_display()
        );

        if app_config.once {
            let summary = scheduler.run_once().await.context(PassSnafu)?;
            info!("Single pass made {} changes", summary.total_actions());
            ensure!(
                !summary.has_failures(),
                ItemFailuresSnafu {
                    failures: summary.failures
                }
            );
            return Ok(());
        }

        info!(
            "Synchronizing every {} minute(s), press Ctrl-C to stop",
            app_config.interval.as_secs() / 60
        );
        scheduler.run().await;
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered while opening the audit log"))]
    AuditLogError { source: AuditLogError },
    #[snafu(display("Critical failure encountered during the synchronization pass"))]
    PassError { source: PassError },
    #[snafu(display("Synchronization pass finished with {} failed item(s)", failures))]
    ItemFailures { failures: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(root: &Path, source: &str) -> RuntimeConfig {
        RuntimeConfig {
            source: root.join(source),
            replica: root.join("replica"),
            interval: Duration::from_secs(60),
            log_file: root.join("sync.log"),
            once: true,
        }
    }

    #[compio::test]
    async fn test_single_pass_mirrors_and_logs() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("source/sub")).unwrap();
        std::fs::write(temp_dir.path().join("source/sub/file.txt"), "content").unwrap();

        Application::run(config(temp_dir.path(), "source"))
            .await
            .expect("Application failed");

        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("replica/sub/file.txt")).unwrap(),
            "content"
        );
        let log = std::fs::read_to_string(temp_dir.path().join("sync.log")).unwrap();
        assert!(log.contains("Synchronization started at"));
        assert!(log.contains("sub was created"));
        assert!(log.contains("sub/file.txt was copied"));
        assert!(log.contains("no file was rewritten since last check"));
    }

    #[compio::test]
    async fn test_single_pass_with_missing_source_fails() {
        let temp_dir = TempDir::new().unwrap();

        let result = Application::run(config(temp_dir.path(), "missing")).await;

        assert!(matches!(result, Err(ApplicationError::PassError { .. })));
        let log = std::fs::read_to_string(temp_dir.path().join("sync.log")).unwrap();
        assert!(log.contains("ERROR: synchronization aborted"));
    }
}
