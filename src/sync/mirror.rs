use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use chrono::Local;
use compio::fs;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, warn};

use crate::ext::BestEffortPathExt;
use crate::filesystem::{ScanError, TreeSnapshot};
use crate::report::{SyncEvent, SyncReporter};
use crate::sync::{Applier, ChangeSet, PassSummary};

/// Runs synchronization passes from a source tree into a replica tree.
///
/// Holds no state between passes besides a flag that keeps two passes from
/// touching the replica at the same time.
pub struct Mirror<R> {
    reporter: R,
    running: AtomicBool,
}

impl<R: SyncReporter> Mirror<R> {
    pub fn new(reporter: R) -> Self {
        Self {
            reporter,
            running: AtomicBool::new(false),
        }
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Performs one scan, diff and apply cycle.
    ///
    /// Refuses to start while another pass is running. Failures that prevent
    /// the pass from starting (missing source, unreadable trees) are reported
    /// and returned; failures of single items are only reported and counted
    /// in the summary.
    pub async fn run_once(&self, source_root: &Path, replica_root: &Path) -> Result<PassSummary, PassError> {
        let _guard = PassGuard::acquire(&self.running).context(PassInProgressSnafu)?;

        self.reporter.record(SyncEvent::PassStarted { at: Local::now() });

        match self.run_pass(source_root, replica_root).await {
            Ok(summary) => {
                self.reporter.record(SyncEvent::PassFinished(summary));
                Ok(summary)
            }
            Err(error) => {
                warn!("Synchronization pass aborted: {}", error);
                self.reporter.record(SyncEvent::PassAborted {
                    reason: error_chain(&error),
                });
                Err(error)
            }
        }
    }

    async fn run_pass(&self, source_root: &Path, replica_root: &Path) -> Result<PassSummary, PassError> {
        if !source_root.exists() {
            return Err(PassError::TreeScanError {
                source: ScanError::RootNotFound {
                    root: source_root.to_path_buf(),
                },
            });
        }
        ensure_replica_root(replica_root).await?;

        let (source, replica) = scan_both(source_root, replica_root)?;
        let changes = ChangeSet::diff(&source, &replica);
        if changes.is_structurally_empty() {
            debug!("Source and replica have the same structure");
        }
        debug!(
            "Diff: {} new dirs, {} new files, {} removed dirs, {} removed files, {} common files, {} kind conflicts",
            changes.new_dirs().len(),
            changes.new_files().len(),
            changes.removed_dirs().len(),
            changes.removed_files().len(),
            changes.common_files().len(),
            changes.kind_conflicts().len()
        );

        Ok(Applier::new(source_root, replica_root, &self.reporter)
            .apply(&changes)
            .await)
    }
}

async fn ensure_replica_root(replica_root: &Path) -> Result<(), PassError> {
    if replica_root.exists() {
        return Ok(());
    }
    debug!(
        "Creating replica root {}",
        replica_root.best_effort_path_display()
    );
    fs::create_dir(replica_root).await.context(ReplicaRootSnafu {
        root: replica_root.to_path_buf(),
    })
}

/// Scans both trees at once; they are independent reads.
fn scan_both(source_root: &Path, replica_root: &Path) -> Result<(TreeSnapshot, TreeSnapshot), PassError> {
    thread::scope(|scope| {
        let source_scan = scope.spawn(|| TreeSnapshot::scan(source_root));
        let replica = TreeSnapshot::scan(replica_root);
        let source = source_scan
            .join()
            .map_err(|_| PassError::ScanPanicked)?;

        Ok((
            source.context(TreeScanSnafu)?,
            replica.context(TreeScanSnafu)?,
        ))
    })
}

/// Renders an error and its causes on a single line.
fn error_chain(error: &dyn Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Marks a pass as running for as long as it is alive.
struct PassGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> PassGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[derive(Debug, Snafu)]
pub enum PassError {
    #[snafu(display("A synchronization pass is already running"))]
    PassInProgress,
    #[snafu(display("Failed to create replica root {}", root.best_effort_path_display()))]
    ReplicaRootError {
        root: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to scan directory tree"))]
    TreeScanError { source: ScanError },
    #[snafu(display("Directory scan thread panicked"))]
    ScanPanicked,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::RelativePath;
    use crate::report::{RecordingReporter, Step};
    use crate::sync::ItemError;
    use filetime::FileTime;
    use std::fs as std_fs;
    use tempfile::TempDir;

    struct Trees {
        _temp_dir: TempDir,
        source: PathBuf,
        replica: PathBuf,
    }

    impl Trees {
        fn new() -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp directory");
            let source = temp_dir.path().join("source");
            let replica = temp_dir.path().join("replica");
            std_fs::create_dir(&source).expect("Failed to create source");
            std_fs::create_dir(&replica).expect("Failed to create replica");
            Self {
                _temp_dir: temp_dir,
                source,
                replica,
            }
        }
    }

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std_fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std_fs::write(path, content).expect("Failed to write file");
    }

    fn assert_converged(trees: &Trees) {
        let source = TreeSnapshot::scan(&trees.source).expect("Failed to scan source");
        let replica = TreeSnapshot::scan(&trees.replica).expect("Failed to scan replica");
        assert_eq!(source, replica);
        for file in source.files() {
            assert_eq!(
                std_fs::read(file.under(&trees.source)).unwrap(),
                std_fs::read(file.under(&trees.replica)).unwrap(),
                "Content of {file} differs"
            );
        }
    }

    fn nothing_to_do_steps(events: &[SyncEvent]) -> Vec<Step> {
        events
            .iter()
            .filter_map(|event| match event {
                SyncEvent::NothingToDo(step) => Some(*step),
                _ => None,
            })
            .collect()
    }

    const ALL_STEPS: [Step; 5] = [
        Step::CreateDirectories,
        Step::CopyFiles,
        Step::DeleteFiles,
        Step::DeleteDirectories,
        Step::RewriteFiles,
    ];

    #[compio::test]
    async fn test_pass_converges_replica() {
        let trees = Trees::new();
        write(&trees.source, "docs/readme.txt", b"hello");
        write(&trees.source, "docs/nested/data.bin", &[0, 255, 128, 7]);
        write(&trees.source, "changed.txt", b"new content");
        std_fs::create_dir_all(trees.source.join("empty/inner")).unwrap();
        write(&trees.replica, "changed.txt", b"old content");
        write(&trees.replica, "stale/deep/old.txt", b"stale");
        write(&trees.replica, "obsolete.txt", b"obsolete");
        let mirror = Mirror::new(RecordingReporter::default());

        let summary = mirror
            .run_once(&trees.source, &trees.replica)
            .await
            .expect("Pass failed");

        assert_converged(&trees);
        assert_eq!(summary.directories_created, 4);
        assert_eq!(summary.files_copied, 2);
        assert_eq!(summary.files_deleted, 2);
        assert_eq!(summary.directories_deleted, 2);
        assert_eq!(summary.files_rewritten, 1);
        assert_eq!(summary.failures, 0);
    }

    #[compio::test]
    async fn test_second_pass_is_idle() {
        let trees = Trees::new();
        write(&trees.source, "a/b/c.txt", b"c");
        write(&trees.source, "d.txt", b"d");
        write(&trees.replica, "gone/e.txt", b"e");
        let mirror = Mirror::new(RecordingReporter::default());
        mirror.run_once(&trees.source, &trees.replica).await.expect("First pass failed");
        mirror.reporter().take();

        let summary = mirror
            .run_once(&trees.source, &trees.replica)
            .await
            .expect("Second pass failed");

        let events = mirror.reporter().take();
        assert_eq!(summary.total_actions(), 0);
        assert_eq!(nothing_to_do_steps(&events), ALL_STEPS);
        assert!(matches!(events.first(), Some(SyncEvent::PassStarted { .. })));
        assert!(matches!(events.last(), Some(SyncEvent::PassFinished(_))));
    }

    #[compio::test]
    async fn test_matching_trees_report_every_step() {
        let trees = Trees::new();
        let mirror = Mirror::new(RecordingReporter::default());

        mirror.run_once(&trees.source, &trees.replica).await.expect("Pass failed");

        let lines = mirror.reporter().lines();
        for expected in [
            "no new subdirectory was created since last check",
            "no new file was created since last check",
            "no file was removed since last check",
            "no subdirectory was removed since last check",
            "no file was rewritten since last check",
        ] {
            assert!(lines.iter().any(|line| line == expected), "Missing line: {expected}");
        }
        assert!(!lines.iter().any(|line| line.starts_with("Resolving")));
    }

    #[compio::test]
    async fn test_identical_files_are_not_written() {
        let trees = Trees::new();
        write(&trees.source, "same.txt", b"identical");
        write(&trees.replica, "same.txt", b"identical");
        write(&trees.source, "different.txt", b"source side");
        write(&trees.replica, "different.txt", b"replica side");
        let old_mtime = FileTime::from_unix_time(1_000_000, 0);
        filetime::set_file_mtime(trees.replica.join("same.txt"), old_mtime).unwrap();
        let mirror = Mirror::new(RecordingReporter::default());

        let summary = mirror
            .run_once(&trees.source, &trees.replica)
            .await
            .expect("Pass failed");

        assert_eq!(summary.files_rewritten, 1);
        let metadata = std_fs::metadata(trees.replica.join("same.txt")).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&metadata), old_mtime);
        assert_eq!(std_fs::read(trees.replica.join("different.txt")).unwrap(), b"source side");
        let lines = mirror.reporter().lines();
        assert!(lines.contains(&"different.txt was rewritten".to_string()));
        assert!(!lines.iter().any(|line| line.starts_with("same.txt")));
    }

    #[cfg(unix)]
    #[compio::test]
    async fn test_symlinks_are_mirrored_as_links() {
        let trees = Trees::new();
        write(&trees.source, "data/f.txt", b"f");
        std::os::unix::fs::symlink("data", trees.source.join("alias")).unwrap();
        std::os::unix::fs::symlink("missing-target", trees.source.join("dangling")).unwrap();
        let mirror = Mirror::new(RecordingReporter::default());

        let first = mirror.run_once(&trees.source, &trees.replica).await.expect("Pass failed");

        assert_eq!(first.failures, 0);
        assert_eq!(std_fs::read_link(trees.replica.join("alias")).unwrap(), PathBuf::from("data"));
        assert_eq!(
            std_fs::read_link(trees.replica.join("dangling")).unwrap(),
            PathBuf::from("missing-target")
        );
        assert_eq!(std_fs::read(trees.replica.join("alias/f.txt")).unwrap(), b"f");

        let second = mirror.run_once(&trees.source, &trees.replica).await.expect("Pass failed");
        assert_eq!(second.total_actions(), 0);
        assert_eq!(second.failures, 0);

        std_fs::remove_file(trees.source.join("alias")).unwrap();
        std::os::unix::fs::symlink("data/f.txt", trees.source.join("alias")).unwrap();
        let third = mirror.run_once(&trees.source, &trees.replica).await.expect("Pass failed");
        assert_eq!(third.files_rewritten, 1);
        assert_eq!(
            std_fs::read_link(trees.replica.join("alias")).unwrap(),
            PathBuf::from("data/f.txt")
        );
    }

    #[compio::test]
    async fn test_paths_that_changed_kind_are_replaced() {
        let trees = Trees::new();
        write(&trees.source, "now_dir/inner.txt", b"inner");
        write(&trees.source, "now_file", b"file content");
        write(&trees.replica, "now_dir", b"was a file");
        write(&trees.replica, "now_file/child.txt", b"was in a directory");
        let mirror = Mirror::new(RecordingReporter::default());

        let summary = mirror
            .run_once(&trees.source, &trees.replica)
            .await
            .expect("Pass failed");

        assert_converged(&trees);
        assert_eq!(summary.kind_conflicts, 2);
        assert_eq!(summary.failures, 0);
        let conflicts: Vec<String> = mirror
            .reporter()
            .take()
            .into_iter()
            .filter_map(|event| match event {
                SyncEvent::ItemFailed(error @ ItemError::InconsistentPathKind { .. }) => {
                    Some(error.to_string())
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            conflicts,
            vec![
                "now_dir is a directory in the source but a file in the replica".to_string(),
                "now_file is a file in the source but a directory in the replica".to_string(),
            ]
        );
    }

    #[compio::test]
    async fn test_missing_source_aborts_only_the_pass() {
        let trees = Trees::new();
        let missing = trees.source.join("vanished");
        let replica = trees.replica.join("never-created");
        let mirror = Mirror::new(RecordingReporter::default());

        let result = mirror.run_once(&missing, &replica).await;

        assert!(matches!(
            result,
            Err(PassError::TreeScanError {
                source: ScanError::RootNotFound { .. }
            })
        ));
        assert!(!replica.exists());
        let events = mirror.reporter().take();
        assert!(matches!(events.last(), Some(SyncEvent::PassAborted { .. })));

        let summary = mirror.run_once(&trees.source, &trees.replica).await;
        assert!(summary.is_ok(), "The next pass must still run");
    }

    #[compio::test]
    async fn test_missing_replica_root_is_created() {
        let trees = Trees::new();
        write(&trees.source, "file.txt", b"content");
        let replica = trees.replica.join("fresh");
        let mirror = Mirror::new(RecordingReporter::default());

        mirror.run_once(&trees.source, &replica).await.expect("Pass failed");

        assert_eq!(std_fs::read(replica.join("file.txt")).unwrap(), b"content");
    }

    #[compio::test]
    async fn test_overlapping_pass_is_refused() {
        let trees = Trees::new();
        let mirror = Mirror::new(RecordingReporter::default());
        let guard = PassGuard::acquire(&mirror.running).expect("Flag should be free");

        let result = mirror.run_once(&trees.source, &trees.replica).await;

        assert!(matches!(result, Err(PassError::PassInProgress)));
        assert!(mirror.reporter().take().is_empty());
        drop(guard);
        assert!(mirror.run_once(&trees.source, &trees.replica).await.is_ok());
    }

    #[test]
    fn test_error_chain_is_single_line() {
        let error = PassError::TreeScanError {
            source: ScanError::RootNotFound {
                root: PathBuf::from("/definitely/missing"),
            },
        };

        assert_eq!(
            error_chain(&error),
            "Failed to scan directory tree: Root directory /definitely/missing does not exist"
        );
    }

    #[test]
    fn test_relative_paths_in_events_use_forward_slashes() {
        let path = RelativePath::new(Path::new("a").join("b")).unwrap();
        assert_eq!(SyncEvent::FileCopied(path).to_string(), "a/b was copied");
    }
}
