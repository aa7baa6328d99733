use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use colored::Colorize;
use snafu::{ResultExt, Snafu};
use supports_color::Stream;
use tracing::warn;

use crate::ext::BestEffortPathExt;
use crate::report::{SyncEvent, SyncReporter};

/// Writes every event as one line to the log file and to stdout.
///
/// The file is flushed after each line so the trail survives a crash in the
/// middle of a pass.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
    console: Option<Console>,
}

#[derive(Debug, Clone, Copy)]
struct Console {
    colored: bool,
}

impl AuditLog {
    /// Creates the log file, truncating whatever was there before.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, AuditLogError> {
        let path = path.into();
        let file = File::create(&path).context(CreateSnafu { path: path.clone() })?;
        let colored = supports_color::on(Stream::Stdout).is_some();

        Ok(Self {
            path,
            file: Mutex::new(file),
            console: Some(Console { colored }),
        })
    }

    /// Stops echoing lines to stdout; only the file receives them.
    #[cfg(test)]
    pub fn without_console(mut self) -> Self {
        self.console = None;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_to_file(&self, line: &str, heading: bool) {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let result = if heading {
            writeln!(file).and_then(|()| writeln!(file, "{line}"))
        } else {
            writeln!(file, "{line}")
        };
        if let Err(e) = result.and_then(|()| file.flush()) {
            warn!(
                "Failed to append to audit log {}: {}",
                self.path.best_effort_path_display(),
                e
            );
        }
    }
}

impl Console {
    fn print(&self, line: &str, heading: bool, error: bool) {
        if heading {
            println!();
        }
        if error && self.colored {
            println!("{}", line.red().bold());
        } else {
            println!("{line}");
        }
    }
}

impl SyncReporter for AuditLog {
    fn record(&self, event: SyncEvent) {
        let line = event.to_string();
        let heading = event.is_heading();

        if let Some(console) = &self.console {
            console.print(&line, heading, event.is_error());
        }
        self.write_to_file(&line, heading);
    }
}

#[derive(Debug, Snafu)]
pub enum AuditLogError {
    #[snafu(display("Failed to create audit log {}", path.best_effort_path_display()))]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::RelativePath;
    use crate::report::Step;
    use tempfile::TempDir;

    #[test]
    fn test_create_truncates_existing_log() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("sync.log");
        std::fs::write(&path, "previous run\n").expect("Failed to write old log");

        let log = AuditLog::create(&path).expect("Failed to create audit log");

        assert_eq!(log.path(), path.as_path());
        assert_eq!(std::fs::read_to_string(&path).expect("Failed to read log"), "");
    }

    #[test]
    fn test_lines_are_appended_in_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("sync.log");
        let log = AuditLog::create(&path)
            .expect("Failed to create audit log")
            .without_console();

        log.record(SyncEvent::StepStarted(Step::CopyFiles));
        log.record(SyncEvent::FileCopied(RelativePath::new("a.txt").unwrap()));
        log.record(SyncEvent::NothingToDo(Step::DeleteFiles));

        let contents = std::fs::read_to_string(&path).expect("Failed to read log");
        assert_eq!(
            contents,
            "\nAdding new files:\na.txt was copied\nno file was removed since last check\n"
        );
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("missing").join("sync.log");

        let result = AuditLog::create(&path);

        assert!(matches!(result, Err(AuditLogError::CreateError { .. })));
    }
}
