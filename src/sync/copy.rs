use std::ffi::OsString;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use compio::BufResult;
use compio::fs::{self, File, Metadata};
use compio::io::{AsyncReadAt, AsyncWriteAtExt};
use filetime::FileTime;
use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;

use crate::ext::BestEffortPathExt;
use crate::fingerprint::CHUNK_SIZE;

const STAGING_SUFFIX: &str = ".mirrorsync-tmp";

/// Copies `source` to `destination` together with its permissions and
/// modification time.
///
/// The bytes go to a hidden staging file next to `destination` which is then
/// renamed over it, so readers of `destination` see either the old or the new
/// content, never a partial write. A symlink is recreated as a symlink with
/// the same target, whatever the target is.
pub async fn replicate_file(source: &Path, destination: &Path) -> Result<(), CopyError> {
    let metadata = fs::symlink_metadata(source).await.context(SourceMetadataSnafu {
        path: source.to_path_buf(),
    })?;
    ensure!(
        !metadata.is_dir(),
        SourceIsDirectorySnafu {
            path: source.to_path_buf(),
        }
    );

    let staging = staging_path(destination);
    let result = match stage(source, &staging, &metadata).await {
        Ok(()) => fs::rename(&staging, destination).await.context(RenameSnafu {
            from: staging.clone(),
            to: destination.to_path_buf(),
        }),
        Err(e) => Err(e),
    };

    if result.is_err() {
        // Best effort; the next pass removes a leftover staging file anyway.
        let _ = fs::remove_file(&staging).await;
    }
    result
}

/// The target of `path` if it is a symlink. A missing path is not a link.
pub async fn link_target(path: &Path) -> io::Result<Option<PathBuf>> {
    match fs::symlink_metadata(path).await {
        Ok(metadata) if metadata.is_symlink() => std::fs::read_link(path).map(Some),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

async fn stage(source: &Path, staging: &Path, metadata: &Metadata) -> Result<(), CopyError> {
    if metadata.is_symlink() {
        let target = std::fs::read_link(source).context(ReadLinkSnafu {
            path: source.to_path_buf(),
        })?;
        debug!(
            "Staging link to {} at {}",
            target.best_effort_path_display(),
            staging.display()
        );
        return create_symlink(&target, staging).context(CreateLinkSnafu {
            path: staging.to_path_buf(),
        });
    }

    let length = stream_contents(source, staging).await?;
    debug!("Staged {} bytes at {}", length, staging.display());

    fs::set_permissions(staging, metadata.permissions())
        .await
        .context(PermissionsSnafu {
            path: staging.to_path_buf(),
        })?;

    let modified = metadata.modified().context(SourceMetadataSnafu {
        path: source.to_path_buf(),
    })?;
    filetime::set_file_mtime(staging, FileTime::from_system_time(modified)).context(
        ModifiedTimeSnafu {
            path: staging.to_path_buf(),
        },
    )
}

/// Copies the content chunk by chunk through one reused buffer and returns
/// the number of bytes written.
async fn stream_contents(source: &Path, staging: &Path) -> Result<u64, CopyError> {
    let reader = File::open(source).await.context(ReadSourceSnafu {
        path: source.to_path_buf(),
    })?;
    let mut writer = File::create(staging).await.context(WriteStagingSnafu {
        path: staging.to_path_buf(),
    })?;
    let mut buffer = Vec::with_capacity(CHUNK_SIZE);
    let mut position = 0u64;

    loop {
        let BufResult(read, chunk) = reader.read_at(buffer, position).await;
        let read = read.context(ReadSourceSnafu {
            path: source.to_path_buf(),
        })?;
        if read == 0 {
            return Ok(position);
        }
        let BufResult(written, chunk) = writer.write_all_at(chunk, position).await;
        written.context(WriteStagingSnafu {
            path: staging.to_path_buf(),
        })?;
        position += read as u64;
        buffer = chunk;
        buffer.clear();
    }
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// `dir/name` becomes `dir/.name.mirrorsync-tmp`, with the suffix repeated
/// until the name is free.
fn staging_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(destination.file_name().unwrap_or_default());
    loop {
        name.push(STAGING_SUFFIX);
        let candidate = destination.with_file_name(&name);
        if !candidate.is_symlink() && !candidate.exists() {
            return candidate;
        }
    }
}

#[derive(Debug, Snafu)]
pub enum CopyError {
    #[snafu(display("Failed to read metadata of {}", path.best_effort_path_display()))]
    SourceMetadataError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Cannot copy {}: it is a directory", path.best_effort_path_display()))]
    SourceIsDirectory { path: PathBuf },
    #[snafu(display("Failed to read link {}", path.best_effort_path_display()))]
    ReadLinkError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to create link {}", path.best_effort_path_display()))]
    CreateLinkError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to read {}", path.best_effort_path_display()))]
    ReadSourceError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to write staging file {}", path.best_effort_path_display()))]
    WriteStagingError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to set permissions on {}", path.best_effort_path_display()))]
    PermissionsError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to set modification time on {}", path.best_effort_path_display()))]
    ModifiedTimeError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "Failed to move {} into place at {}",
        from.best_effort_path_display(),
        to.best_effort_path_display()
    ))]
    RenameError {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}
