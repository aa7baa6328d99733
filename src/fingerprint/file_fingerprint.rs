use std::fmt;
use std::hash::Hasher;
use std::path::{Path, PathBuf};

use compio::BufResult;
use compio::fs::File;
use compio::io::AsyncReadAt;
use metrohash::MetroHash128;
use snafu::{ResultExt, Snafu, ensure};

use crate::ext::{AsyncTryFrom, BestEffortPathExt};

/// Bytes fed to the hasher per read.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// 128-bit MetroHash digest of a file's raw bytes.
///
/// Content is never decoded, so binary and non-UTF-8 files compare exactly.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileFingerprint(u128);

impl FileFingerprint {
    #[cfg(test)]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = MetroHash128::default();
        hasher.write(bytes);
        Self::from_hasher(hasher)
    }

    fn from_hasher(hasher: MetroHash128) -> Self {
        let (high, low) = hasher.finish128();
        Self((u128::from(high) << 64) | u128::from(low))
    }
}

impl AsyncTryFrom<&Path> for FileFingerprint {
    type Error = FingerprintError;

    /// Hashes the file in [`CHUNK_SIZE`] pieces through one reused buffer.
    async fn async_try_from(path: &Path) -> Result<Self, Self::Error> {
        ensure!(
            !path.is_dir(),
            DirectorySnafu {
                path: path.to_path_buf(),
            }
        );

        let file = File::open(path).await.context(ReadSnafu {
            path: path.to_path_buf(),
        })?;
        let mut hasher = MetroHash128::default();
        let mut buffer = Vec::with_capacity(CHUNK_SIZE);
        let mut position = 0u64;

        loop {
            let BufResult(read, chunk) = file.read_at(buffer, position).await;
            let read = read.context(ReadSnafu {
                path: path.to_path_buf(),
            })?;
            if read == 0 {
                break;
            }
            hasher.write(&chunk);
            position += read as u64;
            buffer = chunk;
            buffer.clear();
        }

        Ok(Self::from_hasher(hasher))
    }
}

impl fmt::Debug for FileFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileFingerprint({self})")
    }
}

impl fmt::Display for FileFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

#[derive(Debug, Snafu)]
pub enum FingerprintError {
    #[snafu(display("Failed to read {} for fingerprinting", path.best_effort_path_display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("The supplied path {} is a directory", path.best_effort_path_display()))]
    Directory { path: PathBuf },
}
