//! Content fingerprints used to decide whether two files hold the same bytes.

mod file_fingerprint;

pub use file_fingerprint::{CHUNK_SIZE, FileFingerprint, FingerprintError};
