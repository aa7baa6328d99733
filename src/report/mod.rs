//! The audit trail of a synchronization pass.
//!
//! The sync engine only knows the [`SyncReporter`] trait; where lines end up
//! is up to the implementation handed to it.

mod audit_log;
mod event;
#[cfg(test)]
mod recording;

pub use audit_log::{AuditLog, AuditLogError};
pub use event::{Step, SyncEvent};
#[cfg(test)]
pub use recording::RecordingReporter;

/// Receives every event of a pass, exactly once and in the order produced.
pub trait SyncReporter {
    fn record(&self, event: SyncEvent);
}

impl<R: SyncReporter + ?Sized> SyncReporter for &R {
    fn record(&self, event: SyncEvent) {
        (**self).record(event)
    }
}
