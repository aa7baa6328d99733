use std::sync::Mutex;

use crate::report::{SyncEvent, SyncReporter};

/// Keeps every recorded event in memory for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingReporter {
    pub fn take(&self) -> Vec<SyncEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    pub fn lines(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl SyncReporter for RecordingReporter {
    fn record(&self, event: SyncEvent) {
        self.events.lock().unwrap().push(event);
    }
}
