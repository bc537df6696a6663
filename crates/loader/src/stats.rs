use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared between the controller and its workers.
#[derive(Debug, Default)]
pub(crate) struct PipelineStats {
    submitted: AtomicU64,
    fast_path_hits: AtomicU64,
    decoded: AtomicU64,
    decode_failures: AtomicU64,
    uploaded: AtomicU64,
    upload_failures: AtomicU64,
    registered: AtomicU64,
    register_failures: AtomicU64,
    completed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub fast_path_hits: u64,
    pub decoded: u64,
    pub decode_failures: u64,
    pub uploaded: u64,
    pub upload_failures: u64,
    pub registered: u64,
    pub register_failures: u64,
    pub completed: u64,
}

impl StatsSnapshot {
    pub fn failures(&self) -> u64 {
        self.decode_failures + self.upload_failures + self.register_failures
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Counter {
    Submitted,
    FastPathHit,
    Decoded,
    DecodeFailed,
    Uploaded,
    UploadFailed,
    Registered,
    RegisterFailed,
    Completed,
}

impl PipelineStats {
    pub(crate) fn bump(&self, counter: Counter) {
        let cell = match counter {
            Counter::Submitted => &self.submitted,
            Counter::FastPathHit => &self.fast_path_hits,
            Counter::Decoded => &self.decoded,
            Counter::DecodeFailed => &self.decode_failures,
            Counter::Uploaded => &self.uploaded,
            Counter::UploadFailed => &self.upload_failures,
            Counter::Registered => &self.registered,
            Counter::RegisterFailed => &self.register_failures,
            Counter::Completed => &self.completed,
        };
        cell.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            fast_path_hits: self.fast_path_hits.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            uploaded: self.uploaded.load(Ordering::Relaxed),
            upload_failures: self.upload_failures.load(Ordering::Relaxed),
            registered: self.registered.load(Ordering::Relaxed),
            register_failures: self.register_failures.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
        }
    }
}
