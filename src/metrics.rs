use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Download counters for the running process
#[derive(Clone)]
pub struct TransferMetrics {
    pub downloads_started: Arc<AtomicUsize>,
    pub downloads_completed: Arc<AtomicUsize>,
    pub downloads_cancelled: Arc<AtomicUsize>,
    pub downloads_failed: Arc<AtomicUsize>,
    pub bytes_received: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl TransferMetrics {
    pub fn new() -> Self {
        Self {
            downloads_started: Arc::new(AtomicUsize::new(0)),
            downloads_completed: Arc::new(AtomicUsize::new(0)),
            downloads_cancelled: Arc::new(AtomicUsize::new(0)),
            downloads_failed: Arc::new(AtomicUsize::new(0)),
            bytes_received: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_started(&self) {
        self.downloads_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_completed(&self) {
        self.downloads_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cancelled(&self) {
        self.downloads_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.downloads_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> TransferSnapshot {
        TransferSnapshot {
            downloads_started: self.downloads_started.load(Ordering::Relaxed),
            downloads_completed: self.downloads_completed.load(Ordering::Relaxed),
            downloads_cancelled: self.downloads_cancelled.load(Ordering::Relaxed),
            downloads_failed: self.downloads_failed.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for TransferMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct TransferSnapshot {
    pub downloads_started: usize,
    pub downloads_completed: usize,
    pub downloads_cancelled: usize,
    pub downloads_failed: usize,
    pub bytes_received: u64,
    pub uptime_seconds: u64,
}
