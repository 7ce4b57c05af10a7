use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-chunk scan counters. Workers bump `checked`, the collector task owns
/// the rest; everything is Relaxed since the values are only reported.
#[derive(Default)]
pub struct Metrics {
    pub checked: AtomicU64,
    pub public_found: AtomicU64,
    pub private_found: AtomicU64,
    pub absent: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn found(&self) -> u64 {
        self.public_found.load(Ordering::Relaxed) + self.private_found.load(Ordering::Relaxed)
    }
}

/// One progress line, printed by the collector every N completions.
pub fn progress_line(m: &Metrics, completed: u64, total: u64, elapsed_secs: f64) -> String {
    let percent = if total > 0 {
        completed as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    let rate = if elapsed_secs > 0.0 {
        completed as f64 / elapsed_secs
    } else {
        0.0
    };
    format!(
        "[*] Progress: {}/{} ({:.1}%) | Rate: {:.1} req/s | Found: {}",
        completed,
        total,
        percent,
        rate,
        m.found()
    )
}
