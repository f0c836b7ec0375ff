use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub prices_written: Arc<AtomicU64>,
    pub prices_duplicate: Arc<AtomicU64>,
    pub quote_failures: Arc<AtomicU64>,
    pub quotes_empty: Arc<AtomicU64>,

    pub alerts_evaluated: Arc<AtomicU64>,
    pub alerts_triggered: Arc<AtomicU64>,
    pub alerts_no_price: Arc<AtomicU64>,
    pub alerts_errored: Arc<AtomicU64>,
    // lost the conditional update to a concurrent evaluator
    pub alerts_trigger_raced: Arc<AtomicU64>,

    pub notifications_sent: Arc<AtomicU64>,
    pub notifications_failed: Arc<AtomicU64>,
    pub dispatch_queue_full: Arc<AtomicU64>,
}

impl Counters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
