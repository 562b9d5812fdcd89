use std::sync::atomic::{AtomicU64, Ordering};

//------------ DispatchMetrics -----------------------------------------------

/// Counters for requests passing through the dispatcher.
///
/// One set of counters lives for the whole server and is handed to every
/// generation, so values survive reloads.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    requests: AtomicU64,
    handled: AtomicU64,
    no_chain: AtomicU64,
    chain_exhausted: AtomicU64,
    transfers_started: AtomicU64,
    transfers_refused: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn inc_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn inc_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn inc_no_chain(&self) {
        self.no_chain.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn inc_chain_exhausted(&self) {
        self.chain_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn inc_transfers_started(&self) {
        self.transfers_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn inc_transfers_refused(&self) {
        self.transfers_refused.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current values of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            no_chain: self.no_chain.load(Ordering::Relaxed),
            chain_exhausted: self.chain_exhausted.load(Ordering::Relaxed),
            transfers_started: self.transfers_started.load(Ordering::Relaxed),
            transfers_refused: self.transfers_refused.load(Ordering::Relaxed),
        }
    }
}

//------------ MetricsSnapshot -----------------------------------------------

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub handled: u64,
    pub no_chain: u64,
    pub chain_exhausted: u64,
    pub transfers_started: u64,
    pub transfers_refused: u64,
}
