use prometheus_client::{metrics::counter::Counter, registry::Registry};
use std::sync::atomic::AtomicU64;

/// Engine counters. Clones share the same underlying values.
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    pub started: Counter<u64, AtomicU64>,
    pub resolved: Counter<u64, AtomicU64>,
    pub expired: Counter<u64, AtomicU64>,
    pub cancelled: Counter<u64, AtomicU64>,
    pub conflicts: Counter<u64, AtomicU64>,
    pub paid_out: Counter<u64, AtomicU64>,
    pub refunded: Counter<u64, AtomicU64>,
    pub compensations: Counter<u64, AtomicU64>,
}

impl Metrics {
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "sessions_started",
            "Sessions created (single-shot games included)",
            self.started.clone(),
        );
        registry.register(
            "sessions_resolved",
            "Sessions that reached a terminal state",
            self.resolved.clone(),
        );
        registry.register(
            "sessions_expired",
            "Sessions force-resolved at their deadline",
            self.expired.clone(),
        );
        registry.register(
            "sessions_cancelled",
            "Sessions cancelled with a refund",
            self.cancelled.clone(),
        );
        registry.register(
            "session_conflicts",
            "Start requests refused because a session was active",
            self.conflicts.clone(),
        );
        registry.register(
            "coins_paid_out",
            "Net winnings credited",
            self.paid_out.clone(),
        );
        registry.register("coins_refunded", "Stakes refunded", self.refunded.clone());
        registry.register(
            "payout_compensations",
            "Failed payouts compensated by a refund",
            self.compensations.clone(),
        );
    }
}
