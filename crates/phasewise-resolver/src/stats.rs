//! Counters exposed by [`crate::Resolver::stats`].

use std::sync::atomic::{AtomicU64, Ordering};

use phasewise_core::Phase;

/// Live resolver counters. All updates are relaxed atomics.
#[derive(Debug, Default)]
pub struct ResolveStats {
    invocations: [AtomicU64; Phase::ALL.len()],
    resolve_calls: AtomicU64,
    already_resolved: AtomicU64,
    supertype_rounds: AtomicU64,
    deferred_applications: AtomicU64,
    cancellations: AtomicU64,
}

impl ResolveStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_invocation(&self, phase: Phase) {
        self.invocations[phase.position() as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resolve_call(&self) {
        self.resolve_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_already_resolved(&self) {
        self.already_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_supertype_round(&self) {
        self.supertype_rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferral(&self) {
        self.deferred_applications.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    /// Phase transformer invocations for `phase`.
    pub fn invocations(&self, phase: Phase) -> u64 {
        self.invocations[phase.position() as usize].load(Ordering::Relaxed)
    }

    /// Phase transformer invocations across all phases.
    pub fn total_invocations(&self) -> u64 {
        self.invocations
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .sum()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            invocations: std::array::from_fn(|i| self.invocations[i].load(Ordering::Relaxed)),
            resolve_calls: self.resolve_calls.load(Ordering::Relaxed),
            already_resolved: self.already_resolved.load(Ordering::Relaxed),
            supertype_rounds: self.supertype_rounds.load(Ordering::Relaxed),
            deferred_applications: self.deferred_applications.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`ResolveStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Transformer invocations indexed by phase position.
    pub invocations: [u64; Phase::ALL.len()],
    pub resolve_calls: u64,
    /// Calls answered from the phase markers without taking a lock.
    pub already_resolved: u64,
    pub supertype_rounds: u64,
    /// Supertype results not applied to a foreign unit whose lock was busy.
    pub deferred_applications: u64,
    pub cancellations: u64,
}

impl StatsSnapshot {
    pub fn invocations(&self, phase: Phase) -> u64 {
        self.invocations[phase.position() as usize]
    }

    pub fn total_invocations(&self) -> u64 {
        self.invocations.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_per_phase() {
        let stats = ResolveStats::new();
        stats.record_invocation(Phase::Types);
        stats.record_invocation(Phase::Types);
        stats.record_invocation(Phase::Status);

        assert_eq!(stats.invocations(Phase::Types), 2);
        assert_eq!(stats.invocations(Phase::SuperTypes), 0);
        assert_eq!(stats.total_invocations(), 3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.invocations(Phase::Status), 1);
        assert_eq!(snapshot.total_invocations(), 3);
    }
}
