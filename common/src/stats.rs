//! Counters for conditions the formatter swallows.
//!
//! Logging never reports failure to its caller, so everything that would
//! otherwise vanish (dropped lines, truncations, misuse) is counted here.

use core::sync::atomic::{AtomicU32, Ordering};

/// Live counters, updated with relaxed atomics.
pub struct FormatterStats {
    lines: AtomicU32,
    ring_overruns: AtomicU32,
    busy_timeouts: AtomicU32,
    truncations: AtomicU32,
    unbalanced_scopes: AtomicU32,
    sink_contention: AtomicU32,
}

/// Point-in-time copy of [`FormatterStats`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsSnapshot {
    /// Lines handed to at least one sink.
    pub lines: u32,
    /// Calls dropped because their ring slot was still in flight.
    pub ring_overruns: u32,
    /// Calls dropped after exhausting the busy-flag spin budget.
    pub busy_timeouts: u32,
    /// Messages that did not fit their scratch buffer.
    pub truncations: u32,
    /// Scope exits that would have made the depth negative.
    pub unbalanced_scopes: u32,
    /// Re-entrant calls that found the sinks already in use.
    pub sink_contention: u32,
}

impl StatsSnapshot {
    /// Lines lost to scratch or sink contention.
    pub const fn dropped(&self) -> u32 {
        self.ring_overruns
            .saturating_add(self.busy_timeouts)
            .saturating_add(self.sink_contention)
    }
}

impl FormatterStats {
    pub const fn new() -> Self {
        Self {
            lines: AtomicU32::new(0),
            ring_overruns: AtomicU32::new(0),
            busy_timeouts: AtomicU32::new(0),
            truncations: AtomicU32::new(0),
            unbalanced_scopes: AtomicU32::new(0),
            sink_contention: AtomicU32::new(0),
        }
    }

    #[inline]
    pub(crate) fn line(&self) { self.lines.fetch_add(1, Ordering::Relaxed); }

    #[inline]
    pub(crate) fn ring_overrun(&self) { self.ring_overruns.fetch_add(1, Ordering::Relaxed); }

    #[inline]
    pub(crate) fn busy_timeout(&self) { self.busy_timeouts.fetch_add(1, Ordering::Relaxed); }

    #[inline]
    pub(crate) fn truncation(&self) { self.truncations.fetch_add(1, Ordering::Relaxed); }

    #[inline]
    pub(crate) fn unbalanced_scope(&self) { self.unbalanced_scopes.fetch_add(1, Ordering::Relaxed); }

    #[inline]
    pub(crate) fn sink_contended(&self) { self.sink_contention.fetch_add(1, Ordering::Relaxed); }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines: self.lines.load(Ordering::Relaxed),
            ring_overruns: self.ring_overruns.load(Ordering::Relaxed),
            busy_timeouts: self.busy_timeouts.load(Ordering::Relaxed),
            truncations: self.truncations.load(Ordering::Relaxed),
            unbalanced_scopes: self.unbalanced_scopes.load(Ordering::Relaxed),
            sink_contention: self.sink_contention.load(Ordering::Relaxed),
        }
    }
}

impl Default for FormatterStats {
    fn default() -> Self { Self::new() }
}

// =============================================================================
// Tests
// =============================================================================
