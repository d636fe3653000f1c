//! Scratch buffer pool.
//!
//! A fixed ring of `N` text buffers of `CAP` bytes. Each formatting call
//! checks out one buffer for the whole render-and-transmit sequence and
//! hands it back when its [`Scratch`] guard drops.
//!
//! Two ways to check a buffer out, matching [`ScratchStrategy`](crate::config::ScratchStrategy):
//!
//! - [`ScratchPool::claim_next`]: take the slot under `head` and advance
//!   `head`. If that slot is still in flight (more than `N` nested calls),
//!   the claim fails and the caller drops its line. Nothing is overwritten.
//! - [`ScratchPool::claim_exclusive`]: spin on slot 0 for a bounded number of
//!   iterations. A caller re-entering from the context that holds the slot
//!   times out instead of deadlocking.
//!
//! Text written through a guard is cut at `CAP - 1` bytes on a character
//! boundary, leaving room for the terminator a C-side consumer expects.

use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use heapless::String;

struct Slot<const CAP: usize> {
    claimed: AtomicBool,
    text: UnsafeCell<String<CAP>>,
}

impl<const CAP: usize> Slot<CAP> {
    const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
            text: UnsafeCell::new(String::new()),
        }
    }
}

/// Fixed ring of scratch buffers.
pub struct ScratchPool<const CAP: usize, const N: usize> {
    slots: [Slot<CAP>; N],
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: a slot's text is only reachable through a `Scratch` guard, and a
// guard only exists while its slot's `claimed` flag is held exclusively.
unsafe impl<const CAP: usize, const N: usize> Sync for ScratchPool<CAP, N> {}

impl<const CAP: usize, const N: usize> ScratchPool<CAP, N> {
    const VALID: () = assert!(CAP > 1 && N > 0, "scratch pool needs at least one buffer of two bytes");

    /// Usable bytes per buffer.
    pub const TEXT_LIMIT: usize = CAP - 1;

    pub const fn new() -> Self {
        let () = Self::VALID;
        Self {
            slots: [const { Slot::new() }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Claim the slot under `head`, advancing `head` either way.
    ///
    /// Returns `None` when that slot is still in flight.
    pub fn claim_next(&self) -> Option<Scratch<'_, CAP, N>> {
        let index = match self.head.fetch_update(Ordering::AcqRel, Ordering::Relaxed, |h| Some((h + 1) % N)) {
            Ok(prev) | Err(prev) => prev,
        };
        self.try_claim(index)
    }

    /// Claim slot 0, spinning up to `spin_limit` times while it is busy.
    pub fn claim_exclusive(&self, spin_limit: u32) -> Option<Scratch<'_, CAP, N>> {
        let mut spins = 0;
        loop {
            if let Some(scratch) = self.try_claim(0) {
                return Some(scratch);
            }
            if spins >= spin_limit {
                return None;
            }
            spins += 1;
            core::hint::spin_loop();
        }
    }

    /// Number of buffers currently checked out.
    pub fn in_flight(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.claimed.load(Ordering::Acquire))
            .count()
    }

    /// Next slot `claim_next` will hand out.
    pub fn head(&self) -> usize { self.head.load(Ordering::Relaxed) }

    /// Slot after the most recently released one.
    pub fn tail(&self) -> usize { self.tail.load(Ordering::Relaxed) }

    fn try_claim(&self, index: usize) -> Option<Scratch<'_, CAP, N>> {
        let slot = &self.slots[index];
        if slot
            .claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }
        let mut scratch = Scratch {
            pool: self,
            index,
            truncated: false,
        };
        scratch.text_mut().clear();
        Some(scratch)
    }

    fn release(&self, index: usize) {
        self.slots[index].claimed.store(false, Ordering::Release);
        self.tail
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |t| Some((t + 1) % N))
            .ok();
    }
}

impl<const CAP: usize, const N: usize> Default for ScratchPool<CAP, N> {
    fn default() -> Self { Self::new() }
}

/// A checked-out scratch buffer. Released on drop.
pub struct Scratch<'p, const CAP: usize, const N: usize> {
    pool: &'p ScratchPool<CAP, N>,
    index: usize,
    truncated: bool,
}

impl<const CAP: usize, const N: usize> Scratch<'_, CAP, N> {
    /// Ring slot this guard holds.
    pub const fn index(&self) -> usize { self.index }

    pub fn as_str(&self) -> &str {
        // SAFETY: this guard holds the slot's claim flag.
        unsafe { (*self.pool.slots[self.index].text.get()).as_str() }
    }

    /// Some text was cut because the buffer was full.
    pub const fn truncated(&self) -> bool { self.truncated }

    fn text_mut(&mut self) -> &mut String<CAP> {
        // SAFETY: this guard holds the slot's claim flag.
        unsafe { &mut *self.pool.slots[self.index].text.get() }
    }
}

impl<const CAP: usize, const N: usize> fmt::Write for Scratch<'_, CAP, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let text = self.text_mut();
        let room = (CAP - 1).saturating_sub(text.len());
        if s.len() <= room {
            text.push_str(s).ok();
            return Ok(());
        }
        let mut cut = room;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        text.push_str(&s[..cut]).ok();
        self.truncated = true;
        Ok(())
    }
}

impl<const CAP: usize, const N: usize> Drop for Scratch<'_, CAP, N> {
    fn drop(&mut self) { self.pool.release(self.index); }
}

// =============================================================================
// Tests
// =============================================================================
