//! Free-memory checks.
//!
//! Boards report free RAM through a [`MemoryProbe`]; the checks turn that
//! into debug output. Sprinkle [`check_memory`] at the top of deep call paths
//! to catch stack/heap collisions before they turn into hard faults.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::formatter::LineFormatter;

/// Below this many free bytes [`check_memory`] warns.
pub const MEMORY_LIMIT_WARNING: u32 = 256;

/// Source of a free-memory estimate in bytes.
pub trait MemoryProbe {
    fn free_bytes(&self) -> u32;
}

impl<F: Fn() -> u32> MemoryProbe for F {
    fn free_bytes(&self) -> u32 { self() }
}

/// Warn (level 0) when free memory is below [`MEMORY_LIMIT_WARNING`].
/// Returns the free byte count.
pub fn check_memory<M: RawMutex, const CAP: usize, const N: usize, P: MemoryProbe + ?Sized>(
    formatter: &LineFormatter<'_, M, CAP, N>,
    probe: &P,
) -> u32 {
    let free = probe.free_bytes();
    if free < MEMORY_LIMIT_WARNING {
        formatter.log_warning(0, format_args!("low memory: {free} bytes free"));
    }
    free
}

/// Display the free byte count at `level`.
pub fn report_memory<M: RawMutex, const CAP: usize, const N: usize, P: MemoryProbe + ?Sized>(
    formatter: &LineFormatter<'_, M, CAP, N>,
    level: i32,
    probe: &P,
) -> u32 {
    let free = probe.free_bytes();
    formatter.log_info(level, None, format_args!("free memory: {free} bytes"));
    free
}
