//! Formatter configuration and per-board presets.
//!
//! Buffer capacity and count are const generics on
//! [`LineFormatter`](crate::formatter::LineFormatter); everything else that
//! used to differ per board lives in [`FormatterConfig`].
//!
//! | Preset    | Buffer | Buffers | Strategy | Overflow | Palette          |
//! |-----------|--------|---------|----------|----------|------------------|
//! | `ARDUINO` | 80     | 1       | BusyFlag | Report   | cyan/yellow/magenta, fixed |
//! | `TEENSY`  | 255    | 5       | Ring     | Truncate | green/yellow/red, mutable  |
//! | `ESP32`   | 255    | 5       | Ring     | Truncate | green/yellow/red, mutable  |

use crate::colors::Palette;

// =============================================================================
// Buffer Sizes
// =============================================================================

/// Scratch buffer size on AVR boards.
pub const ARDUINO_BUFFER_SIZE: usize = 80;

/// Scratch buffer size on boards with preemption.
pub const PREEMPTIVE_BUFFER_SIZE: usize = 255;

/// Ring length on boards with preemption.
pub const PREEMPTIVE_BUFFER_COUNT: usize = 5;

/// Most bytes a short dump will show.
pub const MAX_DUMP_BYTES: usize = 2048 - 8;

/// Default spin budget before a busy-flag contender gives up.
pub const DEFAULT_BUSY_SPIN_LIMIT: u32 = 10_000;

const _: () = assert!(ARDUINO_BUFFER_SIZE > 1);
const _: () = assert!(ARDUINO_BUFFER_SIZE < PREEMPTIVE_BUFFER_SIZE);
const _: () = assert!(PREEMPTIVE_BUFFER_COUNT > 1);

// =============================================================================
// Policies
// =============================================================================

/// How a formatting call protects its scratch buffer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScratchStrategy {
    /// One buffer guarded by a claim flag; contenders spin, then give up.
    BusyFlag,
    /// Claim the next buffer of the ring; a slot still in flight is an overrun.
    Ring,
}

/// What to do when a rendered message does not fit the scratch buffer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverflowPolicy {
    /// Emit the first `CAP - 1` bytes.
    Truncate,
    /// Emit a one-line overflow notice on the primary sink instead.
    Report,
}

// =============================================================================
// Formatter Configuration
// =============================================================================

/// Runtime behavior switches for a [`LineFormatter`](crate::formatter::LineFormatter).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FormatterConfig {
    pub strategy: ScratchStrategy,
    /// Spin iterations a busy-flag contender waits before dropping its line.
    pub busy_spin_limit: u32,
    pub overflow: OverflowPolicy,
    /// Prefix lines with four spaces per scope depth.
    pub indents: bool,
    /// Scope guards report a depth mismatch on exit.
    pub indent_checks: bool,
    /// `set_color` takes effect. Fixed palettes ignore it.
    pub mutable_palette: bool,
    pub palette: Palette,
}

impl FormatterConfig {
    /// Single-threaded AVR boards: one small buffer, fixed colors.
    pub const ARDUINO: Self = Self {
        strategy: ScratchStrategy::BusyFlag,
        busy_spin_limit: DEFAULT_BUSY_SPIN_LIMIT,
        overflow: OverflowPolicy::Report,
        indents: true,
        indent_checks: false,
        mutable_palette: false,
        palette: Palette::ARDUINO,
    };

    /// Teensy 3.x/4.x.
    pub const TEENSY: Self = Self {
        strategy: ScratchStrategy::Ring,
        busy_spin_limit: DEFAULT_BUSY_SPIN_LIMIT,
        overflow: OverflowPolicy::Truncate,
        indents: true,
        indent_checks: false,
        mutable_palette: true,
        palette: Palette::PREEMPTIVE,
    };

    /// ESP32 family. Same behavior as Teensy.
    pub const ESP32: Self = Self::TEENSY;

    #[must_use]
    pub const fn with_strategy(mut self, strategy: ScratchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub const fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    #[must_use]
    pub const fn with_indents(mut self, indents: bool) -> Self {
        self.indents = indents;
        self
    }

    #[must_use]
    pub const fn with_indent_checks(mut self, indent_checks: bool) -> Self {
        self.indent_checks = indent_checks;
        self
    }

    #[must_use]
    pub const fn with_busy_spin_limit(mut self, limit: u32) -> Self {
        self.busy_spin_limit = limit;
        self
    }
}

impl Default for FormatterConfig {
    fn default() -> Self { Self::TEENSY }
}

// =============================================================================
// Tests
// =============================================================================
