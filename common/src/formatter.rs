//! The line formatter.
//!
//! Turns `(level, color, message)` into text on up to two sinks:
//!
//! ```text
//! <color escape><indent><"WARNING - " | "ERROR - " | ""><message><newline>
//! ```
//!
//! # Re-entrancy
//!
//! A message is rendered into a scratch buffer that stays checked out until
//! every sink has been written, so a nested call (from a sink, an interrupt
//! handler or another task) can never scribble over text still being sent.
//! See [`ScratchStrategy`] for the two ways a buffer is checked out. Calls
//! that reach the sinks while another call is writing them drop their line
//! and count a contention instead of panicking or waiting.
//!
//! The sinks sit behind a `try_lock` mutex: the raw mutex is held only while
//! the lock is taken and released, never during sink I/O. With
//! `CriticalSectionRawMutex` a slow UART therefore never masks interrupts.
//!
//! # Usage
//!
//! ```ignore
//! static LOG: TeensyFormatter<'static, CriticalSectionRawMutex> =
//!     LineFormatter::new(FormatterConfig::TEENSY);
//!
//! LOG.set_primary(Some(uart_sink));
//! LOG.set_debug_level(2);
//! display!(LOG, 1, "boot ok, {} sensors", count);
//! warning!(LOG, 0, "battery {}mV", mv);
//! ```

use core::cell::Cell;
use core::fmt::{self, Write};
use core::sync::atomic::{AtomicI32, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;

use crate::colors::{CLEAR_SCREEN, CLEAR_SCROLLBACK, ColorSlot, Palette};
use crate::config::{
    ARDUINO_BUFFER_SIZE,
    FormatterConfig,
    OverflowPolicy,
    PREEMPTIVE_BUFFER_COUNT,
    PREEMPTIVE_BUFFER_SIZE,
    ScratchStrategy,
};
use crate::diag::diag_warn;
use crate::hexdump;
use crate::scope::ScopeGuard;
use crate::scratch::{Scratch, ScratchPool};
use crate::sink::{OutputSink, write_indent};
use crate::stats::{FormatterStats, StatsSnapshot};

/// A sink the formatter can hold.
pub type DynSink<'a> = &'a mut (dyn OutputSink + Send);

/// Formatter sized for AVR boards.
pub type ArduinoFormatter<'a, M> = LineFormatter<'a, M, ARDUINO_BUFFER_SIZE, 1>;

/// Formatter sized for Teensy, ESP32 and RP2350 boards.
pub type TeensyFormatter<'a, M> = LineFormatter<'a, M, PREEMPTIVE_BUFFER_SIZE, PREEMPTIVE_BUFFER_COUNT>;

const PRIMARY: u8 = 1 << 0;
const SECONDARY: u8 = 1 << 1;

/// Marker written when a checked scope exits at a different depth than it entered.
pub const SCOPE_MISMATCH_MARKER: &str = "<<<<<<<<";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Kind {
    Display,
    Warning,
    Error,
}

impl Kind {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Display => "",
            Self::Warning => "WARNING - ",
            Self::Error => "ERROR - ",
        }
    }

    const fn overflow_notice(self) -> &'static str {
        match self {
            Self::Display => "error - display buffer overflow",
            Self::Warning => "error - warning buffer overflow",
            Self::Error => "error - error buffer overflow",
        }
    }

    const fn slot(self) -> ColorSlot {
        match self {
            Self::Display => ColorSlot::Default,
            Self::Warning => ColorSlot::Warning,
            Self::Error => ColorSlot::Error,
        }
    }
}

struct Sinks<'a> {
    primary: Option<DynSink<'a>>,
    secondary: Option<DynSink<'a>>,
}

impl Sinks<'_> {
    /// Run `f` on each attached sink. Returns how many there were.
    fn for_each(&mut self, mut f: impl FnMut(&mut dyn OutputSink)) -> usize {
        let mut written = 0;
        if let Some(sink) = self.primary.as_deref_mut() {
            f(sink);
            written += 1;
        }
        if let Some(sink) = self.secondary.as_deref_mut() {
            f(sink);
            written += 1;
        }
        written
    }
}

/// Leveled, indented, colorized line output to up to two sinks.
///
/// `CAP` is the scratch buffer size in bytes (messages keep at most
/// `CAP - 1`), `N` the number of scratch buffers. `M` picks the mutex that
/// guards sinks and palette.
pub struct LineFormatter<'a, M: RawMutex, const CAP: usize, const N: usize> {
    config: FormatterConfig,
    debug_level: AtomicI32,
    warning_level: AtomicI32,
    depth: AtomicI32,
    attached: AtomicU8,
    sinks: Mutex<M, Sinks<'a>>,
    palette: BlockingMutex<M, Cell<Palette>>,
    pool: ScratchPool<CAP, N>,
    stats: FormatterStats,
}

impl<'a, M: RawMutex, const CAP: usize, const N: usize> LineFormatter<'a, M, CAP, N> {
    /// Create a formatter with no sinks and both thresholds at 0.
    pub const fn new(config: FormatterConfig) -> Self {
        Self {
            config,
            debug_level: AtomicI32::new(0),
            warning_level: AtomicI32::new(0),
            depth: AtomicI32::new(0),
            attached: AtomicU8::new(0),
            sinks: Mutex::new(Sinks {
                primary: None,
                secondary: None,
            }),
            palette: BlockingMutex::new(Cell::new(config.palette)),
            pool: ScratchPool::new(),
            stats: FormatterStats::new(),
        }
    }

    pub const fn config(&self) -> &FormatterConfig { &self.config }

    // =========================================================================
    // Sinks
    // =========================================================================

    /// Install (or with `None`, detach) the primary sink.
    ///
    /// Returns the sink that is no longer installed: the previous one, or
    /// `sink` itself if the sinks are busy with an in-progress write.
    pub fn set_primary(&self, sink: Option<DynSink<'a>>) -> Option<DynSink<'a>> {
        self.replace_sink(PRIMARY, sink)
    }

    /// Install (or with `None`, detach) the secondary sink.
    pub fn set_secondary(&self, sink: Option<DynSink<'a>>) -> Option<DynSink<'a>> {
        self.replace_sink(SECONDARY, sink)
    }

    pub fn take_primary(&self) -> Option<DynSink<'a>> { self.set_primary(None) }

    pub fn take_secondary(&self) -> Option<DynSink<'a>> { self.set_secondary(None) }

    /// At least one sink is attached.
    #[inline]
    pub fn has_sinks(&self) -> bool { self.attached.load(Ordering::Acquire) != 0 }

    #[inline]
    fn has_primary(&self) -> bool { self.attached.load(Ordering::Acquire) & PRIMARY != 0 }

    fn replace_sink(&self, which: u8, sink: Option<DynSink<'a>>) -> Option<DynSink<'a>> {
        let Ok(mut sinks) = self.sinks.try_lock() else {
            return sink;
        };
        let present = sink.is_some();
        let slot = if which == PRIMARY { &mut sinks.primary } else { &mut sinks.secondary };
        let previous = core::mem::replace(slot, sink);
        if present {
            self.attached.fetch_or(which, Ordering::AcqRel);
        } else {
            self.attached.fetch_and(!which, Ordering::AcqRel);
        }
        previous
    }

    /// Lock the sinks for one write sequence. A caller that finds them
    /// locked, nested or concurrent, gets `None` and the contention is counted.
    fn with_sinks<R>(&self, f: impl FnOnce(&mut Sinks<'a>) -> R) -> Option<R> {
        match self.sinks.try_lock() {
            Ok(mut sinks) => Some(f(&mut sinks)),
            Err(_) => {
                self.stats.sink_contended();
                None
            },
        }
    }

    fn with_primary(&self, f: impl FnOnce(&mut dyn OutputSink)) {
        self.with_sinks(|sinks| {
            if let Some(sink) = sinks.primary.as_deref_mut() {
                f(sink);
            }
        });
    }

    // =========================================================================
    // Thresholds
    // =========================================================================

    pub fn set_debug_level(&self, level: i32) { self.debug_level.store(level, Ordering::Relaxed); }

    pub fn debug_level(&self) -> i32 { self.debug_level.load(Ordering::Relaxed) }

    pub fn set_warning_level(&self, level: i32) { self.warning_level.store(level, Ordering::Relaxed); }

    pub fn warning_level(&self) -> i32 { self.warning_level.load(Ordering::Relaxed) }

    // =========================================================================
    // Colors
    // =========================================================================

    /// Replace one category's escape. Ignored when the palette is fixed.
    pub fn set_color(&self, slot: ColorSlot, escape: &'static str) {
        if !self.config.mutable_palette {
            return;
        }
        self.palette.lock(|palette| palette.set(palette.get().with(slot, escape)));
    }

    pub fn color(&self, slot: ColorSlot) -> &'static str { self.palette.lock(|palette| palette.get().get(slot)) }

    /// Clear the screen and scrollback of the terminal on the primary sink.
    pub fn clear_screen(&self) {
        self.with_primary(|sink| {
            sink.write(CLEAR_SCREEN);
            sink.write(CLEAR_SCROLLBACK);
        });
    }

    // =========================================================================
    // Indentation
    // =========================================================================

    pub fn enter_scope(&self) { self.depth.fetch_add(1, Ordering::AcqRel); }

    /// Leave a scope. Leaving more scopes than were entered clamps the depth
    /// at zero and reports the imbalance as a warning.
    pub fn leave_scope(&self) {
        let previous = match self
            .depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |d| Some((d - 1).max(0)))
        {
            Ok(d) | Err(d) => d,
        };
        if previous <= 0 {
            self.stats.unbalanced_scope();
            self.log_warning(0, format_args!("unbalanced scope exit, indent reset to 0"));
        }
    }

    /// Enter a scope for the lifetime of the returned guard.
    pub fn scope(&self) -> ScopeGuard<'_, 'a, M, CAP, N> { ScopeGuard::enter(self) }

    pub fn indent_depth(&self) -> i32 { self.depth.load(Ordering::Acquire) }

    fn current_indent(&self) -> usize {
        if self.config.indents { self.indent_depth().max(0) as usize } else { 0 }
    }

    pub(crate) fn write_scope_mismatch(&self) { self.with_primary(|sink| sink.write(SCOPE_MISMATCH_MARKER)); }

    // =========================================================================
    // Lines
    // =========================================================================

    /// Emit `args` if `level <= debug_level`. `color` overrides the default color.
    pub fn log_info(&self, level: i32, color: Option<&str>, args: fmt::Arguments<'_>) {
        if !self.has_sinks() || level > self.debug_level() {
            return;
        }
        self.render(Kind::Display, color, self.current_indent(), args);
    }

    /// Like [`log_info`](Self::log_info) but at an explicit indent depth.
    pub fn log_at_depth(&self, level: i32, depth: usize, args: fmt::Arguments<'_>) {
        if !self.has_sinks() || level > self.debug_level() {
            return;
        }
        let depth = if self.config.indents { depth } else { 0 };
        self.render(Kind::Display, None, depth, args);
    }

    /// Emit pre-rendered text of any length. Bypasses the scratch pool.
    pub fn log_str(&self, level: i32, color: Option<&str>, text: &str) {
        if !self.has_sinks() || level > self.debug_level() {
            return;
        }
        self.transmit(Kind::Display, color, self.current_indent(), text);
    }

    /// Emit `"WARNING - " + args` if `level <= warning_level`.
    pub fn log_warning(&self, level: i32, args: fmt::Arguments<'_>) {
        if !self.has_sinks() || level > self.warning_level() {
            return;
        }
        self.render(Kind::Warning, None, self.current_indent(), args);
    }

    /// Emit `"ERROR - " + args`. Never filtered, never indented.
    pub fn log_error(&self, args: fmt::Arguments<'_>) {
        if !self.has_sinks() {
            return;
        }
        self.render(Kind::Error, None, 0, args);
    }

    fn claim(&self) -> Option<Scratch<'_, CAP, N>> {
        match self.config.strategy {
            ScratchStrategy::Ring => {
                let scratch = self.pool.claim_next();
                if scratch.is_none() {
                    self.stats.ring_overrun();
                    diag_warn!("scratch ring overrun, {} buffers in flight", N);
                }
                scratch
            },
            ScratchStrategy::BusyFlag => {
                let scratch = self.pool.claim_exclusive(self.config.busy_spin_limit);
                if scratch.is_none() {
                    self.stats.busy_timeout();
                    diag_warn!("scratch buffer busy, line dropped");
                }
                scratch
            },
        }
    }

    fn render(&self, kind: Kind, color: Option<&str>, depth: usize, args: fmt::Arguments<'_>) {
        let Some(mut scratch) = self.claim() else {
            return;
        };
        scratch.write_fmt(args).ok();

        if scratch.truncated() {
            self.stats.truncation();
            if self.config.overflow == OverflowPolicy::Report {
                self.with_primary(|sink| sink.write_line(kind.overflow_notice()));
                return;
            }
        }

        // The scratch guard stays alive until every sink has the text.
        self.transmit(kind, color, depth, scratch.as_str());
    }

    fn transmit(&self, kind: Kind, color: Option<&str>, depth: usize, text: &str) {
        let palette_color = self.color(kind.slot());
        let color = color.unwrap_or(palette_color);
        let written = self.with_sinks(|sinks| {
            sinks.for_each(|sink| {
                sink.write(color);
                write_indent(sink, depth);
                sink.write(kind.prefix());
                sink.write_line(text);
            })
        });
        if written.is_some_and(|n| n > 0) {
            self.stats.line();
        }
    }

    // =========================================================================
    // Hex Dumps
    // =========================================================================

    /// Dump `bytes` after `label` on the primary sink, 16 per row.
    pub fn dump_bytes_short(&self, level: i32, label: &str, bytes: &[u8]) {
        if !self.has_primary() || level > self.debug_level() {
            return;
        }
        let depth = self.current_indent();
        self.with_primary(|sink| hexdump::write_short(sink, depth, label, bytes));
    }

    /// Address/hex/ASCII dump to `sink`, or to the primary sink when `None`.
    pub fn dump_bytes_annotated(&self, level: i32, base: u16, bytes: &[u8], sink: Option<&mut dyn OutputSink>) {
        if level > self.debug_level() {
            return;
        }
        let depth = self.current_indent();
        match sink {
            Some(sink) => hexdump::write_annotated(sink, depth, base, bytes),
            None => {
                if self.has_primary() {
                    self.with_primary(|sink| hexdump::write_annotated(sink, depth, base, bytes));
                }
            },
        }
    }

    // =========================================================================
    // Observability
    // =========================================================================

    pub fn stats(&self) -> StatsSnapshot { self.stats.snapshot() }

    /// Scratch buffers currently checked out.
    pub fn scratch_in_flight(&self) -> usize { self.pool.in_flight() }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::boxed::Box;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    use super::*;
    use crate::colors::{BRIGHT_GREEN, BRIGHT_RED, BRIGHT_YELLOW, GREEN, RED};
    use crate::testing::Capture;

    type TestFormatter<'a> = LineFormatter<'a, CriticalSectionRawMutex, 32, 3>;

    fn leak(cap: &Capture) -> DynSink<'static> { Box::leak(Box::new(cap.clone())) }

    #[test]
    fn test_info_respects_threshold() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));
        f.set_debug_level(2);

        for level in -1..=2 {
            f.log_info(level, None, format_args!("level {level}"));
        }
        assert_eq!(cap.lines().len(), 4);

        cap.clear();
        f.log_info(3, None, format_args!("hidden"));
        assert!(cap.is_empty());
    }

    #[test]
    fn test_info_line_format() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));

        f.log_info(0, None, format_args!("x={}", 7));
        assert_eq!(cap.text(), std::format!("{BRIGHT_GREEN}x=7\n"));
    }

    #[test]
    fn test_color_override() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));

        f.log_info(0, Some(RED), format_args!("hot"));
        assert_eq!(cap.text(), std::format!("{RED}hot\n"));
    }

    #[test]
    fn test_warning_threshold_and_prefix() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));
        f.set_warning_level(1);

        f.log_warning(2, format_args!("filtered"));
        assert!(cap.is_empty());

        f.log_warning(1, format_args!("low {}", "battery"));
        assert_eq!(cap.text(), std::format!("{BRIGHT_YELLOW}WARNING - low battery\n"));
    }

    #[test]
    fn test_error_unfiltered_and_not_indented() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));
        f.set_debug_level(-100);
        f.set_warning_level(-100);
        f.enter_scope();

        f.log_error(format_args!("boom"));
        assert_eq!(cap.text(), std::format!("{BRIGHT_RED}ERROR - boom\n"));
    }

    #[test]
    fn test_no_sinks_is_a_no_op() {
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.log_info(0, None, format_args!("nobody listens"));
        f.log_error(format_args!("nobody listens"));
        f.dump_bytes_short(0, "x", &[1, 2]);
        assert_eq!(f.stats().lines, 0);
        assert_eq!(f.scratch_in_flight(), 0);
    }

    #[test]
    fn test_both_sinks_receive() {
        let a = Capture::new();
        let b = Capture::new();
        let mut sink_a = a.clone();
        let mut sink_b = b.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink_a));
        f.set_secondary(Some(&mut sink_b));

        f.log_warning(0, format_args!("w"));
        assert_eq!(a.text(), b.text());
        assert_eq!(f.stats().lines, 1);

        assert!(f.take_primary().is_some());
        f.log_info(0, None, format_args!("only b"));
        assert_eq!(a.lines().len(), 1);
        assert_eq!(b.lines().len(), 2);
        assert!(f.has_sinks());

        assert!(f.take_secondary().is_some());
        assert!(!f.has_sinks());
    }

    #[test]
    fn test_indentation() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));

        f.enter_scope();
        f.enter_scope();
        f.log_info(0, None, format_args!("deep"));
        f.log_warning(0, format_args!("w"));
        f.leave_scope();
        f.leave_scope();

        let lines = cap.lines();
        assert_eq!(lines[0], std::format!("{BRIGHT_GREEN}        deep"));
        assert_eq!(lines[1], std::format!("{BRIGHT_YELLOW}        WARNING - w"));
    }

    #[test]
    fn test_indentation_disabled() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY.with_indents(false));
        f.set_primary(Some(&mut sink));

        f.enter_scope();
        f.log_info(0, None, format_args!("flat"));
        f.log_at_depth(0, 3, format_args!("flat too"));
        assert_eq!(cap.lines()[0], std::format!("{BRIGHT_GREEN}flat"));
        assert_eq!(cap.lines()[1], std::format!("{BRIGHT_GREEN}flat too"));
    }

    #[test]
    fn test_log_at_depth_leaves_depth_alone() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));

        f.log_at_depth(0, 1, format_args!("one"));
        assert_eq!(cap.text(), std::format!("{BRIGHT_GREEN}    one\n"));
        assert_eq!(f.indent_depth(), 0);
    }

    #[test]
    fn test_scope_round_trip() {
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.enter_scope();
        let before = f.indent_depth();
        f.enter_scope();
        f.leave_scope();
        assert_eq!(f.indent_depth(), before);
    }

    #[test]
    fn test_unbalanced_leave_clamps_and_warns() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));

        for _ in 0..3 {
            f.leave_scope();
        }
        assert_eq!(f.indent_depth(), 0);
        assert_eq!(f.stats().unbalanced_scopes, 3);
        assert_eq!(cap.lines().len(), 3);
        assert!(cap.lines()[0].contains("WARNING - unbalanced scope exit"));
    }

    #[test]
    fn test_truncation() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));

        let long = "x".repeat(100);
        f.log_info(0, None, format_args!("{long}"));
        let expected = std::format!("{BRIGHT_GREEN}{}\n", "x".repeat(31));
        assert_eq!(cap.text(), expected);
        assert_eq!(f.stats().truncations, 1);
    }

    #[test]
    fn test_overflow_report_policy() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::ARDUINO);
        f.set_primary(Some(&mut sink));

        let long = "y".repeat(40);
        f.log_info(0, None, format_args!("{long}"));
        f.log_warning(0, format_args!("{long}"));
        assert_eq!(cap.lines(), ["error - display buffer overflow", "error - warning buffer overflow"]);
        assert_eq!(f.stats().truncations, 2);
        assert_eq!(f.stats().lines, 0);
    }

    #[test]
    fn test_set_color_only_changes_one_category() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_color(ColorSlot::Warning, GREEN);
        assert_eq!(f.color(ColorSlot::Warning), GREEN);
        assert_eq!(f.color(ColorSlot::Default), BRIGHT_GREEN);
        assert_eq!(f.color(ColorSlot::Error), BRIGHT_RED);

        f.set_primary(Some(&mut sink));
        f.log_warning(0, format_args!("w"));
        f.log_error(format_args!("e"));
        assert_eq!(cap.lines(), [std::format!("{GREEN}WARNING - w"), std::format!("{BRIGHT_RED}ERROR - e")]);
    }

    #[test]
    fn test_fixed_palette_ignores_set_color() {
        let f = TestFormatter::new(FormatterConfig::ARDUINO);
        f.set_color(ColorSlot::Default, RED);
        assert_eq!(f.color(ColorSlot::Default), Palette::ARDUINO.default);
    }

    #[test]
    fn test_clear_screen() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));
        f.clear_screen();
        assert_eq!(cap.text(), "\x1b[2J\x1b[3J");
    }

    #[test]
    fn test_log_str_bypasses_scratch_limit() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));

        let long = "z".repeat(200);
        f.log_str(0, None, &long);
        assert!(cap.text().contains(&long));
        assert_eq!(f.stats().truncations, 0);
    }

    #[test]
    fn test_dump_short_empty_exact() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));

        f.dump_bytes_short(0, "frame", &[]);
        assert_eq!(cap.lines(), ["frame (0 bytes!!)"]);

        cap.clear();
        f.dump_bytes_short(1, "frame", &[1, 2, 3]);
        assert!(cap.is_empty());
    }

    #[test]
    fn test_dump_short_primary_only() {
        let a = Capture::new();
        let b = Capture::new();
        let mut sink_a = a.clone();
        let mut sink_b = b.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_secondary(Some(&mut sink_b));
        f.dump_bytes_short(0, "x", &[0xde, 0xad]);
        assert!(b.is_empty());

        f.set_primary(Some(&mut sink_a));
        f.dump_bytes_short(0, "x", &[0xde, 0xad]);
        assert_eq!(a.text(), "x de ad\n");
    }

    #[test]
    fn test_dump_annotated_explicit_sink() {
        let primary = Capture::new();
        let other = Capture::new();
        let mut sink = primary.clone();
        let mut target = other.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));

        let bytes: std::vec::Vec<u8> = (0x41..0x52).collect(); // 17 bytes
        f.dump_bytes_annotated(0, 0x0010, &bytes, Some(&mut target));
        assert!(primary.is_empty());
        let lines = other.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("    0x0010: 41 "));
        assert!(lines[0].ends_with("ABCDEFGHIJKLMNOP"));
        assert!(lines[1].starts_with("    0x0020: 51 "));
        assert!(lines[1].ends_with("    Q"));

        f.dump_bytes_annotated(0, 0, &bytes[..1], None);
        assert_eq!(primary.lines().len(), 1);

        f.dump_bytes_annotated(5, 0, &bytes, None);
        assert_eq!(primary.lines().len(), 1);
    }

    #[test]
    fn test_checked_scope_reports_mismatch() {
        let cap = Capture::new();
        let mut sink = cap.clone();
        let f = TestFormatter::new(FormatterConfig::TEENSY.with_indent_checks(true));
        f.set_primary(Some(&mut sink));
        {
            let _guard = f.scope();
            assert_eq!(f.indent_depth(), 1);
            f.enter_scope(); // never left
        }
        assert_eq!(cap.text(), SCOPE_MISMATCH_MARKER);
        assert_eq!(f.indent_depth(), 1);
    }

    // A sink that logs back into the formatter from inside its first write.
    struct Reentrant {
        formatter: &'static TestFormatter<'static>,
        inner: Capture,
        fired: AtomicBool,
    }

    impl OutputSink for Reentrant {
        fn write(&mut self, text: &str) {
            if !self.fired.swap(true, Ordering::Relaxed) {
                self.formatter.log_info(0, None, format_args!("nested"));
            }
            self.inner.write(text);
        }
    }

    #[test]
    fn test_reentrant_ring_call_is_dropped_not_corrupting() {
        static F: TestFormatter<'static> = LineFormatter::new(FormatterConfig::TEENSY);
        let cap = Capture::new();
        let sink = Box::leak(Box::new(Reentrant {
            formatter: &F,
            inner: cap.clone(),
            fired: AtomicBool::new(false),
        }));
        F.set_primary(Some(sink));

        F.log_info(0, None, format_args!("outer"));
        assert_eq!(cap.text(), std::format!("{BRIGHT_GREEN}outer\n"));
        let stats = F.stats();
        assert_eq!(stats.sink_contention, 1);
        assert_eq!(stats.ring_overruns, 0);
        assert_eq!(stats.lines, 1);
        assert_eq!(F.scratch_in_flight(), 0);
    }

    #[test]
    fn test_reentrant_busy_flag_times_out() {
        static F: TestFormatter<'static> =
            LineFormatter::new(FormatterConfig::TEENSY.with_strategy(ScratchStrategy::BusyFlag).with_busy_spin_limit(8));
        let cap = Capture::new();
        let sink = Box::leak(Box::new(Reentrant {
            formatter: &F,
            inner: cap.clone(),
            fired: AtomicBool::new(false),
        }));
        F.set_primary(Some(sink));

        F.log_info(0, None, format_args!("outer"));
        assert_eq!(cap.text(), std::format!("{BRIGHT_GREEN}outer\n"));
        assert_eq!(F.stats().busy_timeouts, 1);
        assert_eq!(F.stats().sink_contention, 0);
    }

    #[test]
    fn test_threads_stress_ring() {
        const THREADS: u32 = 8;
        const CALLS: u32 = 200;

        let cap = Capture::new();
        let f: Arc<TestFormatter<'static>> = Arc::new(LineFormatter::new(FormatterConfig::TEENSY));
        f.set_primary(Some(leak(&cap)));

        let handles: std::vec::Vec<_> = (0..THREADS)
            .map(|t| {
                let f = Arc::clone(&f);
                std::thread::spawn(move || {
                    for i in 0..CALLS {
                        f.log_info(0, None, format_args!("thread {t} call {i} {}", "-".repeat(40)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Concurrent writers either overrun the ring or find the sinks locked.
        let stats = f.stats();
        assert_eq!(stats.lines + stats.dropped(), THREADS * CALLS);
        assert_eq!(stats.busy_timeouts, 0);
        assert_eq!(stats.truncations, stats.lines);
        assert_eq!(cap.lines().len() as u32, stats.lines);
        for line in cap.lines() {
            assert!(line.len() <= BRIGHT_GREEN.len() + 31);
        }
        assert_eq!(f.scratch_in_flight(), 0);
    }

    /// Logs itself from inside its own formatting, one level deeper each time.
    struct Nested;

    static NESTED_FORMATTER: LineFormatter<'static, CriticalSectionRawMutex, 64, 3> =
        LineFormatter::new(FormatterConfig::TEENSY);
    static NESTED_DEPTH: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);

    impl fmt::Display for Nested {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let depth = NESTED_DEPTH.fetch_add(1, Ordering::Relaxed);
            NESTED_FORMATTER.log_info(0, None, format_args!("{}", Nested));
            write!(f, "depth {depth}")
        }
    }

    #[test]
    fn test_nesting_past_ring_size_overruns() {
        let cap = Capture::new();
        NESTED_FORMATTER.set_primary(Some(leak(&cap)));

        NESTED_FORMATTER.log_info(0, None, format_args!("{}", Nested));

        // Three slots hold depths 0..=2; the fourth call finds slot 0 in flight.
        let stats = NESTED_FORMATTER.stats();
        assert_eq!(stats.ring_overruns, 1);
        assert_eq!(stats.lines, 3);
        assert_eq!(
            cap.lines(),
            std::vec![
                std::format!("{BRIGHT_GREEN}depth 2"),
                std::format!("{BRIGHT_GREEN}depth 1"),
                std::format!("{BRIGHT_GREEN}depth 0"),
            ]
        );
        assert_eq!(NESTED_FORMATTER.scratch_in_flight(), 0);
    }

    /// Sleeps on every write and flags the first one.
    struct SlowSink {
        started: Arc<AtomicBool>,
        delay: std::time::Duration,
    }

    impl OutputSink for SlowSink {
        fn write(&mut self, _text: &str) {
            self.started.store(true, Ordering::Release);
            std::thread::sleep(self.delay);
        }
    }

    #[test]
    fn test_slow_sink_does_not_hold_critical_section() {
        let delay = std::time::Duration::from_millis(25);
        let started = Arc::new(AtomicBool::new(false));
        let mut sink = SlowSink {
            started: Arc::clone(&started),
            delay,
        };
        let f = TestFormatter::new(FormatterConfig::TEENSY);
        f.set_primary(Some(&mut sink));

        let waited = std::thread::scope(|s| {
            let writer = s.spawn(|| f.dump_bytes_short(0, "x", &[0; 32]));
            while !started.load(Ordering::Acquire) {
                std::thread::yield_now();
            }
            let begin = std::time::Instant::now();
            critical_section::with(|_| {});
            let waited = begin.elapsed();
            writer.join().unwrap();
            waited
        });

        assert!(waited < delay, "critical section blocked for {waited:?}");
    }
}
