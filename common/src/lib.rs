//! Debug output core shared by the firmware and the host demo.
//!
//! Leveled, indented, colorized lines to one or two serial-style sinks,
//! hex dumps, and free-memory checks, with scratch buffers that stay intact
//! when logging calls nest.
//!
//! - [`formatter`]: `LineFormatter`, the thing you log through
//! - [`scratch`]: scratch buffer ring and busy-flag claim
//! - [`sink`]: `OutputSink` trait and adapters
//! - [`channel`]: single-consumer line queue for async firmware
//! - [`colors`]: ANSI escapes and palettes
//! - [`config`]: per-board presets
//! - [`hexdump`]: short and annotated dump layouts
//! - [`scope`]: indentation guards
//! - [`memory`]: free-memory checks
//! - [`numfmt`]: fixed-point float display
//! - [`stats`]: counters for swallowed failures
//!
//! # Testing
//!
//! ```bash
//! cargo test -p serial-debug-common
//! ```
//!
//! Tests run with `std` enabled (via `cfg_attr`); the library itself is `no_std`.

#![cfg_attr(not(test), no_std)]
// Crate-level lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

#[macro_use]
mod macros;
mod diag;

pub mod channel;
pub mod colors;
pub mod config;
pub mod formatter;
pub mod hexdump;
pub mod memory;
pub mod numfmt;
pub mod scope;
pub mod scratch;
pub mod sink;
pub mod stats;

#[cfg(test)]
mod testing;

// Re-export commonly used items
pub use channel::{ChannelSink, LineChannel};
pub use colors::{ColorSlot, Palette};
pub use config::{FormatterConfig, OverflowPolicy, ScratchStrategy};
pub use formatter::{ArduinoFormatter, DynSink, LineFormatter, TeensyFormatter};
pub use memory::{MemoryProbe, check_memory, report_memory};
pub use numfmt::Fixed6;
pub use sink::{FmtSink, IoSink, LineEnding, OutputSink};
pub use stats::StatsSnapshot;
