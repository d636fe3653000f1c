//! Output sinks.
//!
//! A sink is anything that accepts text: a UART, an RTT channel, a USB CDC
//! port, a queue feeding another task. Writes are fire-and-forget. Adapters
//! swallow transport errors so a dead serial port never reaches the caller.

use core::fmt;

/// Destination for formatted debug text.
pub trait OutputSink {
    /// Write text as-is.
    fn write(&mut self, text: &str);

    /// Write text followed by the sink's line terminator.
    fn write_line(&mut self, text: &str) {
        self.write(text);
        self.write("\n");
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn write(&mut self, text: &str) { (**self).write(text); }

    fn write_line(&mut self, text: &str) { (**self).write_line(text); }
}

/// Line terminator written by [`IoSink`] and [`FmtSink`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// One indentation step.
pub const INDENT: &str = "    ";

/// Write `depth` indentation steps.
pub fn write_indent<S: OutputSink + ?Sized>(sink: &mut S, depth: usize) {
    for _ in 0..depth {
        sink.write(INDENT);
    }
}

// =============================================================================
// embedded-io Adapter
// =============================================================================

/// Sink over a blocking [`embedded_io::Write`] port.
pub struct IoSink<W> {
    inner: W,
    ending: LineEnding,
}

impl<W: embedded_io::Write> IoSink<W> {
    pub const fn new(inner: W, ending: LineEnding) -> Self { Self { inner, ending } }

    pub fn into_inner(self) -> W { self.inner }
}

impl<W: embedded_io::Write> OutputSink for IoSink<W> {
    fn write(&mut self, text: &str) {
        // A slow or absent receiver may drop bytes; nothing to report to.
        let _ = self.inner.write_all(text.as_bytes());
    }

    fn write_line(&mut self, text: &str) {
        self.write(text);
        let ending = self.ending.as_str();
        self.write(ending);
    }
}

// =============================================================================
// core::fmt Adapter
// =============================================================================

/// Sink over any [`fmt::Write`], e.g. a `heapless::String`.
pub struct FmtSink<W> {
    inner: W,
    ending: LineEnding,
}

impl<W: fmt::Write> FmtSink<W> {
    pub const fn new(inner: W, ending: LineEnding) -> Self { Self { inner, ending } }

    pub const fn get_ref(&self) -> &W { &self.inner }

    pub fn into_inner(self) -> W { self.inner }
}

impl<W: fmt::Write> OutputSink for FmtSink<W> {
    fn write(&mut self, text: &str) { self.inner.write_str(text).ok(); }

    fn write_line(&mut self, text: &str) {
        self.inner.write_str(text).ok();
        self.inner.write_str(self.ending.as_str()).ok();
    }
}

// =============================================================================
// Tests
// =============================================================================
