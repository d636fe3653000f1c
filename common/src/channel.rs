//! Single-consumer line queue.
//!
//! Producers write complete lines through a [`ChannelSink`], which queues
//! each finished line without blocking. One consumer task owns the real
//! output and drains the queue with [`LineChannel::run`]. Slow transports
//! then only stall the consumer, never the code doing the logging.
//!
//! A full queue drops the new line and counts it in [`LineChannel::dropped`].
//!
//! ```ignore
//! static LINES: LineChannel<CriticalSectionRawMutex, 320, 16> = LineChannel::new();
//!
//! // producer side
//! LOG.set_primary(Some(SINK.init(LINES.sink(LineEnding::CrLf))));
//!
//! // consumer task
//! LINES.run(&mut uart).await
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use heapless::String;

use crate::diag::diag_warn;
use crate::sink::{LineEnding, OutputSink};

/// Queue of rendered lines, `CAP` bytes each, at most `DEPTH` pending.
pub struct LineChannel<M: RawMutex, const CAP: usize, const DEPTH: usize> {
    queue: Channel<M, String<CAP>, DEPTH>,
    dropped: AtomicU32,
}

impl<M: RawMutex, const CAP: usize, const DEPTH: usize> LineChannel<M, CAP, DEPTH> {
    pub const fn new() -> Self {
        Self {
            queue: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Producer handle. Each handle assembles its own line.
    pub const fn sink(&self, ending: LineEnding) -> ChannelSink<'_, M, CAP, DEPTH> {
        ChannelSink {
            channel: self,
            pending: String::new(),
            ending,
        }
    }

    /// Queue a finished line. Returns `false` if the queue was full.
    pub fn try_push(&self, line: String<CAP>) -> bool {
        if self.queue.try_send(line).is_ok() {
            return true;
        }
        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        diag_warn!("line channel full, {} lines dropped", dropped);
        false
    }

    /// Wait for the next line.
    pub async fn receive(&self) -> String<CAP> { self.queue.receive().await }

    /// Write every queued line to `sink` without waiting. Returns the count.
    pub fn drain_into<S: OutputSink + ?Sized>(&self, sink: &mut S) -> usize {
        let mut count = 0;
        while let Ok(line) = self.queue.try_receive() {
            sink.write(&line);
            count += 1;
        }
        count
    }

    /// Consumer loop: forward every line to `sink`, forever.
    pub async fn run<S: OutputSink + ?Sized>(&self, sink: &mut S) -> ! {
        loop {
            let line = self.queue.receive().await;
            sink.write(&line);
        }
    }

    /// Lines waiting for the consumer.
    pub fn pending(&self) -> usize { self.queue.len() }

    /// Lines lost to a full queue.
    pub fn dropped(&self) -> u32 { self.dropped.load(Ordering::Relaxed) }
}

impl<M: RawMutex, const CAP: usize, const DEPTH: usize> Default for LineChannel<M, CAP, DEPTH> {
    fn default() -> Self { Self::new() }
}

/// Producer side of a [`LineChannel`].
///
/// Accumulates writes until `write_line`, then queues the whole line,
/// terminator included. Text past `CAP` bytes is cut on a character boundary.
pub struct ChannelSink<'c, M: RawMutex, const CAP: usize, const DEPTH: usize> {
    channel: &'c LineChannel<M, CAP, DEPTH>,
    pending: String<CAP>,
    ending: LineEnding,
}

impl<M: RawMutex, const CAP: usize, const DEPTH: usize> ChannelSink<'_, M, CAP, DEPTH> {
    fn append(&mut self, text: &str) {
        let room = CAP - self.pending.len();
        let mut cut = text.len().min(room);
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        self.pending.push_str(&text[..cut]).ok();
    }
}

impl<M: RawMutex, const CAP: usize, const DEPTH: usize> OutputSink for ChannelSink<'_, M, CAP, DEPTH> {
    fn write(&mut self, text: &str) { self.append(text); }

    fn write_line(&mut self, text: &str) {
        self.append(text);
        // Keep room for the terminator even when the text filled the line.
        let ending = self.ending.as_str();
        while CAP - self.pending.len() < ending.len() && self.pending.pop().is_some() {}
        self.append(ending);
        let line = core::mem::replace(&mut self.pending, String::new());
        self.channel.try_push(line);
    }
}

// =============================================================================
// Tests
// =============================================================================
