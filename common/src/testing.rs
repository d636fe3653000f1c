//! Host-side sink that records everything written to it.

use std::string::String;
use std::sync::{Arc, Mutex};
use std::vec::Vec;

use crate::sink::OutputSink;

/// Cloneable recording sink. Clones share the same buffer, so a test can
/// hand one clone to a formatter and read through the other.
#[derive(Clone, Default)]
pub struct Capture {
    buf: Arc<Mutex<String>>,
}

impl Capture {
    pub fn new() -> Self { Self::default() }

    pub fn text(&self) -> String { self.buf.lock().unwrap().clone() }

    pub fn lines(&self) -> Vec<String> { self.text().lines().map(String::from).collect() }

    pub fn is_empty(&self) -> bool { self.buf.lock().unwrap().is_empty() }

    pub fn clear(&self) { self.buf.lock().unwrap().clear(); }
}

impl OutputSink for Capture {
    fn write(&mut self, text: &str) { self.buf.lock().unwrap().push_str(text); }
}
