//! Hex dump rendering.
//!
//! Two layouts:
//!
//! ```text
//! short:      label 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f
//!                 10 11
//!
//! annotated:      0x0010: 48 65 6c 6c 6f 00 ...                 Hello.....
//! ```
//!
//! Rows are built in small stack buffers and written one line at a time, so a
//! dump of any length needs no buffer proportional to its input.

use core::fmt::Write;

use heapless::String;

use crate::config::MAX_DUMP_BYTES;
use crate::sink::{INDENT, OutputSink, write_indent};

/// Bytes shown per row.
pub const BYTES_PER_ROW: usize = 16;

/// One row of hex cells ("xx " per byte).
type HexRow = String<{ BYTES_PER_ROW * 3 }>;

/// Address + cells + gap + ASCII, with headroom for 5-digit addresses.
type AnnotatedRow = String<96>;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

#[inline]
fn push_hex<const N: usize>(
    s: &mut String<N>,
    byte: u8,
) {
    s.push(HEX_DIGITS[usize::from(byte >> 4)] as char).ok();
    s.push(HEX_DIGITS[usize::from(byte & 0x0f)] as char).ok();
}

/// Printable ASCII is shown as-is, everything else as `.`.
#[inline]
pub const fn printable(byte: u8) -> char {
    if byte.is_ascii_graphic() || byte == b' ' { byte as char } else { '.' }
}

/// Write `label` followed by up to [`MAX_DUMP_BYTES`] bytes as hex,
/// [`BYTES_PER_ROW`] per line.
pub fn write_short<S: OutputSink + ?Sized>(
    sink: &mut S,
    depth: usize,
    label: &str,
    bytes: &[u8],
) {
    write_indent(sink, depth);
    sink.write(label);

    if bytes.is_empty() {
        sink.write_line(" (0 bytes!!)");
        return;
    }

    sink.write(" ");
    let shown = &bytes[..bytes.len().min(MAX_DUMP_BYTES)];
    for (row_idx, chunk) in shown.chunks(BYTES_PER_ROW).enumerate() {
        if row_idx > 0 {
            write_indent(sink, depth);
            sink.write(INDENT);
        }
        let mut row = HexRow::new();
        for (i, &byte) in chunk.iter().enumerate() {
            if i > 0 {
                row.push(' ').ok();
            }
            push_hex(&mut row, byte);
        }
        sink.write_line(&row);
    }
}

/// Write an address / hex / ASCII dump. Addresses start at `base`.
pub fn write_annotated<S: OutputSink + ?Sized>(
    sink: &mut S,
    depth: usize,
    base: u16,
    bytes: &[u8],
) {
    if bytes.is_empty() {
        write_indent(sink, depth);
        sink.write_line("0x000000 (0 bytes!!)");
        return;
    }

    for (row_idx, chunk) in bytes.chunks(BYTES_PER_ROW).enumerate() {
        let address = u32::from(base) + (row_idx * BYTES_PER_ROW) as u32;
        let mut row = AnnotatedRow::new();
        write!(row, "    0x{address:04x}: ").ok();
        for &byte in chunk {
            push_hex(&mut row, byte);
            row.push(' ').ok();
        }
        for _ in chunk.len()..BYTES_PER_ROW {
            row.push_str("   ").ok();
        }
        row.push_str("    ").ok();
        for &byte in chunk {
            row.push(printable(byte)).ok();
        }

        write_indent(sink, depth);
        sink.write_line(&row);
    }
}

// =============================================================================
// Tests
// =============================================================================
