//! Number rendering helpers that avoid float formatting machinery.

use core::fmt;

/// Displays an `f32` with exactly six decimal places using integer math only.
///
/// ```ignore
/// display!(LOG, 0, "afr {}", Fixed6(14.7));   // "afr 14.700000"
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Fixed6(pub f32);

impl fmt::Display for Fixed6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        if v.is_nan() {
            return f.write_str("nan");
        }
        if v.is_infinite() {
            return f.write_str(if v < 0.0 { "-inf" } else { "inf" });
        }

        let negative = v < 0.0;
        let abs = if negative { -v } else { v };
        // Saturates for magnitudes past u32::MAX.
        let mut whole = abs as u32;
        let mut frac = ((abs - whole as f32) * 1_000_000.0 + 0.5) as u32;
        if frac >= 1_000_000 {
            whole = whole.saturating_add(1);
            frac -= 1_000_000;
        }

        if negative && (whole != 0 || frac != 0) {
            f.write_str("-")?;
        }
        write!(f, "{whole}.{frac:06}")
    }
}
