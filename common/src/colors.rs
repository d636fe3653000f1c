//! ANSI color escapes for serial terminals.
//!
//! Escapes have the form `ESC [ <code> m`. Foreground codes:
//!
//! | Color   | Normal | Bright |
//! |---------|--------|--------|
//! | Black   | 30     | 90     |
//! | Red     | 31     | 91     |
//! | Green   | 32     | 92     |
//! | Yellow  | 33     | 93     |
//! | Blue    | 34     | 94     |
//! | Magenta | 35     | 95     |
//! | Cyan    | 36     | 96     |
//! | White   | 37     | 97     |
//!
//! Every emitted line starts with the escape of its category, so a line never
//! inherits the color of the previous one.

// =============================================================================
// Escape Sequences
// =============================================================================

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BRIGHT_RED: &str = "\x1b[91m";
pub const BRIGHT_GREEN: &str = "\x1b[92m";
pub const BRIGHT_YELLOW: &str = "\x1b[93m";
pub const BRIGHT_MAGENTA: &str = "\x1b[95m";
pub const BRIGHT_CYAN: &str = "\x1b[96m";
pub const BRIGHT_WHITE: &str = "\x1b[97m";

/// Erase the visible screen.
pub const CLEAR_SCREEN: &str = "\x1b[2J";

/// Erase the terminal scrollback.
pub const CLEAR_SCROLLBACK: &str = "\x1b[3J";

// =============================================================================
// Palette
// =============================================================================

/// One of the three configurable color categories.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorSlot {
    /// Plain `display` output
    Default,
    /// `warning` output
    Warning,
    /// `my_error` output
    Error,
}

/// Escape strings used for each category.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Palette {
    pub default: &'static str,
    pub warning: &'static str,
    pub error: &'static str,
}

impl Palette {
    /// Colors used on small AVR boards.
    pub const ARDUINO: Self = Self {
        default: BRIGHT_CYAN,
        warning: BRIGHT_YELLOW,
        error: BRIGHT_MAGENTA,
    };

    /// Colors used on Teensy, ESP32 and RP2350 class boards.
    pub const PREEMPTIVE: Self = Self {
        default: BRIGHT_GREEN,
        warning: BRIGHT_YELLOW,
        error: BRIGHT_RED,
    };

    /// Escape for a category.
    pub const fn get(&self, slot: ColorSlot) -> &'static str {
        match slot {
            ColorSlot::Default => self.default,
            ColorSlot::Warning => self.warning,
            ColorSlot::Error => self.error,
        }
    }

    /// Return a copy with one category replaced.
    #[must_use]
    pub const fn with(mut self, slot: ColorSlot, escape: &'static str) -> Self {
        match slot {
            ColorSlot::Default => self.default = escape,
            ColorSlot::Warning => self.warning = escape,
            ColorSlot::Error => self.error = escape,
        }
        self
    }
}

impl Default for Palette {
    fn default() -> Self { Self::PREEMPTIVE }
}

// =============================================================================
// Tests
// =============================================================================
