//! Logging macros.
//!
//! Each macro takes the formatter first, then the same arguments as
//! `format_args!`. Arguments are only rendered when the line passes its
//! level check.
//!
//! ```ignore
//! display!(LOG, 1, "rx {} bytes", n);
//! display_color!(LOG, colors::BRIGHT_WHITE, 1, "highlight");
//! display_level!(LOG, 1, 3, "at depth three");
//! warning!(LOG, 0, "retrying ({}/{})", attempt, max);
//! my_error!(LOG, "bad checksum {:#04x}", sum);
//! ```

/// Info line at `level`, default color.
#[macro_export]
macro_rules! display {
    ($fmt:expr, $level:expr, $($arg:tt)+) => {
        $fmt.log_info($level, ::core::option::Option::None, ::core::format_args!($($arg)+))
    };
}

/// Info line at `level` in an explicit color.
#[macro_export]
macro_rules! display_color {
    ($fmt:expr, $color:expr, $level:expr, $($arg:tt)+) => {
        $fmt.log_info($level, ::core::option::Option::Some($color), ::core::format_args!($($arg)+))
    };
}

/// Info line at `level`, indented to `depth` regardless of the current scope.
#[macro_export]
macro_rules! display_level {
    ($fmt:expr, $level:expr, $depth:expr, $($arg:tt)+) => {
        $fmt.log_at_depth($level, $depth, ::core::format_args!($($arg)+))
    };
}

/// `WARNING - ` line at `level`.
#[macro_export]
macro_rules! warning {
    ($fmt:expr, $level:expr, $($arg:tt)+) => {
        $fmt.log_warning($level, ::core::format_args!($($arg)+))
    };
}

/// `ERROR - ` line, never filtered.
#[macro_export]
macro_rules! my_error {
    ($fmt:expr, $($arg:tt)+) => {
        $fmt.log_error(::core::format_args!($($arg)+))
    };
}
