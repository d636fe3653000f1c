//! Internal diagnostics.
//!
//! With the `defmt` feature these forward to `defmt`; without it they
//! compile to nothing while still borrowing their arguments.

macro_rules! diag_warn {
    ($s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($s $(, $x)*);
        #[cfg(not(feature = "defmt"))]
        let _ = ($( & $x ),*);
    }};
}

pub(crate) use diag_warn;
