//! Scope guards for call-nesting indentation.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::formatter::LineFormatter;

/// Enters a scope on creation and leaves it on drop.
///
/// With `indent_checks` enabled, a guard that drops at a different depth than
/// it entered at writes [`SCOPE_MISMATCH_MARKER`](crate::formatter::SCOPE_MISMATCH_MARKER)
/// to the primary sink before leaving.
#[must_use = "the scope is left as soon as the guard drops"]
pub struct ScopeGuard<'f, 'a, M: RawMutex, const CAP: usize, const N: usize> {
    formatter: &'f LineFormatter<'a, M, CAP, N>,
    depth: i32,
}

impl<'f, 'a, M: RawMutex, const CAP: usize, const N: usize> ScopeGuard<'f, 'a, M, CAP, N> {
    pub(crate) fn enter(formatter: &'f LineFormatter<'a, M, CAP, N>) -> Self {
        formatter.enter_scope();
        Self {
            formatter,
            depth: formatter.indent_depth(),
        }
    }

    /// Depth seen right after entering.
    pub const fn depth(&self) -> i32 { self.depth }
}

impl<M: RawMutex, const CAP: usize, const N: usize> Drop for ScopeGuard<'_, '_, M, CAP, N> {
    fn drop(&mut self) {
        if self.formatter.config().indent_checks && self.formatter.indent_depth() != self.depth {
            self.formatter.write_scope_mismatch();
        }
        self.formatter.leave_scope();
    }
}
