//! Stack growth for the recursive parser and evaluator.
//!
//! Nesting depth is bounded by the source text (and by
//! [`RunnerConfig::max_depth`](crate::RunnerConfig::max_depth) at run time),
//! not by the caller's thread stack.

/// Run `f`, first moving to a fresh stack segment if too little remains.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    /// Space that must be left before `f` runs.
    const RED_ZONE: usize = 100 * 1024;
    /// Size of each new stack segment.
    const STACK_PER_RECURSION: usize = 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::ensure_sufficient_stack;

    fn depth(n: u64) -> u64 {
        ensure_sufficient_stack(|| {
            // Force a sizeable frame per level.
            let padding = std::hint::black_box([0_u8; 1024]);

            if n == 0 {
                u64::from(padding[0])
            } else {
                depth(n - 1) + 1
            }
        })
    }

    #[test]
    fn recursion_past_thread_stack() {
        // Roughly 10 MB of frames, more than a test thread has.
        assert_eq!(depth(10_000), 10_000);
    }
}
