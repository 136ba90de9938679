use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::timer::model::Generation;

/// Per-run cancellation flag.
///
/// Clones share the flag, so the engine keeps one handle and the tick loop polls another. The
/// generation ties the token to exactly one run; the engine only ever signals the token whose
/// generation is live, so a token from a superseded run can never stop a newer one.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    generation: Generation,
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns `true` if this call performed the cancellation.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new(4);
        let loop_side = token.clone();
        assert!(!loop_side.is_cancelled());

        assert!(token.cancel());
        assert!(loop_side.is_cancelled());
        assert_eq!(loop_side.generation(), 4);
    }

    #[test]
    fn second_cancel_reports_no_change() {
        let token = CancellationToken::new(1);
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn tokens_of_different_runs_are_independent() {
        let stale = CancellationToken::new(1);
        let live = CancellationToken::new(2);
        stale.cancel();
        assert!(!live.is_cancelled());
    }

    #[test]
    fn cancellation_is_visible_across_threads() {
        let token = CancellationToken::new(9);
        let observer = token.clone();
        let handle = thread::spawn(move || {
            while !observer.is_cancelled() {
                thread::yield_now();
            }
            observer.generation()
        });
        token.cancel();
        assert_eq!(handle.join().expect("observer thread"), 9);
    }
}
