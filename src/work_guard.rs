//! A scoped claim on one unit of outstanding work: keeps an engine's
//! `run`/`run_one` from returning until the guard is released.

use crate::Executor;

/// Constructed from an executor; immediately claims one unit of
/// outstanding work. Releases it on [`reset`](Self::reset) or when the
/// guard is dropped, whichever comes first.
///
/// `Clone` produces an independent claim: cloning a live guard claims an
/// *additional* unit of work rather than sharing the original's. `Copy` is
/// deliberately not implemented — a bitwise-copyable guard could claim work
/// without the corresponding `on_work_started` call. Move already does the
/// right thing here for free: the source becomes inert (`owns_work` false,
/// no counter change) and the destination inherits the live claim, with no
/// way to double-release it.
pub struct WorkGuard<E: Executor> {
    executor: E,
    owns_work: bool,
}

impl<E: Executor> WorkGuard<E> {
    /// Claim one unit of outstanding work on `executor`.
    pub fn new(executor: E) -> Self {
        executor.on_work_started();
        WorkGuard {
            executor,
            owns_work: true,
        }
    }

    /// Does this guard currently hold a claim?
    pub fn owns_work(&self) -> bool {
        self.owns_work
    }

    /// Release the claim early, if still held. Idempotent.
    pub fn reset(&mut self) {
        if self.owns_work {
            self.owns_work = false;
            self.executor.on_work_finished();
        }
    }
}

impl<E: Executor> Clone for WorkGuard<E> {
    fn clone(&self) -> Self {
        if self.owns_work {
            // An independent claim: matches the source's copy-constructor,
            // which calls `on_work_started` again rather than sharing the
            // original's claim.
            WorkGuard::new(self.executor.clone())
        } else {
            WorkGuard {
                executor: self.executor.clone(),
                owns_work: false,
            }
        }
    }
}

impl<E: Executor> Drop for WorkGuard<E> {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Engine;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn owns_work_true_until_reset() {
        let engine = Engine::new();
        let mut guard = WorkGuard::new(engine.get_executor());
        assert!(guard.owns_work());
        guard.reset();
        assert!(!guard.owns_work());
        // Resetting twice is a no-op, not a double decrement.
        guard.reset();
        assert!(!guard.owns_work());
    }

    #[test]
    fn guard_blocks_run_until_released() {
        let engine = Engine::new();
        let guard = WorkGuard::new(engine.get_executor());

        let finished = Arc::new(AtomicBool::new(false));
        let finished2 = Arc::clone(&finished);
        let worker_engine = engine.clone();
        let worker = thread::spawn(move || {
            worker_engine.run();
            finished2.store(true, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(10));
        assert!(!finished.load(Ordering::SeqCst));

        drop(guard);

        thread::sleep(Duration::from_millis(50));
        assert!(finished.load(Ordering::SeqCst));
        worker.join().unwrap();
    }

    #[test]
    fn clone_of_live_guard_is_an_independent_claim() {
        let engine = Engine::new();
        let guard_a = WorkGuard::new(engine.get_executor());
        let guard_b = guard_a.clone();
        assert!(guard_a.owns_work());
        assert!(guard_b.owns_work());

        drop(guard_a);
        assert!(!engine.stopped(), "guard_b's claim should still be held");
        drop(guard_b);
        assert!(engine.stopped());
    }

    #[test]
    fn move_transfers_claim_without_recount() {
        let engine = Engine::new();
        let guard_a = WorkGuard::new(engine.get_executor());
        let guard_b = guard_a; // move
        assert!(guard_b.owns_work());
        drop(guard_b);
        assert!(engine.stopped());
    }
}
