//! The execution engine: a thread-safe FIFO work queue with
//! outstanding-work accounting and a stop/restart lifecycle.

use crate::context_stack::{ContextGuard, Kind};
use crate::log::{Event, Logger};
use crate::{ExecutorHandle, Handler};
use crossbeam_utils::CachePadded;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

pub(crate) struct Inner {
    queue: Mutex<VecDeque<Handler>>,
    not_empty_or_stopped: Condvar,
    /// Queued + running + externally-held work-guard claims.
    outstanding: CachePadded<AtomicUsize>,
    stopped: CachePadded<AtomicBool>,
    logger: Logger,
}

impl Inner {
    fn addr(&self) -> usize {
        self as *const Inner as usize
    }

    pub(crate) fn stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn log_dispatched_inline(&self) {
        let addr = self.addr();
        self.logger
            .log(|| Event::HandlerDispatchedInline { queue_addr: addr });
    }

    pub(crate) fn post(&self, handler: Handler) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        {
            let mut queue = self.queue.lock().unwrap();
            queue.push_back(handler);
        }
        let addr = self.addr();
        self.logger.log(|| Event::HandlerPosted { queue_addr: addr });
        // A handler just became available; wake one blocked drain loop.
        self.not_empty_or_stopped.notify_one();
    }

    pub(crate) fn on_work_started(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn on_work_finished(&self) {
        // A plain `fetch_sub` would wrap around to `usize::MAX` on
        // underflow; `fetch_update` lets us saturate at zero instead so a
        // stray unmatched call in release builds clamps rather than
        // corrupting the counter (spec §7, item 2).
        let previous = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_sub(1))
            })
            .unwrap();
        debug_assert_ne!(
            previous, 0,
            "on_work_finished called without a matching on_work_started/post"
        );
        if previous <= 1 {
            self.set_stopped();
        }
    }

    fn set_stopped(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            let addr = self.addr();
            self.logger.log(|| Event::EngineStopped { queue_addr: addr });
        }
        // Wake every blocked drain loop so it can observe `stopped` and
        // return 0 instead of waiting for work that will never come.
        self.not_empty_or_stopped.notify_all();
    }

    fn stop(&self) {
        self.set_stopped();
    }

    fn restart(&self) {
        self.stopped.store(false, Ordering::Release);
        let addr = self.addr();
        self.logger.log(|| Event::EngineRestarted { queue_addr: addr });
    }

    /// Pop and run at most one handler. An empty-queue/outstanding-work-
    /// positive blocking wait parks on a condvar rather than spinning, so
    /// it costs nothing while idle.
    fn do_one(&self, blocking: bool) -> usize {
        let mut queue = self.queue.lock().unwrap();
        loop {
            if self.stopped() {
                return 0;
            }

            if let Some(handler) = queue.pop_front() {
                drop(queue);
                handler();
                let addr = self.addr();
                self.logger.log(|| Event::HandlerExecuted { queue_addr: addr });
                self.on_work_finished();
                return 1;
            }

            if self.outstanding.load(Ordering::SeqCst) == 0 {
                self.stop();
                return 0;
            }

            if !blocking {
                return 0;
            }

            queue = self.not_empty_or_stopped.wait(queue).unwrap();
        }
    }
}

/// Owns the work queue, the outstanding-work counter, and the stopped
/// flag.
///
/// Constructed once and shared: cloning an `Engine` clones the underlying
/// `Arc`, so the same engine can be driven by any number of worker
/// threads. Its identity is the `Arc`'s address, and every clone points at
/// the same one (see DESIGN.md).
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<Inner>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Construct an idle engine: outstanding work is zero, not stopped.
    pub fn new() -> Self {
        Engine {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                not_empty_or_stopped: Condvar::new(),
                outstanding: CachePadded::new(AtomicUsize::new(0)),
                stopped: CachePadded::new(AtomicBool::new(false)),
                logger: Logger::new(0),
            }),
        }
    }

    /// A cheap, cloneable handle referencing this engine.
    pub fn get_executor(&self) -> ExecutorHandle {
        ExecutorHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Enqueue `handler` for later execution; always asynchronous.
    pub fn post(&self, handler: Handler) {
        self.get_executor().post(handler);
    }

    /// Run `handler` inline if the caller is already draining this engine
    /// and it is not stopped, otherwise post it.
    pub fn dispatch(&self, handler: Handler) {
        self.get_executor().dispatch(handler);
    }

    /// Drain the queue until no handler is queued and no outstanding work
    /// remains. Blocks while outstanding work exists but the queue is
    /// momentarily empty. Returns the number of handlers executed.
    pub fn run(&self) -> usize {
        let _ctx = ContextGuard::push(Kind::Engine, self.addr());
        let mut count = 0;
        while self.inner.do_one(true) == 1 {
            count += 1;
        }
        count
    }

    /// Run at most one handler, blocking until one is available or the
    /// engine becomes idle/stopped. Returns 0 or 1.
    pub fn run_one(&self) -> usize {
        let _ctx = ContextGuard::push(Kind::Engine, self.addr());
        self.inner.do_one(true)
    }

    /// Run all immediately-ready handlers without blocking. Returns the
    /// number executed.
    pub fn poll(&self) -> usize {
        let _ctx = ContextGuard::push(Kind::Engine, self.addr());
        let mut count = 0;
        while self.inner.do_one(false) == 1 {
            count += 1;
        }
        count
    }

    /// Run at most one immediately-ready handler without blocking. Returns
    /// 0 or 1.
    pub fn poll_one(&self) -> usize {
        let _ctx = ContextGuard::push(Kind::Engine, self.addr());
        self.inner.do_one(false)
    }

    /// Stop the engine: further drain calls return 0 immediately. Already
    /// running handlers complete. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Is the engine currently stopped?
    pub fn stopped(&self) -> bool {
        self.inner.stopped()
    }

    /// Clear the stopped flag. Precondition (not enforced): no worker is
    /// currently inside a drain operation on this engine.
    pub fn restart(&self) {
        self.inner.restart();
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl PartialEq for Engine {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Engine {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool as StdAtomicBool;
    use std::sync::Arc as StdArc;

    #[test]
    fn single_post_and_run() {
        let engine = Engine::new();
        let checked = StdArc::new(StdAtomicBool::new(false));
        let c = StdArc::clone(&checked);
        engine.post(Box::new(move || {
            c.store(true, Ordering::SeqCst);
        }));
        engine.run();
        assert!(checked.load(Ordering::SeqCst));
        assert!(engine.stopped());
    }

    #[test]
    fn ten_posts_counted() {
        let engine = Engine::new();
        let counter = StdArc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let c = StdArc::clone(&counter);
            engine.post(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        engine.run();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn poll_never_blocks_on_outstanding_work() {
        let engine = Engine::new();
        let handle = engine.get_executor();
        handle.on_work_started();
        // Queue is empty but outstanding work is nonzero: poll must return
        // immediately with 0, never block.
        assert_eq!(engine.poll(), 0);
        assert!(!engine.stopped());
        handle.on_work_finished();
        assert!(engine.stopped());
    }

    #[test]
    fn stop_is_idempotent() {
        let engine = Engine::new();
        engine.stop();
        engine.stop();
        assert!(engine.stopped());
    }

    #[test]
    fn restart_allows_queued_handlers_to_run() {
        let engine = Engine::new();
        let counter = StdArc::new(AtomicUsize::new(0));
        let c = StdArc::clone(&counter);
        engine.post(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        engine.stop();
        assert_eq!(engine.run(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        engine.restart();
        assert_eq!(engine.run(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
