//! The strand: a FIFO serializer layered over an
//! [`Executor`](crate::Executor) so its handlers never run concurrently,
//! without ever blocking the worker thread that's draining the underlying
//! engine.

use crate::context_stack::{self, ContextGuard, Kind};
use crate::log::{Event, Logger};
use crate::{Executor, Handler};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct StrandInner<E: Executor> {
    executor: E,
    queue: Mutex<VecDeque<Handler>>,
    /// `true` while a drain task for this strand is queued or running on
    /// the underlying executor. Locked in the same critical section as
    /// `queue` whenever both are touched together, to avoid a race
    /// between "is anything scheduled" and "what's queued".
    scheduled: Mutex<bool>,
    logger: Logger,
}

impl<E: Executor> StrandInner<E> {
    fn addr(&self) -> usize {
        self as *const StrandInner<E> as usize
    }
}

/// A serializing adapter over an executor. Owns its own FIFO; at most one
/// "drain one strand item" task is ever scheduled on the underlying
/// executor at a time, so strand handlers never run concurrently with
/// each other even though the engine they're layered over may have many
/// worker threads pulling from its queue.
///
/// The drain task posted to the underlying executor captures the strand
/// itself, and callers can keep posting to it independently — that cyclic
/// reference is resolved with an `Arc<StrandInner<E>>`: the public handle
/// holds one reference, and each outstanding drain-task closure holds
/// another, so the strand's state survives exactly as long as there's
/// unexecuted work, with no raw back-pointer and no precondition for the
/// caller to keep it alive.
#[derive(Clone)]
pub struct Strand<E: Executor> {
    inner: Arc<StrandInner<E>>,
}

impl<E: Executor> Strand<E> {
    /// Construct an idle strand targeting `executor`.
    pub fn new(executor: E) -> Self {
        Strand {
            inner: Arc::new(StrandInner {
                executor,
                queue: Mutex::new(VecDeque::new()),
                scheduled: Mutex::new(false),
                logger: Logger::new(0),
            }),
        }
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Is the current thread already running a handler dispatched from
    /// this strand? (Strand address present on the thread's context
    /// stack.)
    pub fn running_in_this_thread(&self) -> bool {
        context_stack::contains(Kind::Strand, self.addr())
    }

    /// Enqueue `handler` into the strand's private FIFO. Every call claims
    /// one unit of outstanding work on the underlying executor — this is
    /// the handler's own claim, released when the drain task that
    /// eventually runs it returns. If no drain task is currently scheduled
    /// or running for this strand, also post one; otherwise the
    /// already-scheduled (or running) drain task will pick this handler up
    /// once it reaches the front of the queue.
    pub fn post(&self, handler: Handler) {
        self.inner.executor.on_work_started();
        let mut scheduled = self.inner.scheduled.lock().unwrap();
        {
            let mut queue = self.inner.queue.lock().unwrap();
            queue.push_back(handler);
        }
        if !*scheduled {
            *scheduled = true;
            drop(scheduled);
            let addr = self.inner.addr();
            self.inner
                .logger
                .log(|| Event::StrandDrainScheduled { strand_addr: addr });
            let strand = self.clone();
            self.inner.executor.post(Box::new(move || strand.drain_task()));
            // The underlying executor's own `post` just claimed a unit of
            // work for scheduling this drain task; that's strand-internal
            // bookkeeping; cancel it immediately so it doesn't linger on
            // top of the per-handler claim above.
            self.inner.executor.on_work_finished();
        }
    }

    /// Run `handler` inline if the caller is already executing a handler
    /// of *this* strand (so mutual exclusion is already held), otherwise
    /// behave exactly as [`post`](Self::post).
    pub fn dispatch(&self, handler: Handler) {
        if self.running_in_this_thread() {
            handler();
        } else {
            self.post(handler);
        }
    }

    /// What the underlying executor actually runs on a worker thread: pop
    /// one handler, invoke it, then either chain the next drain task or
    /// mark the strand idle.
    fn drain_task(&self) {
        let _ctx = ContextGuard::push(Kind::Strand, self.inner.addr());

        let handler = {
            let mut queue = self.inner.queue.lock().unwrap();
            queue.pop_front()
        };
        if let Some(handler) = handler {
            handler();
            let addr = self.inner.addr();
            self.inner
                .logger
                .log(|| Event::StrandDrainExecuted { strand_addr: addr });
        }

        let mut scheduled = self.inner.scheduled.lock().unwrap();
        let more = !self.inner.queue.lock().unwrap().is_empty();
        if more {
            let addr = self.inner.addr();
            self.inner
                .logger
                .log(|| Event::StrandDrainChained { strand_addr: addr });
            let strand = self.clone();
            self.inner.executor.post(Box::new(move || strand.drain_task()));
            // Cancel the repost's own claim the same way `post` does for the
            // initial schedule — chaining is strand-internal, not a new
            // claim. The claim for the handler just run above is released
            // by the underlying executor's own per-handler accounting once
            // this drain task instance returns.
            self.inner.executor.on_work_finished();
        } else {
            *scheduled = false;
            let addr = self.inner.addr();
            self.inner
                .logger
                .log(|| Event::StrandDrainParked { strand_addr: addr });
        }
        drop(scheduled);
    }
}

impl<E: Executor> PartialEq for Strand<E> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<E: Executor> Eq for Strand<E> {}
