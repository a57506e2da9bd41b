//! The executor-handle surface and the `Executor` trait that generalizes
//! it so `Strand` can target anything with the same capability set: post
//! work, report started/finished, detect re-entry.

use crate::context_stack::{self, Kind};
use crate::engine::Inner;
use crate::{Engine, Handler};
use std::sync::Arc;

/// What a [`Strand`](crate::Strand) needs from the thing it serializes work
/// onto: the ability to post a handler, account outstanding work around it,
/// and detect whether the current thread is already running inside it.
///
/// `ExecutorHandle` is the only implementation in this crate, but keeping
/// the capability set as a trait rather than hard-wiring `Strand` to
/// `ExecutorHandle` isolates one small, closed set of behaviors a generic
/// component depends on from the concrete type that supplies them.
pub trait Executor: Clone + Send + Sync + 'static {
    /// Enqueue `handler` for later execution; never runs it inline.
    fn post(&self, handler: Handler);

    /// One unit of outstanding work has begun; matched by `on_work_finished`.
    fn on_work_started(&self);

    /// One unit of outstanding work has ended.
    fn on_work_finished(&self);

    /// Is the current thread already executing a drain operation of the
    /// context this handle refers to?
    fn running_in_this_thread(&self) -> bool;
}

/// A lightweight, copyable, non-owning reference to an [`Engine`]. A raw
/// pointer would leave the caller to guarantee validity by keeping the
/// engine alive; sharing the engine's `Arc` instead makes that guarantee
/// automatic, at the same cost to clone.
#[derive(Clone)]
pub struct ExecutorHandle {
    pub(crate) inner: Arc<Inner>,
}

impl ExecutorHandle {
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Is the current thread inside a drain operation (`run`, `run_one`,
    /// `poll`, `poll_one`) of the engine this handle refers to?
    pub fn running_in_this_thread(&self) -> bool {
        context_stack::contains(Kind::Engine, self.addr())
    }

    /// `true` iff [`running_in_this_thread`](Self::running_in_this_thread)
    /// and the engine is not stopped — the precondition under which
    /// [`dispatch`](Self::dispatch) may run inline.
    pub fn can_dispatch(&self) -> bool {
        self.running_in_this_thread() && !self.inner.stopped()
    }

    /// Enqueue `handler`; always asynchronous, safe from any thread.
    pub fn post(&self, handler: Handler) {
        self.inner.post(handler);
    }

    /// Run `handler` inline if [`can_dispatch`](Self::can_dispatch),
    /// otherwise fall back to [`post`](Self::post).
    pub fn dispatch(&self, handler: Handler) {
        if self.can_dispatch() {
            self.inner.log_dispatched_inline();
            handler();
        } else {
            self.post(handler);
        }
    }

    /// Claim one unit of outstanding work.
    pub fn on_work_started(&self) {
        self.inner.on_work_started();
    }

    /// Release one unit of outstanding work.
    pub fn on_work_finished(&self) {
        self.inner.on_work_finished();
    }

    /// The engine this handle refers to.
    pub fn context(&self) -> Engine {
        Engine {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Executor for ExecutorHandle {
    fn post(&self, handler: Handler) {
        ExecutorHandle::post(self, handler)
    }

    fn on_work_started(&self) {
        ExecutorHandle::on_work_started(self)
    }

    fn on_work_finished(&self) {
        ExecutorHandle::on_work_finished(self)
    }

    fn running_in_this_thread(&self) -> bool {
        ExecutorHandle::running_in_this_thread(self)
    }
}

impl PartialEq for ExecutorHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ExecutorHandle {}
