//! Free `post`/`dispatch` functions, overloaded over anything a caller
//! might hand work to directly: an [`Engine`], a raw [`ExecutorHandle`],
//! or a [`Strand`]. Each just forwards to the receiver's own method; the
//! overload is expressed as a small `Target` trait rather than four
//! separately-named functions, so call sites read as `post(&engine, h)` /
//! `post(&strand, h)` regardless of which one they're holding.

use crate::{Engine, Executor, ExecutorHandle, Handler, Strand};

/// Something `post`/`dispatch` can forward a handler to. Implemented for
/// [`Engine`], [`ExecutorHandle`], and [`Strand`].
pub trait Target {
    fn post_handler(&self, handler: Handler);
    fn dispatch_handler(&self, handler: Handler);
}

impl Target for Engine {
    fn post_handler(&self, handler: Handler) {
        self.post(handler);
    }

    fn dispatch_handler(&self, handler: Handler) {
        self.dispatch(handler);
    }
}

impl Target for ExecutorHandle {
    fn post_handler(&self, handler: Handler) {
        self.post(handler);
    }

    fn dispatch_handler(&self, handler: Handler) {
        self.dispatch(handler);
    }
}

impl<E: Executor> Target for Strand<E> {
    fn post_handler(&self, handler: Handler) {
        self.post(handler);
    }

    fn dispatch_handler(&self, handler: Handler) {
        self.dispatch(handler);
    }
}

/// `post(engine, h)` / `post(strand, h)`: forwards to the target's own
/// `post`. Always asynchronous.
pub fn post<T: Target>(target: &T, handler: Handler) {
    target.post_handler(handler);
}

/// `dispatch(engine, h)` / `dispatch(strand, h)`: forwards to the target's
/// own `dispatch`.
pub fn dispatch<T: Target>(target: &T, handler: Handler) {
    target.dispatch_handler(handler);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn free_post_forwards_to_engine() {
        let engine = Engine::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        post(&engine, Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        engine.run();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn free_post_forwards_to_strand() {
        let engine = Engine::new();
        let strand = Strand::new(engine.get_executor());
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        post(&strand, Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        engine.run();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
