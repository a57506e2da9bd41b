//! A minimal asynchronous execution core.
//!
//! This crate provides three things, layered bottom to top:
//!
//! - An [`Engine`]: a thread-safe FIFO work queue, multiplexed over
//!   however many application-supplied worker threads call [`Engine::run`]
//!   or one of its variants, with outstanding-work accounting so those
//!   workers block until the engine is truly idle rather than merely
//!   queue-empty.
//! - An [`ExecutorHandle`]: a cheap, cloneable reference to an `Engine`
//!   that exposes the `post`/`dispatch`/work-accounting surface handlers
//!   use to talk back to the engine that's running them.
//! - A [`Strand`]: a FIFO serializer layered over any [`Executor`] so that
//!   handlers posted to it never run concurrently with one another, even
//!   though many worker threads may be pulling from the underlying
//!   engine's queue at once — without ever blocking a worker for the
//!   duration of the serialized region.
//!
//! There is deliberately no I/O, no timers, and no coroutine/awaitable
//! surface here — this is the execution core that such things would be
//! built on, not the things themselves. See `DESIGN.md` in the repository
//! root for how each piece is grounded against prior art.
//!
//! # Example
//!
//! ```
//! use exec_core::Engine;
//!
//! let engine = Engine::new();
//! let executor = engine.get_executor();
//! executor.post(Box::new(|| println!("hello from a worker")));
//! engine.run();
//! ```

mod context_stack;
mod engine;
mod executor;
mod log;
mod strand;
mod target;
mod work_guard;

pub use engine::Engine;
pub use executor::{Executor, ExecutorHandle};
pub use strand::Strand;
pub use target::{dispatch, post, Target};
pub use work_guard::WorkGuard;

/// An opaque, no-argument, non-failing callable queued for later or
/// immediate execution. Captured by value, so it may own whatever state
/// it needs.
pub type Handler = Box<dyn FnOnce() + Send + 'static>;
