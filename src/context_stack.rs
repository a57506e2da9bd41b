//! Thread-local stack of "I am currently inside X" frames.
//!
//! A thread-local pointer to the top frame, set on entry and cleared on
//! `Drop`, generalized into an intrusive linked list so frames can nest:
//! an engine's drain loop pushes an `Engine` frame, and a strand's drain
//! task running on top of it pushes a `Strand` frame without disturbing
//! the engine frame underneath.
//!
//! Keys are `(Kind, address)` pairs: an address alone isn't enough, since
//! an `Engine` and a `Strand` could in principle land at the same heap
//! address at different points in a process's lifetime. Tagging by `Kind`
//! costs nothing and removes the ambiguity outright.

use std::cell::Cell;
use std::ptr;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Kind {
    Engine,
    Strand,
}

struct Frame {
    kind: Kind,
    addr: usize,
    parent: *const Frame,
}

thread_local! {
    static TOP: Cell<*const Frame> = Cell::new(ptr::null());
}

/// RAII guard: links a new frame in on construction, unlinks it on drop.
/// Pushed on entry to a drain operation or a strand's `drain_task`.
pub(crate) struct ContextGuard {
    frame: *const Frame,
}

impl ContextGuard {
    pub(crate) fn push(kind: Kind, addr: usize) -> Self {
        let frame = TOP.with(|top| {
            let boxed = Box::new(Frame {
                kind,
                addr,
                parent: top.get(),
            });
            let ptr = Box::into_raw(boxed);
            top.set(ptr);
            ptr
        });
        ContextGuard { frame }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        TOP.with(|top| {
            debug_assert_eq!(
                top.get(),
                self.frame,
                "context stack frames must unwind in LIFO order"
            );
            // SAFETY: `self.frame` was produced by `Box::into_raw` in `push`
            // and is still the top of the stack (checked above in debug
            // builds), so reclaiming it here is sound.
            let frame = unsafe { Box::from_raw(self.frame as *mut Frame) };
            top.set(frame.parent);
        });
    }
}

/// Walks the current thread's stack looking for a frame tagged `(kind, addr)`.
pub(crate) fn contains(kind: Kind, addr: usize) -> bool {
    TOP.with(|top| {
        let mut ptr = top.get();
        while !ptr.is_null() {
            // SAFETY: every non-null pointer in this chain was boxed by a
            // live `ContextGuard` further down this same thread's stack; it
            // cannot have been freed yet.
            let frame = unsafe { &*ptr };
            if frame.kind == kind && frame.addr == addr {
                return true;
            }
            ptr = frame.parent;
        }
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stack_contains_nothing() {
        assert!(!contains(Kind::Engine, 0x1234));
    }

    #[test]
    fn push_then_contains_then_pop() {
        assert!(!contains(Kind::Engine, 42));
        {
            let _g = ContextGuard::push(Kind::Engine, 42);
            assert!(contains(Kind::Engine, 42));
            assert!(!contains(Kind::Strand, 42));
        }
        assert!(!contains(Kind::Engine, 42));
    }

    #[test]
    fn nested_frames_both_visible() {
        let _outer = ContextGuard::push(Kind::Engine, 1);
        assert!(contains(Kind::Engine, 1));
        {
            let _inner = ContextGuard::push(Kind::Strand, 2);
            assert!(contains(Kind::Engine, 1));
            assert!(contains(Kind::Strand, 2));
        }
        assert!(contains(Kind::Engine, 1));
        assert!(!contains(Kind::Strand, 2));
    }
}
