// src/internal/waiter.rs

//! Parked threads and tasks.
//!
//! A [`Waiter`] is what the channel core and cancellation tokens keep in their
//! wait lists. Blocking callers use a [`ThreadParker`], which can hand out both a
//! `Waiter::Sync` (for the channel's own sync path) and a `Waker` that unparks the
//! thread (for polling combinators from a blocking context).

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::Waker;
use std::thread::{self, Thread};

use futures_util::task::{waker, ArcWake};

/// Either a parked thread or a pending task.
#[derive(Debug, Clone)]
pub(crate) enum Waiter {
  Sync {
    thread: Thread,
    notified: Arc<AtomicBool>,
  },
  Async(Waker),
}

impl Waiter {
  /// Wakes the underlying thread or task.
  pub(crate) fn wake(self) {
    match self {
      Waiter::Sync { thread, notified } => {
        notified.store(true, Ordering::Release);
        thread.unpark();
      }
      Waiter::Async(waker) => waker.wake(),
    }
  }

  /// True if waking `self` would reach the same thread or task as `other`.
  pub(crate) fn will_wake(&self, other: &Waiter) -> bool {
    match (self, other) {
      (Waiter::Async(a), Waiter::Async(b)) => a.will_wake(b),
      (Waiter::Sync { notified: a, .. }, Waiter::Sync { notified: b, .. }) => Arc::ptr_eq(a, b),
      _ => false,
    }
  }
}

/// Pushes `waiter` unless an equivalent entry is already queued.
pub(crate) fn enqueue(list: &mut Vec<Waiter>, waiter: Waiter) {
  if !list.iter().any(|queued| queued.will_wake(&waiter)) {
    list.push(waiter);
  }
}

/// Wakes every waiter in `list`. Call without holding the lock the list came from.
pub(crate) fn wake_all(list: Vec<Waiter>) {
  for waiter in list {
    waiter.wake();
  }
}

struct ThreadWake {
  thread: Thread,
  notified: Arc<AtomicBool>,
}

impl ArcWake for ThreadWake {
  fn wake_by_ref(arc_self: &Arc<Self>) {
    arc_self.notified.store(true, Ordering::Release);
    arc_self.thread.unpark();
  }
}

/// The blocking side of a wait: owns the `notified` flag for the current thread.
pub(crate) struct ThreadParker {
  thread: Thread,
  notified: Arc<AtomicBool>,
  waker: Waker,
}

thread_local! {
  static CURRENT: ThreadParker = ThreadParker::new();
  static CURRENT_IN_USE: Cell<bool> = const { Cell::new(false) };
}

struct ReleaseCurrent;

impl Drop for ReleaseCurrent {
  fn drop(&mut self) {
    CURRENT_IN_USE.with(|in_use| in_use.set(false));
  }
}

impl ThreadParker {
  /// Runs `f` with this thread's parker.
  ///
  /// Every blocking call on a thread parks with the same waiter, so a wait list
  /// that is never woken holds at most one entry per thread. A nested blocking
  /// call (from inside a user closure) gets a private parker instead, leaving
  /// the outer call's notification alone.
  pub(crate) fn with_current<R>(f: impl FnOnce(&ThreadParker) -> R) -> R {
    if CURRENT_IN_USE.with(|in_use| in_use.replace(true)) {
      return f(&ThreadParker::new());
    }
    let _release = ReleaseCurrent;
    CURRENT.with(|parker| {
      // Left over from an earlier call; the caller polls before waiting anyway.
      parker.notified.store(false, Ordering::Release);
      f(parker)
    })
  }

  pub(crate) fn new() -> Self {
    let thread = thread::current();
    let notified = Arc::new(AtomicBool::new(false));
    let waker = waker(Arc::new(ThreadWake {
      thread: thread.clone(),
      notified: Arc::clone(&notified),
    }));
    Self {
      thread,
      notified,
      waker,
    }
  }

  pub(crate) fn waiter(&self) -> Waiter {
    Waiter::Sync {
      thread: self.thread.clone(),
      notified: Arc::clone(&self.notified),
    }
  }

  /// A waker that unparks this thread.
  pub(crate) fn waker(&self) -> &Waker {
    &self.waker
  }

  /// Waits until notified or `interrupted` returns true.
  ///
  /// Spins briefly, then yields, then parks. Consumes the notification so the
  /// next wait needs a fresh one.
  pub(crate) fn wait<F>(&self, interrupted: F)
  where
    F: Fn() -> bool,
  {
    let ready = || self.notified.swap(false, Ordering::AcqRel) || interrupted();

    for _ in 0..10 {
      if ready() {
        return;
      }
      std::hint::spin_loop();
    }

    for _ in 0..20 {
      if ready() {
        return;
      }
      thread::yield_now();
    }

    // Spurious unparks just send us around the loop again.
    while !ready() {
      thread::park();
    }
  }
}
