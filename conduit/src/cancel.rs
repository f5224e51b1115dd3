// src/cancel.rs

//! Cooperative cancellation for blocking and async operations.
//!
//! A [`CancellationToken`] is a cheap, clonable flag. Every waiting operation in
//! this crate has a `*_cancellable` form taking a token; while it waits, the
//! operation registers its thread or task with the token so that
//! [`CancellationToken::cancel`] wakes it promptly. A cancelled operation returns
//! [`Error::Cancelled`](crate::Error::Cancelled) and leaves the channel untouched.
//!
//! ```
//! use fibre_conduit::{spawn_with, BufferPolicy, CancellationToken, Error};
//! use std::thread;
//! use std::time::Duration;
//!
//! let conduit = spawn_with::<u32>(BufferPolicy::Single, "cancel-demo");
//! conduit.post(1).unwrap(); // fills the only slot
//!
//! let token = CancellationToken::new();
//! let canceller = token.clone();
//! let handle = thread::spawn(move || {
//!   thread::sleep(Duration::from_millis(20));
//!   canceller.cancel();
//! });
//!
//! assert_eq!(conduit.post_cancellable(2, &token), Err(Error::Cancelled));
//! handle.join().unwrap();
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::internal::waiter::Waiter;

#[derive(Default)]
struct TokenWaiters {
  next_key: u64,
  entries: Vec<(u64, Waiter)>,
}

#[derive(Default)]
struct TokenState {
  cancelled: AtomicBool,
  waiters: Mutex<TokenWaiters>,
}

/// A shareable cancellation signal.
///
/// Clones observe the same state. `CancellationToken::default()` is a fresh token
/// that nobody else holds, i.e. one that is never cancelled.
#[derive(Clone, Default)]
pub struct CancellationToken {
  state: Arc<TokenState>,
}

impl fmt::Debug for CancellationToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CancellationToken")
      .field("cancelled", &self.is_cancelled())
      .field("waiters", &self.state.waiters.lock().entries.len())
      .finish()
  }
}

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fires the token and wakes every operation waiting on it. Idempotent.
  pub fn cancel(&self) {
    if self.state.cancelled.swap(true, Ordering::AcqRel) {
      return;
    }
    let entries = std::mem::take(&mut self.state.waiters.lock().entries);
    tracing::trace!(woken = entries.len(), "cancellation token fired");
    for (_, waiter) in entries {
      waiter.wake();
    }
  }

  #[inline]
  pub fn is_cancelled(&self) -> bool {
    self.state.cancelled.load(Ordering::Acquire)
  }

  /// `Err(Error::Cancelled)` once the token has fired.
  pub fn check(&self) -> Result<()> {
    if self.is_cancelled() {
      Err(Error::Cancelled)
    } else {
      Ok(())
    }
  }

  /// Registers (or refreshes) `waiter` under the key in `slot`.
  ///
  /// If the token has already fired the waiter is woken immediately instead.
  pub(crate) fn watch(&self, slot: &mut Option<u64>, waiter: Waiter) {
    let mut guard = self.state.waiters.lock();
    if self.is_cancelled() {
      drop(guard);
      waiter.wake();
      return;
    }
    match *slot {
      Some(key) => {
        if let Some(entry) = guard.entries.iter_mut().find(|(k, _)| *k == key) {
          entry.1 = waiter;
        } else {
          guard.entries.push((key, waiter));
        }
      }
      None => {
        let key = guard.next_key;
        guard.next_key += 1;
        guard.entries.push((key, waiter));
        *slot = Some(key);
      }
    }
  }

  /// Removes the registration held in `slot`, if any.
  pub(crate) fn unwatch(&self, slot: &mut Option<u64>) {
    if let Some(key) = slot.take() {
      self.state.waiters.lock().entries.retain(|(k, _)| *k != key);
    }
  }
}

#[inline]
pub(crate) fn is_cancelled(token: Option<&CancellationToken>) -> bool {
  token.is_some_and(CancellationToken::is_cancelled)
}

/// Wraps a cancellation-safe future so that it resolves to `Error::Cancelled`
/// as soon as `token` fires. The inner future is dropped at that point, so it
/// must not hold anything it has taken out of a channel.
pub(crate) struct Cancellable<'a, T> {
  inner: BoxFuture<'a, Result<T>>,
  token: Option<&'a CancellationToken>,
  watch_key: Option<u64>,
}

impl<'a, T> Cancellable<'a, T> {
  pub(crate) fn new(inner: BoxFuture<'a, Result<T>>, token: Option<&'a CancellationToken>) -> Self {
    Self {
      inner,
      token,
      watch_key: None,
    }
  }
}

impl<T> Future for Cancellable<'_, T> {
  type Output = Result<T>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    if is_cancelled(this.token) {
      return Poll::Ready(Err(Error::Cancelled));
    }
    match this.inner.as_mut().poll(cx) {
      Poll::Ready(output) => Poll::Ready(output),
      Poll::Pending => {
        if let Some(token) = this.token {
          token.watch(&mut this.watch_key, Waiter::Async(cx.waker().clone()));
        }
        Poll::Pending
      }
    }
  }
}

impl<T> Drop for Cancellable<'_, T> {
  fn drop(&mut self) {
    if let Some(token) = self.token {
      token.unwatch(&mut self.watch_key);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::internal::waiter::ThreadParker;
  use std::thread;
  use std::time::Duration;

  #[test]
  fn cancel_is_idempotent_and_visible_to_clones() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());
    assert_eq!(clone.check(), Ok(()));
    token.cancel();
    token.cancel();
    assert!(clone.is_cancelled());
    assert_eq!(clone.check(), Err(Error::Cancelled));
  }

  #[test]
  fn cancel_wakes_parked_thread() {
    let token = CancellationToken::new();
    let waiting = token.clone();
    let handle = thread::spawn(move || {
      let parker = ThreadParker::new();
      let mut key = None;
      waiting.watch(&mut key, parker.waiter());
      parker.wait(|| waiting.is_cancelled());
      waiting.unwatch(&mut key);
    });
    thread::sleep(Duration::from_millis(50));
    token.cancel();
    handle.join().expect("waiting thread panicked");
  }

  #[test]
  fn watch_after_cancel_wakes_immediately() {
    let token = CancellationToken::new();
    token.cancel();
    let parker = ThreadParker::new();
    let mut key = None;
    token.watch(&mut key, parker.waiter());
    assert!(key.is_none());
    parker.wait(|| false);
  }

  #[test]
  fn unwatch_removes_registration() {
    let token = CancellationToken::new();
    let parker = ThreadParker::new();
    let mut key = None;
    token.watch(&mut key, parker.waiter());
    token.watch(&mut key, parker.waiter());
    assert_eq!(token.state.waiters.lock().entries.len(), 1);
    token.unwatch(&mut key);
    assert!(token.state.waiters.lock().entries.is_empty());
  }

  #[tokio::test]
  async fn cancellable_future_resolves_on_cancel() {
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(20)).await;
      canceller.cancel();
    });
    let never: BoxFuture<'_, Result<()>> = Box::pin(futures_util::future::pending());
    assert_eq!(Cancellable::new(never, Some(&token)).await, Err(Error::Cancelled));
  }
}
