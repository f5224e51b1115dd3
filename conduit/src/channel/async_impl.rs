// src/channel/async_impl.rs
//! Future-based write and read for the channel.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::core::ChannelShared;
use crate::cancel::{self, CancellationToken};
use crate::error::{Error, Result, TryReadError, TryWriteError};
use crate::internal::waiter::Waiter;

impl<A> ChannelShared<A> {
  /// Polls for one value. `Ready(Ok(None))` is a clean end of stream.
  ///
  /// Registers the task's waker when nothing is available, so this is safe to
  /// drop at any `Pending` without losing a value.
  pub(crate) fn poll_read(&self, cx: &mut Context<'_>) -> Poll<Result<Option<A>>> {
    loop {
      match self.try_read_core() {
        Ok(item) => return Poll::Ready(Ok(Some(item))),
        Err(TryReadError::Completed) => return Poll::Ready(Ok(None)),
        Err(TryReadError::Failed(error)) => return Poll::Ready(Err(error)),
        Err(TryReadError::Empty) => {}
      }
      if self.park_reader(Waiter::Async(cx.waker().clone())) {
        return Poll::Pending;
      }
    }
  }
}

/// A future that completes once a value has been written to the channel.
#[must_use = "futures do nothing unless you .await or poll them"]
pub(crate) struct WriteFuture<'a, A> {
  shared: &'a ChannelShared<A>,
  item: Option<A>,
  token: Option<&'a CancellationToken>,
  watch_key: Option<u64>,
}

// The item is only ever moved out by value, never pinned.
impl<A> Unpin for WriteFuture<'_, A> {}

impl<'a, A> WriteFuture<'a, A> {
  pub(crate) fn new(shared: &'a ChannelShared<A>, item: A, token: Option<&'a CancellationToken>) -> Self {
    Self {
      shared,
      item: Some(item),
      token,
      watch_key: None,
    }
  }
}

impl<A> Future for WriteFuture<'_, A> {
  type Output = Result<()>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    loop {
      if cancel::is_cancelled(this.token) {
        this.item = None;
        return Poll::Ready(Err(Error::Cancelled));
      }

      // Polled again after completion.
      let Some(item) = this.item.take() else {
        return Poll::Ready(Ok(()));
      };

      match this.shared.try_write_core(item) {
        Ok(()) => return Poll::Ready(Ok(())),
        Err(TryWriteError::Closed(_)) => return Poll::Ready(Err(Error::SinkFull)),
        Err(TryWriteError::Full(returned)) => this.item = Some(returned),
      }

      if this.shared.park_writer(Waiter::Async(cx.waker().clone())) {
        if let Some(token) = this.token {
          token.watch(&mut this.watch_key, Waiter::Async(cx.waker().clone()));
        }
        return Poll::Pending;
      }
    }
  }
}

impl<A> Drop for WriteFuture<'_, A> {
  fn drop(&mut self) {
    if let Some(token) = self.token {
      token.unwatch(&mut self.watch_key);
    }
  }
}

/// A future that completes with the next value or the end of the stream.
#[must_use = "futures do nothing unless you .await or poll them"]
pub(crate) struct ReadFuture<'a, A> {
  shared: &'a ChannelShared<A>,
  token: Option<&'a CancellationToken>,
  watch_key: Option<u64>,
}

impl<'a, A> ReadFuture<'a, A> {
  pub(crate) fn new(shared: &'a ChannelShared<A>, token: Option<&'a CancellationToken>) -> Self {
    Self {
      shared,
      token,
      watch_key: None,
    }
  }
}

impl<A> Future for ReadFuture<'_, A> {
  type Output = Result<Option<A>>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    if cancel::is_cancelled(this.token) {
      return Poll::Ready(Err(Error::Cancelled));
    }
    match this.shared.poll_read(cx) {
      Poll::Ready(result) => Poll::Ready(result),
      Poll::Pending => {
        if let Some(token) = this.token {
          token.watch(&mut this.watch_key, Waiter::Async(cx.waker().clone()));
        }
        Poll::Pending
      }
    }
  }
}

impl<A> Drop for ReadFuture<'_, A> {
  fn drop(&mut self) {
    if let Some(token) = self.token {
      token.unwatch(&mut self.watch_key);
    }
  }
}
