// src/internal/blocking.rs

//! Drives a poll function to completion on the current thread.
//!
//! Composite sources (merge, choose, bind, ...) are written once, against
//! `poll_read`. Their blocking reads poll with a waker that unparks this thread
//! and park between polls, so they suspend exactly like a plain channel read.

use std::task::{Context, Poll};

use super::waiter::ThreadParker;
use crate::cancel::{self, CancellationToken};
use crate::error::{Error, Result};

pub(crate) fn block_on_poll<T, F>(token: Option<&CancellationToken>, mut poll: F) -> Result<T>
where
  F: FnMut(&mut Context<'_>) -> Poll<Result<T>>,
{
  ThreadParker::with_current(|parker| {
    let mut cx = Context::from_waker(parker.waker());
    let mut watch_key = None;

    let result = loop {
      if cancel::is_cancelled(token) {
        break Err(Error::Cancelled);
      }
      if let Poll::Ready(result) = poll(&mut cx) {
        break result;
      }
      if let Some(token) = token {
        token.watch(&mut watch_key, parker.waiter());
      }
      parker.wait(|| cancel::is_cancelled(token));
    };

    if let Some(token) = token {
      token.unwatch(&mut watch_key);
    }
    result
  })
}
