//! Blocking write and read for the channel.
//!
//! Both follow the same shape: try without waiting, then park under the lock
//! (re-checking state so a wake-up cannot be lost), then wait with adaptive
//! backoff until notified or cancelled, and loop.

use super::core::ChannelShared;
use crate::cancel::{self, CancellationToken};
use crate::error::{Error, Result, TryReadError, TryWriteError};
use crate::internal::waiter::ThreadParker;

/// Writes `item`, parking the current thread while the channel is full.
///
/// Fails with `SinkFull` once the channel is closed and with `Cancelled` when
/// `token` fires first.
pub(crate) fn write_blocking<A>(shared: &ChannelShared<A>, item: A, token: Option<&CancellationToken>) -> Result<()> {
  if cancel::is_cancelled(token) {
    return Err(Error::Cancelled);
  }

  // --- Phase 1: Attempt a non-blocking write ---
  let mut item = match shared.try_write_core(item) {
    Ok(()) => return Ok(()),
    Err(TryWriteError::Closed(_)) => return Err(Error::SinkFull),
    Err(TryWriteError::Full(item)) => item,
  };

  ThreadParker::with_current(|parker| {
    let mut watch_key = None;

    let result = loop {
      // --- Phase 2: Park, unless the state changed under us ---
      if shared.park_writer(parker.waiter()) {
        if let Some(token) = token {
          token.watch(&mut watch_key, parker.waiter());
        }
        parker.wait(|| cancel::is_cancelled(token));
      }

      if cancel::is_cancelled(token) {
        break Err(Error::Cancelled);
      }

      // --- Phase 3: Retry ---
      match shared.try_write_core(item) {
        Ok(()) => break Ok(()),
        Err(TryWriteError::Closed(_)) => break Err(Error::SinkFull),
        Err(TryWriteError::Full(returned)) => item = returned,
      }
    };

    if let Some(token) = token {
      token.unwatch(&mut watch_key);
    }
    result
  })
}

/// Reads one value, parking the current thread while the channel is empty.
///
/// `Ok(None)` is a clean end of stream.
pub(crate) fn read_blocking<A>(shared: &ChannelShared<A>, token: Option<&CancellationToken>) -> Result<Option<A>> {
  // --- Phase 1: Attempt a non-blocking read ---
  if let Some(done) = try_read(shared, token) {
    return done;
  }

  ThreadParker::with_current(|parker| {
    let mut watch_key = None;

    let result = loop {
      // --- Phase 2: Park, unless the state changed under us ---
      if shared.park_reader(parker.waiter()) {
        if let Some(token) = token {
          token.watch(&mut watch_key, parker.waiter());
        }
        parker.wait(|| cancel::is_cancelled(token));
      }

      // --- Phase 3: Retry ---
      if let Some(done) = try_read(shared, token) {
        break done;
      }
    };

    if let Some(token) = token {
      token.unwatch(&mut watch_key);
    }
    result
  })
}

/// One read attempt. `None` means the channel is empty and open.
fn try_read<A>(shared: &ChannelShared<A>, token: Option<&CancellationToken>) -> Option<Result<Option<A>>> {
  if cancel::is_cancelled(token) {
    return Some(Err(Error::Cancelled));
  }
  match shared.try_read_core() {
    Ok(item) => Some(Ok(Some(item))),
    Err(TryReadError::Completed) => Some(Ok(None)),
    Err(TryReadError::Failed(error)) => Some(Err(error)),
    Err(TryReadError::Empty) => None,
  }
}
