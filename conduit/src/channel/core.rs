// src/channel/core.rs

//! The shared, mutex-protected state of a conduit channel.
//!
//! ### Design Principles:
//!
//! 1.  **Central Mutex**: A `parking_lot::Mutex` guards the queue, the close
//!     state and both wait lists. Every mutation goes through it, so a write
//!     racing a close is ordered one way or the other, never lost.
//! 2.  **Unified Waiters**: Sync (thread) and async (waker) waiters share one
//!     list per side. The sync and async front ends only differ in the
//!     `Waiter` they park with.
//! 3.  **Wake All**: Any state change wakes every waiter on the opposite side
//!     (and both sides on close). Waiters retry under the lock and re-park if
//!     they lose. A woken waiter that is cancelled or dropped therefore never
//!     strands another one.
//! 4.  **Wake Outside the Lock**: Waiters are taken out of the state under the
//!     lock and woken after it is released.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, TryReadError, TryWriteError};
use crate::internal::waiter::{self, Waiter};
use crate::policy::{ChannelConfig, FullMode};
use crate::telemetry::{self, names::*};

/// Terminal state of the writer half.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Closure {
  Completed,
  Failed(Error),
}

/// The core state of the channel, protected by a single `Mutex`.
pub(crate) struct ChannelInternal<A> {
  /// Buffered values, oldest at the front.
  pub(crate) queue: VecDeque<A>,
  /// `Some` once the writer half has been completed or failed.
  pub(crate) closure: Option<Closure>,
  /// Writers parked on a full `Wait`-mode channel.
  pub(crate) waiting_writers: Vec<Waiter>,
  /// Readers parked on an empty, open channel.
  pub(crate) waiting_readers: Vec<Waiter>,
}

pub(crate) struct ChannelShared<A> {
  pub(crate) internal: Mutex<ChannelInternal<A>>,
  pub(crate) config: ChannelConfig,
  pub(crate) label: Arc<str>,
}

impl<A> fmt::Debug for ChannelShared<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let internal = self.internal.lock();
    f.debug_struct("Channel")
      .field("label", &self.label)
      .field("config", &self.config)
      .field("len", &internal.queue.len())
      .field("closure", &internal.closure)
      .field("waiting_writers", &internal.waiting_writers.len())
      .field("waiting_readers", &internal.waiting_readers.len())
      .finish()
  }
}

impl<A> ChannelShared<A> {
  pub(crate) fn new(config: ChannelConfig, seed: Option<A>, label: Arc<str>) -> Self {
    let initial_capacity = config.capacity.map_or(32, |capacity| capacity.min(1024));
    let mut queue = VecDeque::with_capacity(initial_capacity);
    queue.extend(seed);
    ChannelShared {
      internal: Mutex::new(ChannelInternal {
        queue,
        closure: None,
        waiting_writers: Vec::new(),
        waiting_readers: Vec::new(),
      }),
      config,
      label,
    }
  }

  /// Attempts to enqueue `item` without waiting.
  ///
  /// On a full `DropOldest` channel the oldest value is evicted; on a full
  /// `Wait` channel the item is handed back as `Full`.
  pub(crate) fn try_write_core(&self, item: A) -> Result<(), TryWriteError<A>> {
    let evicted;
    let readers;
    {
      let mut guard = self.internal.lock();

      if guard.closure.is_some() {
        telemetry::log_event(None, LOC_WRITE, EVT_WRITE_REJECTED, None);
        return Err(TryWriteError::Closed(item));
      }

      if self.config.has_room(guard.queue.len()) {
        evicted = None;
      } else {
        match self.config.full_mode {
          FullMode::Wait => return Err(TryWriteError::Full(item)),
          FullMode::DropOldest => {
            evicted = guard.queue.pop_front();
            telemetry::increment_counter(LOC_WRITE, EVT_EVICTED);
          }
        }
      }

      guard.queue.push_back(item);
      telemetry::log_event(Some(guard.queue.len()), LOC_WRITE, EVT_WRITTEN, None);
      readers = std::mem::take(&mut guard.waiting_readers);
    }
    // Evicted values and wake-ups are handled outside the lock.
    drop(evicted);
    waiter::wake_all(readers);
    Ok(())
  }

  /// Attempts to dequeue one value without waiting.
  ///
  /// Buffered values are always drained before the close state is reported.
  pub(crate) fn try_read_core(&self) -> Result<A, TryReadError> {
    let writers;
    let item;
    {
      let mut guard = self.internal.lock();
      match guard.queue.pop_front() {
        Some(value) => {
          item = value;
          telemetry::log_event(Some(guard.queue.len()), LOC_READ, EVT_READ, None);
          writers = std::mem::take(&mut guard.waiting_writers);
        }
        None => {
          return Err(match &guard.closure {
            None => TryReadError::Empty,
            Some(Closure::Completed) => TryReadError::Completed,
            Some(Closure::Failed(error)) => TryReadError::Failed(error.clone()),
          });
        }
      }
    }
    waiter::wake_all(writers);
    Ok(item)
  }

  /// Parks `waiter` as a writer unless a write could now make progress.
  ///
  /// Returns `false` (without parking) if there is room or the channel closed
  /// since the caller's failed attempt; the caller should retry immediately.
  pub(crate) fn park_writer(&self, waiter: Waiter) -> bool {
    let mut guard = self.internal.lock();
    if guard.closure.is_some() || self.config.has_room(guard.queue.len()) {
      return false;
    }
    waiter::enqueue(&mut guard.waiting_writers, waiter);
    telemetry::increment_counter(LOC_WRITE, EVT_WRITER_PARKED);
    true
  }

  /// Parks `waiter` as a reader unless a read could now make progress.
  pub(crate) fn park_reader(&self, waiter: Waiter) -> bool {
    let mut guard = self.internal.lock();
    if !guard.queue.is_empty() || guard.closure.is_some() {
      return false;
    }
    waiter::enqueue(&mut guard.waiting_readers, waiter);
    telemetry::increment_counter(LOC_READ, EVT_READER_PARKED);
    true
  }

  /// Closes the writer half. Only the first close takes effect; returns whether
  /// this call was it.
  pub(crate) fn close(&self, closure: Closure) -> bool {
    let (readers, writers) = {
      let mut guard = self.internal.lock();
      if guard.closure.is_some() {
        return false;
      }
      // The label is only copied when events are being collected.
      #[cfg(feature = "fibre_telemetry")]
      {
        let event = match &closure {
          Closure::Completed => EVT_COMPLETED,
          Closure::Failed(_) => EVT_FAILED,
        };
        telemetry::log_event(Some(guard.queue.len()), LOC_CLOSE, event, Some(self.label.to_string()));
      }
      guard.closure = Some(closure);
      (
        std::mem::take(&mut guard.waiting_readers),
        std::mem::take(&mut guard.waiting_writers),
      )
    };
    waiter::wake_all(readers);
    waiter::wake_all(writers);
    true
  }

  pub(crate) fn len(&self) -> usize {
    self.internal.lock().queue.len()
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.internal.lock().closure.is_some()
  }

  #[cfg(test)]
  pub(crate) fn waiting_readers(&self) -> usize {
    self.internal.lock().waiting_readers.len()
  }
}
