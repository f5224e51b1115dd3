// src/channel/mod.rs

//! The policy-driven MPMC queue shared by a conduit's sink and source.
//!
//! A [`Channel`] is a cheap handle (`Arc` clone) to one [`core::ChannelShared`].
//! It is crate-private: applications reach it only through `Sink` and `Source`.

pub(crate) mod async_impl;
pub(crate) mod core;
pub(crate) mod sync_impl;

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use self::async_impl::{ReadFuture, WriteFuture};
use self::core::{ChannelShared, Closure};
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::policy::{BufferPolicy, ChannelConfig};

pub(crate) struct Channel<A> {
  shared: Arc<ChannelShared<A>>,
}

impl<A> Clone for Channel<A> {
  fn clone(&self) -> Self {
    Channel {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<A> fmt::Debug for Channel<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.shared, f)
  }
}

impl<A> Channel<A> {
  /// Builds the channel a policy describes. A `Latest` seed is queued before
  /// the channel is handed out.
  ///
  /// # Panics
  ///
  /// Panics on a zero-capacity `Bounded` or `Newest` policy.
  pub(crate) fn new(policy: BufferPolicy<A>, label: impl Into<Arc<str>>) -> Self {
    let (config, seed) = policy.into_parts();
    let label = label.into();
    tracing::debug!(
      label = %label,
      capacity = ?config.capacity,
      full_mode = ?config.full_mode,
      seeded = seed.is_some(),
      "channel spawned"
    );
    Channel {
      shared: Arc::new(ChannelShared::new(config, seed, label)),
    }
  }

  pub(crate) fn write_blocking(&self, item: A, token: Option<&CancellationToken>) -> Result<()> {
    sync_impl::write_blocking(&self.shared, item, token)
  }

  pub(crate) async fn write_async(&self, item: A, token: Option<&CancellationToken>) -> Result<()> {
    WriteFuture::new(&self.shared, item, token).await
  }

  /// `Ok(None)` is a clean end of stream.
  pub(crate) fn read_blocking(&self, token: Option<&CancellationToken>) -> Result<Option<A>> {
    sync_impl::read_blocking(&self.shared, token)
  }

  pub(crate) async fn read_async(&self, token: Option<&CancellationToken>) -> Result<Option<A>> {
    ReadFuture::new(&self.shared, token).await
  }

  pub(crate) fn poll_read(&self, cx: &mut Context<'_>) -> Poll<Result<Option<A>>> {
    self.shared.poll_read(cx)
  }

  /// Closes the writer half cleanly. Idempotent; the first close wins.
  pub(crate) fn complete(&self) -> Result<()> {
    if self.shared.close(Closure::Completed) {
      tracing::debug!(label = %self.shared.label, "channel completed");
    }
    Ok(())
  }

  /// Closes the writer half carrying `error`. Idempotent; the first close wins.
  pub(crate) fn fail(&self, error: Error) -> Result<()> {
    let message = error.to_string();
    if self.shared.close(Closure::Failed(error)) {
      tracing::debug!(label = %self.shared.label, error = %message, "channel failed");
    }
    Ok(())
  }

  pub(crate) fn len(&self) -> usize {
    self.shared.len()
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.shared.is_closed()
  }

  #[cfg(test)]
  pub(crate) fn waiting_readers(&self) -> usize {
    self.shared.waiting_readers()
  }

  pub(crate) fn label(&self) -> &str {
    &self.shared.label
  }

  pub(crate) fn config(&self) -> ChannelConfig {
    self.shared.config
  }
}
