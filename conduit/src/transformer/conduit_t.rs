// src/transformer/conduit_t.rs

//! A conduit whose write and read paths run through async transducers.

use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

use super::sink_t::SinkT;
use super::source_t::SourceT;
use super::transducer::Transducer;
use crate::cancel::CancellationToken;
use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::pipe::{Consumer, Producer};
use crate::policy::BufferPolicy;
use crate::sink::Sink;
use crate::source::Source;

/// Accepts `A`, stores `B` in its channel and yields `C`.
///
/// Posted values go through the sink transducer before they are queued; read
/// values go through the source transducer after they are dequeued. Either
/// transducer may drop an item or fail.
pub struct ConduitT<A, B, C> {
  channel: Channel<B>,
  sink: Transducer<A, B>,
  source: Transducer<B, C>,
}

impl<A, B, C> Clone for ConduitT<A, B, C> {
  fn clone(&self) -> Self {
    ConduitT {
      channel: self.channel.clone(),
      sink: self.sink.clone(),
      source: self.source.clone(),
    }
  }
}

impl<A, B, C> fmt::Debug for ConduitT<A, B, C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ConduitT").field("channel", &self.channel).finish()
  }
}

impl<A: Send + 'static> ConduitT<A, A, A> {
  /// An unbounded conduit with identity transducers on both sides.
  pub fn spawn(label: impl Into<Arc<str>>) -> Self {
    Self::spawn_with(BufferPolicy::Unbounded, label)
  }

  /// # Panics
  ///
  /// Panics if `policy` is `Bounded(0)` or `Newest(0)`.
  pub fn spawn_with(policy: BufferPolicy<A>, label: impl Into<Arc<str>>) -> Self {
    ConduitT {
      channel: Channel::new(policy, label),
      sink: Transducer::identity(),
      source: Transducer::identity(),
    }
  }
}

impl<A, B, C> ConduitT<A, B, C>
where
  A: Send + 'static,
  B: Send + 'static,
  C: Send + 'static,
{
  async fn post_with(&self, value: A, token: Option<&CancellationToken>) -> Result<()> {
    match self.sink.apply(value).await? {
      Some(stored) => self.channel.write_async(stored, token).await,
      None => Ok(()),
    }
  }

  async fn read_with(&self, token: Option<&CancellationToken>) -> Result<Option<C>> {
    while let Some(stored) = self.channel.read_async(token).await? {
      if let Some(value) = self.source.apply(stored).await? {
        return Ok(Some(value));
      }
    }
    Ok(None)
  }

  /// Transforms `value` and queues the result, waiting for space if needed.
  pub async fn post(&self, value: A) -> Result<()> {
    self.post_with(value, None).await
  }

  pub async fn post_cancellable(&self, value: A, token: &CancellationToken) -> Result<()> {
    self.post_with(value, Some(token)).await
  }

  /// Awaits `effect` and posts its value.
  pub async fn post_m<Fut>(&self, effect: Fut) -> Result<()>
  where
    Fut: Future<Output = Result<A>>,
  {
    let value = effect.await?;
    self.post(value).await
  }

  pub fn complete(&self) -> Result<()> {
    self.channel.complete()
  }

  pub fn fail(&self, error: Error) -> Result<()> {
    self.channel.fail(error)
  }

  /// Reads the next transformed value. Fails with [`Error::SourceClosed`] once
  /// the channel is completed and drained.
  pub async fn read(&self) -> Result<C> {
    self.read_with(None).await?.ok_or(Error::SourceClosed)
  }

  pub async fn read_cancellable(&self, token: &CancellationToken) -> Result<C> {
    self.read_with(Some(token)).await?.ok_or(Error::SourceClosed)
  }

  /// Folds values into `state` until something tells it to stop.
  ///
  /// Waits for each value, passes it through the source transducer and hands
  /// it to `reducer`. Returns the accumulated state as soon as `token` fires,
  /// `reducer` returns `ControlFlow::Break`, or the channel completes. A
  /// failed channel or transducer step is returned as `Err`.
  pub async fn reduce<S, F>(&self, mut state: S, token: &CancellationToken, mut reducer: F) -> Result<S>
  where
    F: FnMut(S, C) -> ControlFlow<S, S>,
  {
    loop {
      let value = match self.read_with(Some(token)).await {
        Ok(Some(value)) => value,
        Ok(None) => return Ok(state),
        Err(Error::Cancelled) if token.is_cancelled() => {
          tracing::trace!(label = self.channel.label(), "reduce stopped by cancellation");
          return Ok(state);
        }
        Err(error) => return Err(error),
      };
      state = match reducer(state, value) {
        ControlFlow::Continue(next) => next,
        ControlFlow::Break(done) => return Ok(done),
      };
    }
  }

  /// Maps every value read.
  pub fn map<D, F>(&self, f: F) -> ConduitT<A, B, D>
  where
    D: Send + 'static,
    F: Fn(C) -> D + Send + Sync + 'static,
  {
    self.with_source(self.source.then(Transducer::map(f)))
  }

  /// Awaits `f(value)` for every value read.
  pub fn map_m<D, F, Fut>(&self, f: F) -> ConduitT<A, B, D>
  where
    D: Send + 'static,
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<D>> + Send + 'static,
  {
    self.with_source(self.source.then(Transducer::map_m(f)))
  }

  /// Skips values read that `predicate` rejects.
  pub fn filter<F>(&self, predicate: F) -> ConduitT<A, B, C>
  where
    F: Fn(&C) -> bool + Send + Sync + 'static,
  {
    self.with_source(self.source.then(Transducer::filter(predicate)))
  }

  /// Maps every value posted before the existing sink transducer sees it.
  pub fn contramap<Z, F>(&self, f: F) -> ConduitT<Z, B, C>
  where
    Z: Send + 'static,
    F: Fn(Z) -> A + Send + Sync + 'static,
  {
    self.with_sink(Transducer::map(f).then(self.sink.clone()))
  }

  /// Awaits `f(value)` for every value posted.
  pub fn contramap_m<Z, F, Fut>(&self, f: F) -> ConduitT<Z, B, C>
  where
    Z: Send + 'static,
    F: Fn(Z) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<A>> + Send + 'static,
  {
    self.with_sink(Transducer::map_m(f).then(self.sink.clone()))
  }

  fn with_source<D: Send + 'static>(&self, source: Transducer<B, D>) -> ConduitT<A, B, D> {
    ConduitT {
      channel: self.channel.clone(),
      sink: self.sink.clone(),
      source,
    }
  }

  fn with_sink<Z: Send + 'static>(&self, sink: Transducer<Z, B>) -> ConduitT<Z, B, C> {
    ConduitT {
      channel: self.channel.clone(),
      sink,
      source: self.source.clone(),
    }
  }

  /// The write side, transducer included.
  pub fn sink(&self) -> SinkT<A> {
    SinkT::lift(Sink::from_channel(self.channel.clone())).transduce(self.sink.clone())
  }

  /// The read side, transducer included.
  pub fn source(&self) -> SourceT<C> {
    SourceT::lift(Source::from_channel(self.channel.clone())).transduce(self.source.clone())
  }

  pub fn to_producer(&self) -> Producer<C> {
    self.source().to_producer()
  }

  pub fn to_consumer(&self) -> Consumer<A> {
    self.sink().to_consumer()
  }
}
