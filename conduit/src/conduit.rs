// src/conduit.rs

//! A sink and a source sharing one channel.

use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::pipe::{Consumer, Producer};
use crate::policy::BufferPolicy;
use crate::sink::Sink;
use crate::source::{Iter, Source};
use crate::transformer::{SinkT, SourceT};

/// Creates an unbounded conduit.
///
/// `label` only identifies the channel in `Debug` output and `tracing` events.
pub fn spawn<A: Send + 'static>(label: impl Into<Arc<str>>) -> Conduit<A, A> {
  spawn_with(BufferPolicy::Unbounded, label)
}

/// Creates a conduit whose channel follows `policy`.
///
/// # Panics
///
/// Panics if `policy` is `Bounded(0)` or `Newest(0)`.
pub fn spawn_with<A: Send + 'static>(policy: BufferPolicy<A>, label: impl Into<Arc<str>>) -> Conduit<A, A> {
  let channel = Channel::new(policy, label);
  Conduit {
    sink: Sink::from_channel(channel.clone()),
    source: Source::from_channel(channel),
  }
}

/// A write endpoint accepting `A` paired with a read endpoint yielding `B`.
///
/// Conduits are immutable. Combinators return a new conduit with one side
/// replaced; the other side is shared with the original.
pub struct Conduit<A, B> {
  sink: Sink<A>,
  source: Source<B>,
}

impl<A, B> Clone for Conduit<A, B> {
  fn clone(&self) -> Self {
    Conduit {
      sink: self.sink.clone(),
      source: self.source.clone(),
    }
  }
}

impl<A, B> std::fmt::Debug for Conduit<A, B> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Conduit")
      .field("sink", &self.sink)
      .field("source", &self.source)
      .finish()
  }
}

impl<A, B> Conduit<A, B>
where
  A: Send + 'static,
  B: Send + 'static,
{
  /// Pairs an arbitrary sink and source.
  pub fn new(sink: Sink<A>, source: Source<B>) -> Self {
    Conduit { sink, source }
  }

  pub fn sink(&self) -> &Sink<A> {
    &self.sink
  }

  pub fn source(&self) -> &Source<B> {
    &self.source
  }

  pub fn into_parts(self) -> (Sink<A>, Source<B>) {
    (self.sink, self.source)
  }

  // --- Write side ---

  pub fn post(&self, value: A) -> Result<()> {
    self.sink.post(value)
  }

  pub fn post_cancellable(&self, value: A, token: &CancellationToken) -> Result<()> {
    self.sink.post_cancellable(value, token)
  }

  pub async fn post_async(&self, value: A) -> Result<()> {
    self.sink.post_async(value).await
  }

  pub async fn post_async_cancellable(&self, value: A, token: &CancellationToken) -> Result<()> {
    self.sink.post_async_cancellable(value, token).await
  }

  pub fn post_m<F>(&self, effect: F) -> Result<()>
  where
    F: FnOnce() -> Result<A>,
  {
    self.sink.post_m(effect)
  }

  pub fn complete(&self) -> Result<()> {
    self.sink.complete()
  }

  pub fn fail(&self, error: Error) -> Result<()> {
    self.sink.fail(error)
  }

  // --- Read side ---

  pub fn read(&self) -> Result<B> {
    self.source.read()
  }

  pub fn read_cancellable(&self, token: &CancellationToken) -> Result<B> {
    self.source.read_cancellable(token)
  }

  pub async fn read_async(&self) -> Result<B> {
    self.source.read_async().await
  }

  pub async fn read_async_cancellable(&self, token: &CancellationToken) -> Result<B> {
    self.source.read_async_cancellable(token).await
  }

  pub fn iter(&self) -> Iter<'_, B> {
    self.source.iter()
  }

  pub fn reduce<S, F>(&self, state: S, reducer: F) -> Result<S>
  where
    F: FnMut(S, B) -> S,
  {
    self.source.reduce(state, reducer)
  }

  pub fn reduce_cancellable<S, F>(&self, state: S, token: &CancellationToken, reducer: F) -> Result<S>
  where
    F: FnMut(S, B) -> S,
  {
    self.source.reduce_cancellable(state, token, reducer)
  }

  // --- Combinators ---

  pub fn map<C, F>(&self, f: F) -> Conduit<A, C>
  where
    C: Send + 'static,
    F: Fn(B) -> C + Send + Sync + 'static,
  {
    self.with_source(self.source.map(f))
  }

  pub fn filter<F>(&self, predicate: F) -> Conduit<A, B>
  where
    F: Fn(&B) -> bool + Send + Sync + 'static,
  {
    self.with_source(self.source.filter(predicate))
  }

  pub fn bind<C, F>(&self, f: F) -> Conduit<A, C>
  where
    C: Send + 'static,
    F: Fn(B) -> Source<C> + Send + Sync + 'static,
  {
    self.with_source(self.source.bind(f))
  }

  pub fn contramap<Z, F>(&self, f: F) -> Conduit<Z, B>
  where
    Z: Send + 'static,
    F: Fn(Z) -> A + Send + Sync + 'static,
  {
    self.with_sink(self.sink.contramap(f))
  }

  /// Replaces the source with a merge of this conduit's source and `other`.
  pub fn combine_source(&self, other: &Source<B>) -> Conduit<A, B> {
    self.with_source(self.source.combine(other))
  }

  /// Replaces the source with a biased choice of this conduit's source, then
  /// `other`.
  pub fn choose(&self, other: &Source<B>) -> Conduit<A, B> {
    self.with_source(self.source.choose(other))
  }

  /// A conduit with the same sink and `source` as its read side.
  pub fn with_source<C: Send + 'static>(&self, source: Source<C>) -> Conduit<A, C> {
    Conduit {
      sink: self.sink.clone(),
      source,
    }
  }

  /// A conduit with the same source and `sink` as its write side.
  pub fn with_sink<Z: Send + 'static>(&self, sink: Sink<Z>) -> Conduit<Z, B> {
    Conduit {
      sink,
      source: self.source.clone(),
    }
  }

  /// The read side as a `futures` stream of results.
  pub fn to_producer(&self) -> Producer<B> {
    Producer::new(self.source.clone())
  }

  /// The write side as a `futures` sink. Closing the consumer completes it.
  pub fn to_consumer(&self) -> Consumer<A> {
    SinkT::lift(self.sink.clone()).to_consumer()
  }

  /// The read side as an async-only source.
  pub fn source_t(&self) -> SourceT<B> {
    SourceT::lift(self.source.clone())
  }

  /// The write side as an async-only sink.
  pub fn sink_t(&self) -> SinkT<A> {
    SinkT::lift(self.sink.clone())
  }
}

impl<A, B> Conduit<A, B>
where
  A: Clone + Send + 'static,
  B: Send + 'static,
{
  /// Replaces the sink with a fan-out to this conduit's sink and `other`.
  pub fn combine_sink(&self, other: &Sink<A>) -> Conduit<A, B> {
    self.with_sink(self.sink.combine(other))
  }
}
