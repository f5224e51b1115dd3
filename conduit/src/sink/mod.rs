// src/sink/mod.rs

//! The write endpoint of a conduit.
//!
//! A [`Sink`] is an immutable, cheaply clonable handle. It is either backed by a
//! channel, one of the two degenerate sinks ([`Sink::empty`], [`Sink::void`]),
//! or a combinator forwarding to other sinks. Combinators never create a channel
//! of their own, so a value posted through any number of them lands in the
//! underlying channels exactly once per target.
//!
//! Every write comes in a blocking form (`post`) that parks the calling thread
//! and an async form (`post_async`) that parks the task.

pub(crate) mod adapters;

use std::fmt;
use std::ops::Add;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture};

use self::adapters::{Choose, Contramap, FanOut, SinkAdapter, Split};
use crate::cancel::CancellationToken;
use crate::channel::Channel;
use crate::either::Either;
use crate::error::{Error, Result};
use crate::policy::ChannelConfig;

enum SinkRepr<A> {
  /// Never accepts a value.
  Empty,
  /// Accepts and discards everything.
  Void,
  Writer(Channel<A>),
  Adapter(Box<dyn SinkAdapter<A>>),
}

/// Write endpoint of a conduit.
pub struct Sink<A> {
  repr: Arc<SinkRepr<A>>,
}

impl<A> Clone for Sink<A> {
  fn clone(&self) -> Self {
    Sink {
      repr: Arc::clone(&self.repr),
    }
  }
}

impl<A> fmt::Debug for Sink<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &*self.repr {
      SinkRepr::Empty => f.write_str("Sink::Empty"),
      SinkRepr::Void => f.write_str("Sink::Void"),
      SinkRepr::Writer(channel) => f.debug_tuple("Sink::Writer").field(channel).finish(),
      SinkRepr::Adapter(adapter) => f.debug_tuple("Sink::Adapter").field(&adapter.kind()).finish(),
    }
  }
}

impl<A: Send + 'static> Sink<A> {
  fn from_repr(repr: SinkRepr<A>) -> Self {
    Sink { repr: Arc::new(repr) }
  }

  pub(crate) fn from_channel(channel: Channel<A>) -> Self {
    Self::from_repr(SinkRepr::Writer(channel))
  }

  /// A sink on which every post fails with [`Error::SinkFull`].
  pub fn empty() -> Self {
    Self::from_repr(SinkRepr::Empty)
  }

  /// A sink that accepts and discards every value. `complete` and `fail` are
  /// no-ops.
  pub fn void() -> Self {
    Self::from_repr(SinkRepr::Void)
  }

  pub(crate) fn post_with(&self, value: A, token: Option<&CancellationToken>) -> Result<()> {
    match &*self.repr {
      SinkRepr::Empty => Err(Error::SinkFull),
      SinkRepr::Void => Ok(()),
      SinkRepr::Writer(channel) => channel.write_blocking(value, token),
      SinkRepr::Adapter(adapter) => adapter.post_blocking(value, token),
    }
  }

  pub(crate) fn post_async_with<'a>(
    &'a self,
    value: A,
    token: Option<&'a CancellationToken>,
  ) -> BoxFuture<'a, Result<()>> {
    match &*self.repr {
      SinkRepr::Empty => Box::pin(future::ready(Err(Error::SinkFull))),
      SinkRepr::Void => Box::pin(future::ready(Ok(()))),
      SinkRepr::Writer(channel) => Box::pin(channel.write_async(value, token)),
      SinkRepr::Adapter(adapter) => adapter.post_async(value, token),
    }
  }

  /// Posts `value`, blocking the current thread while a bounded channel is
  /// full.
  ///
  /// Fails with [`Error::SinkFull`] if the channel is (or becomes) closed.
  pub fn post(&self, value: A) -> Result<()> {
    self.post_with(value, None)
  }

  /// Like [`post`](Self::post), but gives up with [`Error::Cancelled`] once
  /// `token` fires. A cancelled post never reaches the channel.
  pub fn post_cancellable(&self, value: A, token: &CancellationToken) -> Result<()> {
    self.post_with(value, Some(token))
  }

  /// Posts `value`, suspending the task while a bounded channel is full.
  pub async fn post_async(&self, value: A) -> Result<()> {
    self.post_async_with(value, None).await
  }

  pub async fn post_async_cancellable(&self, value: A, token: &CancellationToken) -> Result<()> {
    self.post_async_with(value, Some(token)).await
  }

  /// Runs `effect` and posts the value it produces. An error from the effect
  /// is returned as is and nothing is posted.
  pub fn post_m<F>(&self, effect: F) -> Result<()>
  where
    F: FnOnce() -> Result<A>,
  {
    self.post(effect()?)
  }

  /// Closes the sink. Later posts fail with [`Error::SinkFull`]; readers drain
  /// what is queued and then see the end of the stream. Idempotent.
  pub fn complete(&self) -> Result<()> {
    match &*self.repr {
      SinkRepr::Empty | SinkRepr::Void => Ok(()),
      SinkRepr::Writer(channel) => channel.complete(),
      SinkRepr::Adapter(adapter) => adapter.complete(),
    }
  }

  /// Closes the sink carrying `error`, which readers observe once the queue is
  /// drained. Idempotent; the first `complete` or `fail` wins.
  pub fn fail(&self, error: Error) -> Result<()> {
    match &*self.repr {
      SinkRepr::Empty | SinkRepr::Void => Ok(()),
      SinkRepr::Writer(channel) => channel.fail(error),
      SinkRepr::Adapter(adapter) => adapter.fail(error),
    }
  }

  /// True once no post can succeed any more. Combinators are closed when all
  /// their targets are.
  pub fn is_closed(&self) -> bool {
    match &*self.repr {
      SinkRepr::Empty => true,
      SinkRepr::Void => false,
      SinkRepr::Writer(channel) => channel.is_closed(),
      SinkRepr::Adapter(adapter) => adapter.is_closed(),
    }
  }

  /// The label of the backing channel, if this sink writes to one directly.
  pub fn label(&self) -> Option<&str> {
    match &*self.repr {
      SinkRepr::Writer(channel) => Some(channel.label()),
      _ => None,
    }
  }

  /// The configuration of the backing channel, if this sink writes to one
  /// directly.
  pub fn config(&self) -> Option<ChannelConfig> {
    match &*self.repr {
      SinkRepr::Writer(channel) => Some(channel.config()),
      _ => None,
    }
  }

  /// A sink that maps each value with `f` and posts the result here.
  pub fn contramap<B, F>(&self, f: F) -> Sink<B>
  where
    B: Send + 'static,
    F: Fn(B) -> A + Send + Sync + 'static,
  {
    Sink::from_repr(SinkRepr::Adapter(Box::new(Contramap {
      inner: self.clone(),
      f: Box::new(f),
    })))
  }

  /// Splits each value with `split` and posts the parts to `left` and `right`.
  ///
  /// Both posts are always attempted; failures are aggregated into one error.
  pub fn combine_split<B, C, F>(split: F, left: Sink<B>, right: Sink<C>) -> Sink<A>
  where
    B: Send + 'static,
    C: Send + 'static,
    F: Fn(A) -> (B, C) + Send + Sync + 'static,
  {
    Sink::from_repr(SinkRepr::Adapter(Box::new(Split {
      split: Box::new(split),
      left,
      right,
    })))
  }

  /// Posts each value to `left` or `right` depending on what `route` returns.
  pub fn choose<B, C, F>(route: F, left: Sink<B>, right: Sink<C>) -> Sink<A>
  where
    B: Send + 'static,
    C: Send + 'static,
    F: Fn(A) -> Either<B, C> + Send + Sync + 'static,
  {
    Sink::from_repr(SinkRepr::Adapter(Box::new(Choose {
      route: Box::new(route),
      left,
      right,
    })))
  }
}

impl<A: Clone + Send + 'static> Sink<A> {
  /// Fan-out: posts every value to both `self` and `other`.
  ///
  /// Both posts are always attempted. If either fails the post fails, with an
  /// [`Error::Many`] when both did. Blocking posts go to `self` first.
  pub fn combine(&self, other: &Sink<A>) -> Sink<A> {
    Sink::from_repr(SinkRepr::Adapter(Box::new(FanOut {
      first: self.clone(),
      second: other.clone(),
    })))
  }
}

impl<A: Clone + Send + 'static> Add for Sink<A> {
  type Output = Sink<A>;

  fn add(self, rhs: Sink<A>) -> Sink<A> {
    self.combine(&rhs)
  }
}

impl<A: Clone + Send + 'static> Add for &Sink<A> {
  type Output = Sink<A>;

  fn add(self, rhs: &Sink<A>) -> Sink<A> {
    self.combine(rhs)
  }
}
