// src/sink/adapters.rs

//! Sinks that forward to other sinks instead of owning a channel.

use futures_util::future::{self, BoxFuture};

use super::Sink;
use crate::cancel::CancellationToken;
use crate::either::Either;
use crate::error::{Error, Result};

/// A sink built from other sinks. Implementations own no queue.
pub(crate) trait SinkAdapter<A>: Send + Sync {
  fn post_blocking(&self, value: A, token: Option<&CancellationToken>) -> Result<()>;

  fn post_async<'a>(&'a self, value: A, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<()>>;

  fn complete(&self) -> Result<()>;

  fn fail(&self, error: Error) -> Result<()>;

  fn is_closed(&self) -> bool;

  /// Short name for `Debug` output.
  fn kind(&self) -> &'static str;
}

/// Applies `f` before forwarding.
pub(crate) struct Contramap<A, B> {
  pub(crate) inner: Sink<A>,
  pub(crate) f: Box<dyn Fn(B) -> A + Send + Sync>,
}

impl<A, B> SinkAdapter<B> for Contramap<A, B>
where
  A: Send + 'static,
  B: Send + 'static,
{
  fn post_blocking(&self, value: B, token: Option<&CancellationToken>) -> Result<()> {
    self.inner.post_with((self.f)(value), token)
  }

  fn post_async<'a>(&'a self, value: B, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<()>> {
    self.inner.post_async_with((self.f)(value), token)
  }

  fn complete(&self) -> Result<()> {
    self.inner.complete()
  }

  fn fail(&self, error: Error) -> Result<()> {
    self.inner.fail(error)
  }

  fn is_closed(&self) -> bool {
    self.inner.is_closed()
  }

  fn kind(&self) -> &'static str {
    "contramap"
  }
}

/// Posts a copy of every value to both sinks.
pub(crate) struct FanOut<A> {
  pub(crate) first: Sink<A>,
  pub(crate) second: Sink<A>,
}

impl<A> SinkAdapter<A> for FanOut<A>
where
  A: Clone + Send + 'static,
{
  fn post_blocking(&self, value: A, token: Option<&CancellationToken>) -> Result<()> {
    let copy = value.clone();
    let first = self.first.post_with(copy, token);
    let second = self.second.post_with(value, token);
    Error::collect([first, second])
  }

  fn post_async<'a>(&'a self, value: A, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<()>> {
    let copy = value.clone();
    Box::pin(async move {
      let (first, second) = future::join(
        self.first.post_async_with(copy, token),
        self.second.post_async_with(value, token),
      )
      .await;
      Error::collect([first, second])
    })
  }

  fn complete(&self) -> Result<()> {
    Error::collect([self.first.complete(), self.second.complete()])
  }

  fn fail(&self, error: Error) -> Result<()> {
    Error::collect([self.first.fail(error.clone()), self.second.fail(error)])
  }

  fn is_closed(&self) -> bool {
    self.first.is_closed() && self.second.is_closed()
  }

  fn kind(&self) -> &'static str {
    "fan-out"
  }
}

/// Splits each value in two and posts the halves to their own sinks.
pub(crate) struct Split<A, B, C> {
  pub(crate) split: Box<dyn Fn(A) -> (B, C) + Send + Sync>,
  pub(crate) left: Sink<B>,
  pub(crate) right: Sink<C>,
}

impl<A, B, C> SinkAdapter<A> for Split<A, B, C>
where
  A: Send + 'static,
  B: Send + 'static,
  C: Send + 'static,
{
  fn post_blocking(&self, value: A, token: Option<&CancellationToken>) -> Result<()> {
    let (b, c) = (self.split)(value);
    let left = self.left.post_with(b, token);
    let right = self.right.post_with(c, token);
    Error::collect([left, right])
  }

  fn post_async<'a>(&'a self, value: A, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<()>> {
    let (b, c) = (self.split)(value);
    Box::pin(async move {
      let (left, right) = future::join(self.left.post_async_with(b, token), self.right.post_async_with(c, token)).await;
      Error::collect([left, right])
    })
  }

  fn complete(&self) -> Result<()> {
    Error::collect([self.left.complete(), self.right.complete()])
  }

  fn fail(&self, error: Error) -> Result<()> {
    Error::collect([self.left.fail(error.clone()), self.right.fail(error)])
  }

  fn is_closed(&self) -> bool {
    self.left.is_closed() && self.right.is_closed()
  }

  fn kind(&self) -> &'static str {
    "split"
  }
}

/// Routes each value to exactly one of two sinks.
pub(crate) struct Choose<A, B, C> {
  pub(crate) route: Box<dyn Fn(A) -> Either<B, C> + Send + Sync>,
  pub(crate) left: Sink<B>,
  pub(crate) right: Sink<C>,
}

impl<A, B, C> SinkAdapter<A> for Choose<A, B, C>
where
  A: Send + 'static,
  B: Send + 'static,
  C: Send + 'static,
{
  fn post_blocking(&self, value: A, token: Option<&CancellationToken>) -> Result<()> {
    match (self.route)(value) {
      Either::Left(b) => self.left.post_with(b, token),
      Either::Right(c) => self.right.post_with(c, token),
    }
  }

  fn post_async<'a>(&'a self, value: A, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<()>> {
    match (self.route)(value) {
      Either::Left(b) => self.left.post_async_with(b, token),
      Either::Right(c) => self.right.post_async_with(c, token),
    }
  }

  fn complete(&self) -> Result<()> {
    Error::collect([self.left.complete(), self.right.complete()])
  }

  fn fail(&self, error: Error) -> Result<()> {
    Error::collect([self.left.fail(error.clone()), self.right.fail(error)])
  }

  fn is_closed(&self) -> bool {
    self.left.is_closed() && self.right.is_closed()
  }

  fn kind(&self) -> &'static str {
    "choose"
  }
}
