// src/transformer/sink_t.rs

//! An async-only write endpoint whose steps may await other work.

use std::fmt;
use std::future::Future;
use std::ops::Add;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture};

use super::transducer::Transducer;
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::pipe::Consumer;
use crate::sink::Sink;

pub(crate) trait SinkTImpl<A>: Send + Sync {
  fn post<'a>(&'a self, value: A, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<()>>;

  fn complete(&self) -> Result<()>;

  fn fail(&self, error: Error) -> Result<()>;
}

/// Async write endpoint.
///
/// Built by lifting a [`Sink`] and layering effectful steps on top with
/// [`contramap_m`](SinkT::contramap_m) or [`transduce`](SinkT::transduce).
pub struct SinkT<A> {
  inner: Arc<dyn SinkTImpl<A>>,
}

impl<A> Clone for SinkT<A> {
  fn clone(&self) -> Self {
    SinkT {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<A> fmt::Debug for SinkT<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("SinkT")
  }
}

struct Lifted<A>(Sink<A>);

impl<A: Send + 'static> SinkTImpl<A> for Lifted<A> {
  fn post<'a>(&'a self, value: A, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<()>> {
    self.0.post_async_with(value, token)
  }

  fn complete(&self) -> Result<()> {
    self.0.complete()
  }

  fn fail(&self, error: Error) -> Result<()> {
    self.0.fail(error)
  }
}

struct Transduced<A, B> {
  inner: SinkT<B>,
  transducer: Transducer<A, B>,
}

impl<A, B> SinkTImpl<A> for Transduced<A, B>
where
  A: Send + 'static,
  B: Send + 'static,
{
  fn post<'a>(&'a self, value: A, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
      match self.transducer.apply(value).await? {
        Some(mapped) => self.inner.inner.post(mapped, token).await,
        None => Ok(()),
      }
    })
  }

  fn complete(&self) -> Result<()> {
    self.inner.complete()
  }

  fn fail(&self, error: Error) -> Result<()> {
    self.inner.fail(error)
  }
}

struct Joined<A> {
  first: SinkT<A>,
  second: SinkT<A>,
}

impl<A: Clone + Send + 'static> SinkTImpl<A> for Joined<A> {
  fn post<'a>(&'a self, value: A, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<()>> {
    let copy = value.clone();
    Box::pin(async move {
      let (first, second) = future::join(self.first.inner.post(copy, token), self.second.inner.post(value, token)).await;
      Error::collect([first, second])
    })
  }

  fn complete(&self) -> Result<()> {
    Error::collect([self.first.complete(), self.second.complete()])
  }

  fn fail(&self, error: Error) -> Result<()> {
    Error::collect([self.first.fail(error.clone()), self.second.fail(error)])
  }
}

impl<A: Send + 'static> SinkT<A> {
  fn from_impl(inner: impl SinkTImpl<A> + 'static) -> Self {
    SinkT { inner: Arc::new(inner) }
  }

  /// Lifts a plain sink. Posts suspend the task instead of the thread.
  pub fn lift(sink: Sink<A>) -> Self {
    Self::from_impl(Lifted(sink))
  }

  /// Every post fails with [`Error::SinkFull`].
  pub fn empty() -> Self {
    Self::lift(Sink::empty())
  }

  /// Every post succeeds and is discarded.
  pub fn void() -> Self {
    Self::lift(Sink::void())
  }

  pub async fn post(&self, value: A) -> Result<()> {
    self.inner.post(value, None).await
  }

  /// Like [`post`](Self::post); resolves to [`Error::Cancelled`] if `token`
  /// fires while the post is waiting for space.
  pub async fn post_cancellable(&self, value: A, token: &CancellationToken) -> Result<()> {
    self.inner.post(value, Some(token)).await
  }

  /// Awaits `effect` and posts its value. An error from the effect is returned
  /// and nothing is posted.
  pub async fn post_m<Fut>(&self, effect: Fut) -> Result<()>
  where
    Fut: Future<Output = Result<A>>,
  {
    let value = effect.await?;
    self.post(value).await
  }

  pub fn complete(&self) -> Result<()> {
    self.inner.complete()
  }

  pub fn fail(&self, error: Error) -> Result<()> {
    self.inner.fail(error)
  }

  /// Routes every posted value through `transducer` first. Items the
  /// transducer drops are acknowledged without being posted.
  pub fn transduce<Z: Send + 'static>(&self, transducer: Transducer<Z, A>) -> SinkT<Z> {
    SinkT::from_impl(Transduced {
      inner: self.clone(),
      transducer,
    })
  }

  pub fn contramap<Z, F>(&self, f: F) -> SinkT<Z>
  where
    Z: Send + 'static,
    F: Fn(Z) -> A + Send + Sync + 'static,
  {
    self.transduce(Transducer::map(f))
  }

  /// Awaits `f(value)` and posts the result.
  pub fn contramap_m<Z, F, Fut>(&self, f: F) -> SinkT<Z>
  where
    Z: Send + 'static,
    F: Fn(Z) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<A>> + Send + 'static,
  {
    self.transduce(Transducer::map_m(f))
  }

  /// Adapts this sink into a `futures::Sink`.
  pub fn to_consumer(&self) -> Consumer<A> {
    Consumer::new(self.clone())
  }
}

impl<A: Clone + Send + 'static> SinkT<A> {
  /// Fan-out: both posts run concurrently; failures are aggregated.
  pub fn combine(&self, other: &SinkT<A>) -> SinkT<A> {
    SinkT::from_impl(Joined {
      first: self.clone(),
      second: other.clone(),
    })
  }
}

impl<A: Clone + Send + 'static> Add for SinkT<A> {
  type Output = SinkT<A>;

  fn add(self, rhs: SinkT<A>) -> SinkT<A> {
    self.combine(&rhs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::conduit::spawn;

  #[tokio::test]
  async fn contramap_m_runs_effect_before_posting() {
    let conduit = spawn::<String>("sink-t");
    let sink = SinkT::lift(conduit.sink().clone()).contramap_m(|n: u32| async move { Ok(format!("#{n}")) });
    sink.post(7).await.unwrap();
    assert_eq!(conduit.read_async().await, Ok("#7".to_string()));
  }

  #[tokio::test]
  async fn dropped_items_are_acknowledged() {
    let conduit = spawn::<u32>("sink-t-filter");
    let sink = SinkT::lift(conduit.sink().clone()).transduce(Transducer::filter(|n: &u32| *n > 10));
    sink.post(1).await.unwrap();
    sink.post(11).await.unwrap();
    sink.complete().unwrap();
    assert_eq!(conduit.read_async().await, Ok(11));
    assert_eq!(conduit.read_async().await, Err(Error::SourceClosed));
  }

  #[tokio::test]
  async fn post_m_and_join() {
    let a = spawn::<u8>("a");
    let b = spawn::<u8>("b");
    let both = SinkT::lift(a.sink().clone()) + SinkT::lift(b.sink().clone());
    both.post_m(async { Ok(4) }).await.unwrap();
    assert_eq!(both.post_m(async { Err(Error::msg("nope")) }).await, Err(Error::msg("nope")));
    assert_eq!(a.read_async().await, Ok(4));
    assert_eq!(b.read_async().await, Ok(4));

    b.complete().unwrap();
    assert_eq!(both.post(5).await, Err(Error::SinkFull));
    assert_eq!(SinkT::<u8>::empty().post(1).await, Err(Error::SinkFull));
    assert_eq!(SinkT::<u8>::void().post(1).await, Ok(()));
  }
}
