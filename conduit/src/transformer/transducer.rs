// src/transformer/transducer.rs

//! Asynchronous, effectful per-item steps.
//!
//! A [`Transducer<A, B>`] turns one `A` into at most one `B`, possibly after
//! awaiting some other work. `Ok(None)` drops the item, `Err` aborts the
//! surrounding post or read with that error.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};

use crate::error::Result;

type Step<A, B> = dyn Fn(A) -> BoxFuture<'static, Result<Option<B>>> + Send + Sync;

pub struct Transducer<A, B> {
  step: Arc<Step<A, B>>,
}

impl<A, B> Clone for Transducer<A, B> {
  fn clone(&self) -> Self {
    Transducer {
      step: Arc::clone(&self.step),
    }
  }
}

impl<A, B> fmt::Debug for Transducer<A, B> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("Transducer")
  }
}

impl<A: Send + 'static> Transducer<A, A> {
  /// Passes every item through untouched.
  pub fn identity() -> Self {
    Transducer::new(|value| future::ready(Ok(Some(value))))
  }
}

impl<A, B> Transducer<A, B>
where
  A: Send + 'static,
  B: Send + 'static,
{
  /// Builds a transducer from an async step.
  pub fn new<F, Fut>(step: F) -> Self
  where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<B>>> + Send + 'static,
  {
    let step: Arc<Step<A, B>> = Arc::new(move |value: A| step(value).boxed());
    Transducer { step }
  }

  pub fn map<F>(f: F) -> Self
  where
    F: Fn(A) -> B + Send + Sync + 'static,
  {
    Transducer::new(move |value| future::ready(Ok(Some(f(value)))))
  }

  /// An effectful map: awaits `f(value)` for every item.
  pub fn map_m<F, Fut>(f: F) -> Self
  where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<B>> + Send + 'static,
  {
    Transducer::new(move |value| f(value).map(|result| result.map(Some)))
  }

  pub fn filter_map<F>(f: F) -> Self
  where
    F: Fn(A) -> Option<B> + Send + Sync + 'static,
  {
    Transducer::new(move |value| future::ready(Ok(f(value))))
  }

  /// Runs the step for one item.
  pub fn apply(&self, value: A) -> BoxFuture<'static, Result<Option<B>>> {
    (self.step)(value)
  }

  /// Feeds every item this transducer keeps into `next`.
  pub fn then<C: Send + 'static>(&self, next: Transducer<B, C>) -> Transducer<A, C> {
    let first = self.clone();
    Transducer::new(move |value| {
      let head = first.apply(value);
      let next = next.clone();
      async move {
        match head.await? {
          Some(mid) => next.apply(mid).await,
          None => Ok(None),
        }
      }
    })
  }
}

impl<A: Send + 'static> Transducer<A, A> {
  /// Keeps only the items `predicate` accepts.
  pub fn filter<F>(predicate: F) -> Self
  where
    F: Fn(&A) -> bool + Send + Sync + 'static,
  {
    Transducer::new(move |value| future::ready(Ok(predicate(&value).then_some(value))))
  }
}
