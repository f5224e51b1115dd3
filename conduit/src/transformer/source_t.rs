// src/transformer/source_t.rs

//! An async-only read endpoint whose steps may await other work.

use std::fmt;
use std::future::Future;
use std::ops::{Add, BitOr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture};
use parking_lot::Mutex;

use super::transducer::Transducer;
use crate::cancel::{CancellationToken, Cancellable};
use crate::error::{Error, Result};
use crate::pipe::Producer;
use crate::source::Source;

pub(crate) trait SourceTImpl<A>: Send + Sync {
  /// `Ok(None)` is a clean end of stream.
  fn read<'a>(&'a self, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<Option<A>>>;
}

/// Async read endpoint.
///
/// Built by lifting a [`Source`] and layering effectful steps on top with
/// [`map_m`](SourceT::map_m) or [`transduce`](SourceT::transduce).
pub struct SourceT<A> {
  inner: Arc<dyn SourceTImpl<A>>,
}

impl<A> Clone for SourceT<A> {
  fn clone(&self) -> Self {
    SourceT {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<A> fmt::Debug for SourceT<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("SourceT")
  }
}

struct Lifted<A>(Source<A>);

impl<A: Send + 'static> SourceTImpl<A> for Lifted<A> {
  fn read<'a>(&'a self, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<Option<A>>> {
    Box::pin(self.0.read_next_async(token))
  }
}

struct Transduced<A, B> {
  inner: SourceT<A>,
  transducer: Transducer<A, B>,
}

impl<A, B> SourceTImpl<B> for Transduced<A, B>
where
  A: Send + 'static,
  B: Send + 'static,
{
  fn read<'a>(&'a self, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<Option<B>>> {
    Box::pin(async move {
      while let Some(value) = self.inner.read_next(token).await? {
        if let Some(mapped) = self.transducer.apply(value).await? {
          return Ok(Some(mapped));
        }
      }
      Ok(None)
    })
  }
}

/// One input of a merge or choice, with the read that is currently in flight.
///
/// Keeping the read alive between polls means a value is never pulled from an
/// input and then lost because the outer read was dropped or cancelled.
enum Slot<A> {
  Idle,
  Reading(BoxFuture<'static, Result<Option<A>>>),
  Done,
}

struct Input<A> {
  source: SourceT<A>,
  slot: Mutex<Slot<A>>,
}

impl<A: Send + 'static> Input<A> {
  fn new(source: SourceT<A>) -> Self {
    Input {
      source,
      slot: Mutex::new(Slot::Idle),
    }
  }

  fn poll_next(&self, cx: &mut Context<'_>) -> Poll<Result<Option<A>>> {
    let mut slot = self.slot.lock();
    if let Slot::Idle = *slot {
      let source = self.source.clone();
      *slot = Slot::Reading(Box::pin(async move { source.read_next(None).await }));
    }
    let Slot::Reading(read) = &mut *slot else {
      return Poll::Ready(Ok(None));
    };
    match read.as_mut().poll(cx) {
      Poll::Pending => Poll::Pending,
      Poll::Ready(Ok(None)) => {
        *slot = Slot::Done;
        Poll::Ready(Ok(None))
      }
      // A failure is not terminal for the slot: the next read asks the input
      // again, which reports the same failure for a failed channel.
      Poll::Ready(ready) => {
        *slot = Slot::Idle;
        Poll::Ready(ready)
      }
    }
  }
}

/// Fair merge, same rotation as the blocking merge.
struct MergeT<A> {
  inputs: [Input<A>; 2],
  next: AtomicUsize,
}

impl<A: Send + 'static> MergeT<A> {
  fn poll_merge(&self, cx: &mut Context<'_>) -> Poll<Result<Option<A>>> {
    let start = self.next.fetch_add(1, Ordering::Relaxed);
    let mut ended = 0;
    for offset in 0..2 {
      match self.inputs[(start + offset) % 2].poll_next(cx) {
        Poll::Ready(Ok(None)) => ended += 1,
        Poll::Ready(ready) => return Poll::Ready(ready),
        Poll::Pending => {}
      }
    }
    if ended == 2 {
      Poll::Ready(Ok(None))
    } else {
      Poll::Pending
    }
  }
}

impl<A: Send + 'static> SourceTImpl<A> for MergeT<A> {
  fn read<'a>(&'a self, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<Option<A>>> {
    Box::pin(Cancellable::new(
      Box::pin(future::poll_fn(move |cx| self.poll_merge(cx))),
      token,
    ))
  }
}

/// Biased choice, same rules as the blocking choice.
struct ChooseT<A> {
  first: Input<A>,
  second: Input<A>,
  first_done: AtomicBool,
}

impl<A: Send + 'static> ChooseT<A> {
  fn poll_choose(&self, cx: &mut Context<'_>) -> Poll<Result<Option<A>>> {
    if !self.first_done.load(Ordering::Acquire) {
      match self.first.poll_next(cx) {
        Poll::Ready(Ok(None)) => self.first_done.store(true, Ordering::Release),
        Poll::Ready(ready) => return Poll::Ready(ready),
        Poll::Pending => {
          // A transducer failure belongs to one item, so it is returned now
          // rather than skipped.
          return match self.second.poll_next(cx) {
            Poll::Ready(Ok(None)) => Poll::Pending,
            other => other,
          };
        }
      }
    }
    self.second.poll_next(cx)
  }
}

impl<A: Send + 'static> SourceTImpl<A> for ChooseT<A> {
  fn read<'a>(&'a self, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<Option<A>>> {
    Box::pin(Cancellable::new(
      Box::pin(future::poll_fn(move |cx| self.poll_choose(cx))),
      token,
    ))
  }
}

impl<A: Send + 'static> SourceT<A> {
  fn from_impl(inner: impl SourceTImpl<A> + 'static) -> Self {
    SourceT { inner: Arc::new(inner) }
  }

  /// Lifts a plain source. Reads suspend the task instead of the thread.
  pub fn lift(source: Source<A>) -> Self {
    Self::from_impl(Lifted(source))
  }

  /// A source that has already ended.
  pub fn empty() -> Self {
    Self::lift(Source::empty())
  }

  pub fn pure(value: A) -> Self {
    Self::lift(Source::pure(value))
  }

  pub(crate) fn read_next<'a>(&'a self, token: Option<&'a CancellationToken>) -> BoxFuture<'a, Result<Option<A>>> {
    self.inner.read(token)
  }

  /// Reads the next value. Fails with [`Error::SourceClosed`] once the source
  /// has ended.
  pub async fn read(&self) -> Result<A> {
    self.read_next(None).await?.ok_or(Error::SourceClosed)
  }

  pub async fn read_cancellable(&self, token: &CancellationToken) -> Result<A> {
    self.read_next(Some(token)).await?.ok_or(Error::SourceClosed)
  }

  /// Folds every remaining value into `state` until the source ends.
  pub async fn reduce<S, F>(&self, mut state: S, mut reducer: F) -> Result<S>
  where
    F: FnMut(S, A) -> S,
  {
    while let Some(value) = self.read_next(None).await? {
      state = reducer(state, value);
    }
    Ok(state)
  }

  /// Routes every value read through `transducer`. Items it drops are skipped.
  pub fn transduce<B: Send + 'static>(&self, transducer: Transducer<A, B>) -> SourceT<B> {
    SourceT::from_impl(Transduced {
      inner: self.clone(),
      transducer,
    })
  }

  pub fn map<B, F>(&self, f: F) -> SourceT<B>
  where
    B: Send + 'static,
    F: Fn(A) -> B + Send + Sync + 'static,
  {
    self.transduce(Transducer::map(f))
  }

  /// Awaits `f(value)` for every value read.
  pub fn map_m<B, F, Fut>(&self, f: F) -> SourceT<B>
  where
    B: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<B>> + Send + 'static,
  {
    self.transduce(Transducer::map_m(f))
  }

  pub fn filter<F>(&self, predicate: F) -> SourceT<A>
  where
    F: Fn(&A) -> bool + Send + Sync + 'static,
  {
    self.transduce(Transducer::filter(predicate))
  }

  /// Fair merge of two sources; ends once both have ended.
  pub fn combine(&self, other: &SourceT<A>) -> SourceT<A> {
    SourceT::from_impl(MergeT {
      inputs: [Input::new(self.clone()), Input::new(other.clone())],
      next: AtomicUsize::new(0),
    })
  }

  /// Biased choice: `self` first, `other` as the fallback.
  pub fn choose(&self, other: &SourceT<A>) -> SourceT<A> {
    SourceT::from_impl(ChooseT {
      first: Input::new(self.clone()),
      second: Input::new(other.clone()),
      first_done: AtomicBool::new(false),
    })
  }

  /// Adapts this source into a `futures::Stream`.
  pub fn to_producer(&self) -> Producer<A> {
    Producer::from_source_t(self.clone())
  }
}

impl<A: Send + 'static> Add for SourceT<A> {
  type Output = SourceT<A>;

  fn add(self, rhs: SourceT<A>) -> SourceT<A> {
    self.combine(&rhs)
  }
}

impl<A: Send + 'static> BitOr for SourceT<A> {
  type Output = SourceT<A>;

  fn bitor(self, rhs: SourceT<A>) -> SourceT<A> {
    self.choose(&rhs)
  }
}
