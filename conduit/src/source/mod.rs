// src/source/mod.rs

//! The read endpoint of a conduit.
//!
//! A [`Source`] is an immutable, cheaply clonable handle: a channel reader, the
//! empty source, or a combinator over other sources. All variants share a
//! single primitive, `poll_read`, which never loses a value when it returns
//! `Pending`. Blocking reads drive it on the current thread and async reads
//! drive it from the task, so every combinator works in both worlds.
//!
//! Clones share the underlying queue: two clones reading concurrently each get
//! a disjoint share of the values.

pub(crate) mod adapters;

use std::fmt;
use std::ops::{Add, BitOr};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future;
use parking_lot::Mutex;

use self::adapters::{Bind, Choose, Filter, Iter as IterAdapter, Map, Merge, SourceAdapter};
use crate::cancel::{CancellationToken, Cancellable};
use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::internal::blocking;

enum SourceRepr<A> {
  /// Ended before it began.
  Empty,
  Reader(Channel<A>),
  Adapter(Box<dyn SourceAdapter<A>>),
}

/// Read endpoint of a conduit.
pub struct Source<A> {
  repr: Arc<SourceRepr<A>>,
}

impl<A> Clone for Source<A> {
  fn clone(&self) -> Self {
    Source {
      repr: Arc::clone(&self.repr),
    }
  }
}

impl<A> fmt::Debug for Source<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &*self.repr {
      SourceRepr::Empty => f.write_str("Source::Empty"),
      SourceRepr::Reader(channel) => f.debug_tuple("Source::Reader").field(channel).finish(),
      SourceRepr::Adapter(adapter) => f.debug_tuple("Source::Adapter").field(&adapter.kind()).finish(),
    }
  }
}

impl<A: Send + 'static> Source<A> {
  fn from_repr(repr: SourceRepr<A>) -> Self {
    Source { repr: Arc::new(repr) }
  }

  fn adapter(adapter: impl SourceAdapter<A> + 'static) -> Self {
    Self::from_repr(SourceRepr::Adapter(Box::new(adapter)))
  }

  pub(crate) fn from_channel(channel: Channel<A>) -> Self {
    Self::from_repr(SourceRepr::Reader(channel))
  }

  /// A source that has already ended. Reading it fails with
  /// [`Error::SourceClosed`].
  pub fn empty() -> Self {
    Self::from_repr(SourceRepr::Empty)
  }

  /// A source yielding exactly `value`, then ending.
  pub fn pure(value: A) -> Self {
    Self::from_iter(std::iter::once(value))
  }

  /// A source yielding the items of `iter` in order, then ending.
  #[allow(clippy::should_implement_trait)]
  pub fn from_iter<I>(iter: I) -> Self
  where
    I: IntoIterator<Item = A>,
    I::IntoIter: Send + 'static,
  {
    Self::adapter(IterAdapter {
      iter: Mutex::new(Box::new(iter.into_iter())),
    })
  }

  /// Polls for the next value. `Ready(Ok(None))` is a clean end of stream.
  ///
  /// Registers `cx`'s waker when nothing is available yet. Dropping the poll
  /// at `Pending` never loses a value.
  pub fn poll_read(&self, cx: &mut Context<'_>) -> Poll<Result<Option<A>>> {
    match &*self.repr {
      SourceRepr::Empty => Poll::Ready(Ok(None)),
      SourceRepr::Reader(channel) => channel.poll_read(cx),
      SourceRepr::Adapter(adapter) => adapter.poll_read(cx),
    }
  }

  pub(crate) fn read_next(&self, token: Option<&CancellationToken>) -> Result<Option<A>> {
    match &*self.repr {
      SourceRepr::Empty => Ok(None),
      SourceRepr::Reader(channel) => channel.read_blocking(token),
      SourceRepr::Adapter(adapter) => blocking::block_on_poll(token, |cx| adapter.poll_read(cx)),
    }
  }

  pub(crate) async fn read_next_async(&self, token: Option<&CancellationToken>) -> Result<Option<A>> {
    match &*self.repr {
      SourceRepr::Reader(channel) => channel.read_async(token).await,
      _ => Cancellable::new(Box::pin(future::poll_fn(|cx| self.poll_read(cx))), token).await,
    }
  }

  /// Reads the next value, blocking the current thread until one is available.
  ///
  /// Fails with [`Error::SourceClosed`] once the source has ended, or with the
  /// error the paired sink failed with.
  pub fn read(&self) -> Result<A> {
    self.read_next(None)?.ok_or(Error::SourceClosed)
  }

  /// Like [`read`](Self::read), but gives up with [`Error::Cancelled`] once
  /// `token` fires.
  pub fn read_cancellable(&self, token: &CancellationToken) -> Result<A> {
    self.read_next(Some(token))?.ok_or(Error::SourceClosed)
  }

  pub async fn read_async(&self) -> Result<A> {
    self.read_next_async(None).await?.ok_or(Error::SourceClosed)
  }

  pub async fn read_async_cancellable(&self, token: &CancellationToken) -> Result<A> {
    self.read_next_async(Some(token)).await?.ok_or(Error::SourceClosed)
  }

  /// A blocking iterator over the remaining values.
  ///
  /// Ends after the last value of a completed source. A failed source yields
  /// its error once and then ends.
  pub fn iter(&self) -> Iter<'_, A> {
    Iter {
      source: self,
      done: false,
    }
  }

  /// Folds every remaining value into `state`, blocking until the source ends.
  pub fn reduce<S, F>(&self, state: S, reducer: F) -> Result<S>
  where
    F: FnMut(S, A) -> S,
  {
    self.reduce_with(state, None, reducer)
  }

  /// Like [`reduce`](Self::reduce); fails with [`Error::Cancelled`] once `token`
  /// fires, discarding the partial state.
  pub fn reduce_cancellable<S, F>(&self, state: S, token: &CancellationToken, reducer: F) -> Result<S>
  where
    F: FnMut(S, A) -> S,
  {
    self.reduce_with(state, Some(token), reducer)
  }

  fn reduce_with<S, F>(&self, mut state: S, token: Option<&CancellationToken>, mut reducer: F) -> Result<S>
  where
    F: FnMut(S, A) -> S,
  {
    while let Some(value) = self.read_next(token)? {
      state = reducer(state, value);
    }
    Ok(state)
  }

  /// The label of the backing channel, if this source reads one directly.
  pub fn label(&self) -> Option<&str> {
    match &*self.repr {
      SourceRepr::Reader(channel) => Some(channel.label()),
      _ => None,
    }
  }

  /// Number of values waiting in the backing channel, if this source reads
  /// one directly.
  pub fn queued(&self) -> Option<usize> {
    match &*self.repr {
      SourceRepr::Reader(channel) => Some(channel.len()),
      _ => None,
    }
  }

  /// A source yielding `f(value)` for every value read from here.
  pub fn map<B, F>(&self, f: F) -> Source<B>
  where
    B: Send + 'static,
    F: Fn(A) -> B + Send + Sync + 'static,
  {
    Source::adapter(Map {
      inner: self.clone(),
      f: Box::new(f),
    })
  }

  /// A source yielding only the values `predicate` accepts. Rejected values are
  /// consumed and dropped.
  pub fn filter<F>(&self, predicate: F) -> Source<A>
  where
    F: Fn(&A) -> bool + Send + Sync + 'static,
  {
    Source::adapter(Filter {
      inner: self.clone(),
      predicate: Box::new(predicate),
    })
  }

  /// Concat-map: every value read from here is turned into a source by `f`,
  /// which is drained completely before the next value is read.
  pub fn bind<B, F>(&self, f: F) -> Source<B>
  where
    B: Send + 'static,
    F: Fn(A) -> Source<B> + Send + Sync + 'static,
  {
    Source::adapter(Bind {
      outer: self.clone(),
      f: Box::new(f),
      current: Mutex::new(None),
    })
  }

  /// Merges two sources: values are yielded as they become available on
  /// either side, every value exactly once. Ends once both sides have ended.
  ///
  /// The merge is fair: successive reads alternate which side is asked first.
  pub fn combine(&self, other: &Source<A>) -> Source<A> {
    Source::adapter(Merge::new(self.clone(), other.clone()))
  }

  /// Reads from `self` first and falls back to `other`.
  ///
  /// A value in `self` always wins. While `self` is empty but open, a value
  /// or failure already waiting in `other` is returned. Once `self` has ended, reads go to
  /// `other`; once both have ended, `read` fails with [`Error::SourceClosed`].
  pub fn choose(&self, other: &Source<A>) -> Source<A> {
    Source::adapter(Choose {
      first: self.clone(),
      second: other.clone(),
      first_done: AtomicBool::new(false),
    })
  }
}

impl<A: Send + 'static> Add for Source<A> {
  type Output = Source<A>;

  fn add(self, rhs: Source<A>) -> Source<A> {
    self.combine(&rhs)
  }
}

impl<A: Send + 'static> Add for &Source<A> {
  type Output = Source<A>;

  fn add(self, rhs: &Source<A>) -> Source<A> {
    self.combine(rhs)
  }
}

impl<A: Send + 'static> BitOr for Source<A> {
  type Output = Source<A>;

  fn bitor(self, rhs: Source<A>) -> Source<A> {
    self.choose(&rhs)
  }
}

impl<A: Send + 'static> BitOr for &Source<A> {
  type Output = Source<A>;

  fn bitor(self, rhs: &Source<A>) -> Source<A> {
    self.choose(rhs)
  }
}

/// Blocking iterator returned by [`Source::iter`].
#[derive(Debug)]
pub struct Iter<'a, A> {
  source: &'a Source<A>,
  done: bool,
}

impl<A: Send + 'static> Iterator for Iter<'_, A> {
  type Item = Result<A>;

  fn next(&mut self) -> Option<Result<A>> {
    if self.done {
      return None;
    }
    match self.source.read_next(None) {
      Ok(Some(value)) => Some(Ok(value)),
      Ok(None) => {
        self.done = true;
        None
      }
      Err(error) => {
        self.done = true;
        Some(Err(error))
      }
    }
  }
}

impl<'a, A: Send + 'static> IntoIterator for &'a Source<A> {
  type Item = Result<A>;
  type IntoIter = Iter<'a, A>;

  fn into_iter(self) -> Iter<'a, A> {
    self.iter()
  }
}
