// src/source/adapters.rs

//! Sources computed from other sources.
//!
//! Each adapter implements `poll_read` and nothing else. An adapter must not
//! hold a value across a `Pending`: once `poll_read` returns `Pending`, every
//! value it has pulled from its inputs has already been returned or dropped on
//! purpose (filtered out).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use parking_lot::Mutex;

use super::Source;
use crate::error::Result;

pub(crate) trait SourceAdapter<A>: Send + Sync {
  /// `Ready(Ok(None))` is a clean end of stream.
  fn poll_read(&self, cx: &mut Context<'_>) -> Poll<Result<Option<A>>>;

  /// Short name for `Debug` output.
  fn kind(&self) -> &'static str;
}

pub(crate) struct Map<A, B> {
  pub(crate) inner: Source<A>,
  pub(crate) f: Box<dyn Fn(A) -> B + Send + Sync>,
}

impl<A, B> SourceAdapter<B> for Map<A, B>
where
  A: Send + 'static,
  B: Send + 'static,
{
  fn poll_read(&self, cx: &mut Context<'_>) -> Poll<Result<Option<B>>> {
    self.inner.poll_read(cx).map(|result| result.map(|next| next.map(&self.f)))
  }

  fn kind(&self) -> &'static str {
    "map"
  }
}

pub(crate) struct Filter<A> {
  pub(crate) inner: Source<A>,
  pub(crate) predicate: Box<dyn Fn(&A) -> bool + Send + Sync>,
}

impl<A> SourceAdapter<A> for Filter<A>
where
  A: Send + 'static,
{
  fn poll_read(&self, cx: &mut Context<'_>) -> Poll<Result<Option<A>>> {
    loop {
      match self.inner.poll_read(cx) {
        Poll::Ready(Ok(Some(value))) if !(self.predicate)(&value) => continue,
        other => return other,
      }
    }
  }

  fn kind(&self) -> &'static str {
    "filter"
  }
}

/// Concat-map: drains the source produced for each outer value before pulling
/// the next outer value.
pub(crate) struct Bind<A, B> {
  pub(crate) outer: Source<A>,
  pub(crate) f: Box<dyn Fn(A) -> Source<B> + Send + Sync>,
  pub(crate) current: Mutex<Option<Source<B>>>,
}

impl<A, B> SourceAdapter<B> for Bind<A, B>
where
  A: Send + 'static,
  B: Send + 'static,
{
  fn poll_read(&self, cx: &mut Context<'_>) -> Poll<Result<Option<B>>> {
    let mut current = self.current.lock();
    loop {
      if let Some(inner) = current.as_ref() {
        match inner.poll_read(cx) {
          Poll::Ready(Ok(None)) => *current = None,
          other => return other,
        }
      }

      match self.outer.poll_read(cx) {
        Poll::Ready(Ok(Some(value))) => *current = Some((self.f)(value)),
        Poll::Ready(Ok(None)) => return Poll::Ready(Ok(None)),
        Poll::Ready(Err(error)) => return Poll::Ready(Err(error)),
        Poll::Pending => return Poll::Pending,
      }
    }
  }

  fn kind(&self) -> &'static str {
    "bind"
  }
}

/// Fair merge of two sources.
///
/// Each read starts polling at the input after the one that started the
/// previous read, so a busy input cannot starve the other. The merge ends once
/// both inputs have ended; a failing input surfaces its error.
pub(crate) struct Merge<A> {
  pub(crate) inputs: [Source<A>; 2],
  pub(crate) next: AtomicUsize,
  pub(crate) done: [AtomicBool; 2],
}

impl<A> Merge<A> {
  pub(crate) fn new(first: Source<A>, second: Source<A>) -> Self {
    Merge {
      inputs: [first, second],
      next: AtomicUsize::new(0),
      done: [AtomicBool::new(false), AtomicBool::new(false)],
    }
  }
}

impl<A> SourceAdapter<A> for Merge<A>
where
  A: Send + 'static,
{
  fn poll_read(&self, cx: &mut Context<'_>) -> Poll<Result<Option<A>>> {
    let start = self.next.fetch_add(1, Ordering::Relaxed);
    for offset in 0..2 {
      let index = (start + offset) % 2;
      if self.done[index].load(Ordering::Acquire) {
        continue;
      }
      match self.inputs[index].poll_read(cx) {
        Poll::Ready(Ok(None)) => self.done[index].store(true, Ordering::Release),
        Poll::Ready(ready) => return Poll::Ready(ready),
        Poll::Pending => {}
      }
    }

    if self.done.iter().all(|done| done.load(Ordering::Acquire)) {
      Poll::Ready(Ok(None))
    } else {
      Poll::Pending
    }
  }

  fn kind(&self) -> &'static str {
    "merge"
  }
}

/// Biased choice between two sources.
///
/// The first source is always asked first. While it is open but has nothing,
/// a value (or failure) already waiting in the second source is returned
/// instead. Once the first source ends, reads go to the second for good.
pub(crate) struct Choose<A> {
  pub(crate) first: Source<A>,
  pub(crate) second: Source<A>,
  pub(crate) first_done: AtomicBool,
}

impl<A> SourceAdapter<A> for Choose<A>
where
  A: Send + 'static,
{
  fn poll_read(&self, cx: &mut Context<'_>) -> Poll<Result<Option<A>>> {
    if !self.first_done.load(Ordering::Acquire) {
      match self.first.poll_read(cx) {
        Poll::Ready(Ok(None)) => self.first_done.store(true, Ordering::Release),
        Poll::Ready(ready) => return Poll::Ready(ready),
        Poll::Pending => {
          // The fallback's values and failures pass through; its end only
          // counts once the first source has ended too.
          return match self.second.poll_read(cx) {
            Poll::Ready(Ok(None)) => Poll::Pending,
            other => other,
          };
        }
      }
    }
    self.second.poll_read(cx)
  }

  fn kind(&self) -> &'static str {
    "choose"
  }
}

/// A source backed by an iterator. Never pending.
pub(crate) struct Iter<A> {
  pub(crate) iter: Mutex<Box<dyn Iterator<Item = A> + Send>>,
}

impl<A> SourceAdapter<A> for Iter<A>
where
  A: Send + 'static,
{
  fn poll_read(&self, _cx: &mut Context<'_>) -> Poll<Result<Option<A>>> {
    Poll::Ready(Ok(self.iter.lock().next()))
  }

  fn kind(&self) -> &'static str {
    "iter"
  }
}
