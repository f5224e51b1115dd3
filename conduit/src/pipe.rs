// src/pipe.rs

//! Adapters into the `futures` ecosystem.
//!
//! A [`Producer`] is a [`Stream`] of read results and a [`Consumer`] is a
//! `futures` [`Sink`](FuturesSink) that posts what it is sent. Together they
//! let conduits plug into `StreamExt::forward`, `SinkExt::send_all` and the
//! rest of the combinator toolkit.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::future::BoxFuture;
use futures_util::Sink as FuturesSink;

use crate::error::{Error, Result};
use crate::source::Source;
use crate::transformer::{SinkT, SourceT};

enum ProducerRepr<A> {
  Source(Source<A>),
  SourceT {
    source: SourceT<A>,
    pending: Option<BoxFuture<'static, Result<Option<A>>>>,
  },
}

/// A stream over a source. Yields `Ok` values until the source ends; a failed
/// source yields its error once and then ends.
pub struct Producer<A> {
  repr: ProducerRepr<A>,
  done: bool,
}

impl<A> fmt::Debug for Producer<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Producer").field("done", &self.done).finish()
  }
}

impl<A: Send + 'static> Producer<A> {
  pub(crate) fn new(source: Source<A>) -> Self {
    Producer {
      repr: ProducerRepr::Source(source),
      done: false,
    }
  }

  pub(crate) fn from_source_t(source: SourceT<A>) -> Self {
    Producer {
      repr: ProducerRepr::SourceT { source, pending: None },
      done: false,
    }
  }
}

impl<A: Send + 'static> Stream for Producer<A> {
  type Item = Result<A>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    if this.done {
      return Poll::Ready(None);
    }

    let polled = match &mut this.repr {
      ProducerRepr::Source(source) => source.poll_read(cx),
      ProducerRepr::SourceT { source, pending } => {
        let read = pending.get_or_insert_with(|| {
          let source = source.clone();
          Box::pin(async move { source.read_next(None).await })
        });
        let polled = read.as_mut().poll(cx);
        if polled.is_ready() {
          *pending = None;
        }
        polled
      }
    };

    match polled {
      Poll::Pending => Poll::Pending,
      Poll::Ready(Ok(Some(value))) => Poll::Ready(Some(Ok(value))),
      Poll::Ready(Ok(None)) => {
        this.done = true;
        Poll::Ready(None)
      }
      Poll::Ready(Err(error)) => {
        this.done = true;
        Poll::Ready(Some(Err(error)))
      }
    }
  }
}

/// A `futures` sink over a [`SinkT`].
///
/// One post is in flight at a time; `poll_ready` and `poll_flush` drive it.
/// `poll_close` flushes and then completes the underlying sink.
pub struct Consumer<A> {
  sink: SinkT<A>,
  pending: Option<BoxFuture<'static, Result<()>>>,
  closed: bool,
}

impl<A> fmt::Debug for Consumer<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Consumer")
      .field("in_flight", &self.pending.is_some())
      .field("closed", &self.closed)
      .finish()
  }
}

impl<A: Send + 'static> Consumer<A> {
  pub(crate) fn new(sink: SinkT<A>) -> Self {
    Consumer {
      sink,
      pending: None,
      closed: false,
    }
  }

  fn poll_pending(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
    let Some(post) = self.pending.as_mut() else {
      return Poll::Ready(Ok(()));
    };
    let result = std::task::ready!(post.as_mut().poll(cx));
    self.pending = None;
    Poll::Ready(result)
  }
}

impl<A: Send + 'static> FuturesSink<A> for Consumer<A> {
  type Error = Error;

  fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
    let this = self.get_mut();
    if this.closed {
      return Poll::Ready(Err(Error::SinkFull));
    }
    this.poll_pending(cx)
  }

  fn start_send(self: Pin<&mut Self>, item: A) -> Result<()> {
    let this = self.get_mut();
    if this.closed {
      return Err(Error::SinkFull);
    }
    let sink = this.sink.clone();
    this.pending = Some(Box::pin(async move { sink.post(item).await }));
    Ok(())
  }

  fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
    self.get_mut().poll_pending(cx)
  }

  fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
    let this = self.get_mut();
    let flushed = std::task::ready!(this.poll_pending(cx));
    if !this.closed {
      this.closed = true;
      let completed = this.sink.complete();
      return Poll::Ready(Error::collect([flushed, completed]));
    }
    Poll::Ready(flushed)
  }
}
