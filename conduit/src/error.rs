// src/error.rs

use std::fmt;
use std::sync::Arc;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything a sink, source or conduit operation can fail with.
///
/// Errors are cheap to clone: a failure carried by [`Sink::fail`](crate::Sink::fail)
/// is handed to every reader of the paired source, so the carried value lives
/// behind an `Arc`.
#[derive(Clone, thiserror::Error)]
pub enum Error {
  /// A post was attempted on a sink whose channel is closed, or on a sink that
  /// can never accept values.
  #[error("sink is full or closed")]
  SinkFull,
  /// A read was attempted on a source that is exhausted and has no fallback.
  #[error("source is closed")]
  SourceClosed,
  /// A cancellation token fired while the operation was waiting.
  #[error("operation cancelled")]
  Cancelled,
  /// An application error, usually supplied through `fail`.
  #[error("{0}")]
  Custom(Arc<dyn std::error::Error + Send + Sync + 'static>),
  /// Several independent failures, e.g. from a fan-out post.
  #[error("{}", join_messages(.0))]
  Many(Vec<Error>),
}

fn join_messages(errors: &[Error]) -> String {
  let parts: Vec<String> = errors.iter().map(ToString::to_string).collect();
  format!("multiple errors: [{}]", parts.join("; "))
}

/// A plain message used by [`Error::msg`].
#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl std::error::Error for Message {}

impl Error {
  /// Wraps an arbitrary error value.
  pub fn custom<E>(error: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Custom(Arc::new(error))
  }

  /// Creates an application error from a message.
  pub fn msg(message: impl Into<String>) -> Self {
    Error::Custom(Arc::new(Message(message.into())))
  }

  /// Folds a list of errors into one.
  ///
  /// Returns `None` for an empty list, the error itself for a single entry, and
  /// a flattened [`Error::Many`] otherwise.
  pub fn many(errors: impl IntoIterator<Item = Error>) -> Option<Error> {
    let mut flat = Vec::new();
    for error in errors {
      match error {
        Error::Many(inner) => flat.extend(inner),
        other => flat.push(other),
      }
    }
    match flat.len() {
      0 => None,
      1 => flat.pop(),
      _ => Some(Error::Many(flat)),
    }
  }

  /// Turns the results of several independent operations into one result.
  pub(crate) fn collect(results: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    match Error::many(results.into_iter().filter_map(Result::err)) {
      Some(error) => Err(error),
      None => Ok(()),
    }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, Error::Cancelled)
  }

  pub fn is_sink_full(&self) -> bool {
    matches!(self, Error::SinkFull)
  }

  pub fn is_source_closed(&self) -> bool {
    matches!(self, Error::SourceClosed)
  }

  /// The individual errors, one entry for anything but [`Error::Many`].
  pub fn errors(&self) -> Vec<&Error> {
    match self {
      Error::Many(inner) => inner.iter().collect(),
      other => vec![other],
    }
  }
}

impl fmt::Debug for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::SinkFull => f.write_str("SinkFull"),
      Error::SourceClosed => f.write_str("SourceClosed"),
      Error::Cancelled => f.write_str("Cancelled"),
      Error::Custom(inner) => f.debug_tuple("Custom").field(&inner.to_string()).finish(),
      Error::Many(inner) => f.debug_tuple("Many").field(inner).finish(),
    }
  }
}

// Custom errors compare by identity first, then by message.
impl PartialEq for Error {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Error::SinkFull, Error::SinkFull)
      | (Error::SourceClosed, Error::SourceClosed)
      | (Error::Cancelled, Error::Cancelled) => true,
      (Error::Custom(a), Error::Custom(b)) => Arc::ptr_eq(a, b) || a.to_string() == b.to_string(),
      (Error::Many(a), Error::Many(b)) => a == b,
      _ => false,
    }
  }
}

/// Result of a non-blocking write attempt on the channel core. The rejected
/// item is handed back so the caller can park and retry.
pub(crate) enum TryWriteError<A> {
  Full(A),
  Closed(A),
}

impl<A> fmt::Debug for TryWriteError<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TryWriteError::Full(_) => write!(f, "TryWriteError::Full(..)"),
      TryWriteError::Closed(_) => write!(f, "TryWriteError::Closed(..)"),
    }
  }
}

/// Result of a non-blocking read attempt on the channel core.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TryReadError {
  /// Nothing queued, writers may still post.
  Empty,
  /// Nothing queued and the writer half completed cleanly.
  Completed,
  /// Nothing queued and the writer half failed with this error.
  Failed(Error),
}
