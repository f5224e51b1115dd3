#![warn(missing_debug_implementations, rust_2018_idioms)]

//! Composable sinks, sources and conduits over a policy-driven MPMC channel.
//!
//! A [`Conduit`] pairs a write endpoint ([`Sink`]) with a read endpoint
//! ([`Source`]) over one channel. The channel's [`BufferPolicy`] decides how
//! much it holds and what a write does when it is full: wait for a reader, or
//! evict the oldest value. Any number of threads or tasks may post and read
//! concurrently.
//!
//! Both endpoints are immutable handles. `contramap`, `combine` (`+`) and
//! `choose` build new sinks; `map`, `filter`, `bind`, `combine` (`+`) and
//! `choose` (`|`) build new sources. None of them add buffering.
//!
//! Every waiting operation exists in a blocking form, an async form and a
//! cancellable form taking a [`CancellationToken`]. The [`transformer`] module
//! adds the async-only [`SinkT`], [`SourceT`] and [`ConduitT`], whose values can
//! be routed through effectful [`Transducer`]s.
//!
//! ```
//! use fibre_conduit::{spawn_with, BufferPolicy, Error};
//! use std::thread;
//!
//! let conduit = spawn_with::<&str>(BufferPolicy::Bounded(1), "demo");
//! conduit.post("a").unwrap();
//!
//! let writer = conduit.clone();
//! let handle = thread::spawn(move || writer.post("b")); // waits for space
//!
//! assert_eq!(conduit.read(), Ok("a"));
//! handle.join().unwrap().unwrap();
//! assert_eq!(conduit.read(), Ok("b"));
//!
//! conduit.complete().unwrap();
//! assert_eq!(conduit.read(), Err(Error::SourceClosed));
//! assert_eq!(conduit.post("c"), Err(Error::SinkFull));
//! ```

pub mod cancel;
mod channel;
pub mod conduit;
pub mod either;
pub mod error;
mod internal;
pub mod pipe;
pub mod policy;
pub mod sink;
pub mod source;
pub mod telemetry;
pub mod transformer;

pub use cancel::CancellationToken;
pub use conduit::{spawn, spawn_with, Conduit};
pub use either::Either;
pub use error::{Error, Result};
pub use pipe::{Consumer, Producer};
pub use policy::{BufferPolicy, ChannelConfig, FullMode};
pub use sink::Sink;
pub use source::Source;
pub use transformer::{ConduitT, SinkT, SourceT, Transducer};

#[allow(dead_code)]
fn assert_send_sync<T: Send + Sync>() {}

#[allow(dead_code)]
fn endpoints_are_send_sync() {
  assert_send_sync::<Sink<u8>>();
  assert_send_sync::<Source<u8>>();
  assert_send_sync::<Conduit<u8, u8>>();
  assert_send_sync::<SinkT<u8>>();
  assert_send_sync::<SourceT<u8>>();
  assert_send_sync::<ConduitT<u8, u8, u8>>();
  assert_send_sync::<CancellationToken>();
}
