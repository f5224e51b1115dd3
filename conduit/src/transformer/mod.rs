// src/transformer/mod.rs

//! Async-only endpoints with effectful steps.
//!
//! [`SinkT`], [`SourceT`] and [`ConduitT`] mirror the blocking family but
//! every operation is a future, and values can be routed through
//! [`Transducer`]s that await other work (lookups, retries, timeouts) on the
//! way in or out.

pub mod conduit_t;
pub mod sink_t;
pub mod source_t;
pub mod transducer;

pub use conduit_t::ConduitT;
pub use sink_t::SinkT;
pub use source_t::SourceT;
pub use transducer::Transducer;
