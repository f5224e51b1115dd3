// src/internal/mod.rs

pub(crate) mod blocking;
pub(crate) mod waiter;
