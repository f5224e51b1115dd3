// src/policy.rs

//! Buffer policies: how much a channel holds and what happens when it is full.
//!
//! Every [`BufferPolicy`] maps onto exactly one [`ChannelConfig`], a capacity plus a
//! [`FullMode`]. The mapping is an exhaustive `match`; there is no fallback arm.
//!
//! | Policy          | Capacity  | When full                          |
//! |-----------------|-----------|------------------------------------|
//! | `Unbounded`     | none      | never full                         |
//! | `Bounded(n)`    | `n`       | writer waits                       |
//! | `Single`        | 1         | writer waits                       |
//! | `Latest(seed)`  | 1         | oldest evicted, seeded with `seed` |
//! | `Newest(n)`     | `n`       | oldest evicted                     |
//! | `New`           | 1         | oldest evicted                     |

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Capacity and overflow behaviour of a conduit's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BufferPolicy<A> {
  /// No capacity limit. Writes never wait.
  Unbounded,
  /// At most `n` queued values; writers wait for space.
  Bounded(usize),
  /// One slot; writers wait until it is consumed.
  Single,
  /// One slot, pre-seeded. A write to a full slot replaces its value, so readers
  /// always see the most recent write.
  Latest(A),
  /// At most `n` queued values; overflow evicts the oldest unread ones.
  Newest(usize),
  /// One slot, replaced on overflow. Like `Latest` without a seed.
  New,
}

impl<A> Default for BufferPolicy<A> {
  fn default() -> Self {
    BufferPolicy::Unbounded
  }
}

/// What a write does when the channel is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullMode {
  /// The writer parks until a reader frees a slot.
  Wait,
  /// The oldest queued value is evicted to admit the new one.
  DropOldest,
}

/// The concrete shape a policy resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
  /// `None` for unbounded channels.
  pub capacity: Option<usize>,
  pub full_mode: FullMode,
}

impl ChannelConfig {
  #[inline]
  pub(crate) fn has_room(&self, len: usize) -> bool {
    match self.capacity {
      None => true,
      Some(capacity) => len < capacity,
    }
  }
}

impl<A> BufferPolicy<A> {
  /// The channel configuration this policy describes.
  ///
  /// # Panics
  ///
  /// Panics if a `Bounded` or `Newest` policy has a capacity of zero.
  pub fn config(&self) -> ChannelConfig {
    match self {
      BufferPolicy::Unbounded => ChannelConfig {
        capacity: None,
        full_mode: FullMode::Wait,
      },
      BufferPolicy::Bounded(size) => ChannelConfig {
        capacity: Some(non_zero(*size, "Bounded")),
        full_mode: FullMode::Wait,
      },
      BufferPolicy::Single => ChannelConfig {
        capacity: Some(1),
        full_mode: FullMode::Wait,
      },
      BufferPolicy::Latest(_) => ChannelConfig {
        capacity: Some(1),
        full_mode: FullMode::DropOldest,
      },
      BufferPolicy::Newest(size) => ChannelConfig {
        capacity: Some(non_zero(*size, "Newest")),
        full_mode: FullMode::DropOldest,
      },
      BufferPolicy::New => ChannelConfig {
        capacity: Some(1),
        full_mode: FullMode::DropOldest,
      },
    }
  }

  /// Splits the policy into its configuration and the value the channel must be
  /// seeded with, if any.
  pub(crate) fn into_parts(self) -> (ChannelConfig, Option<A>) {
    let config = self.config();
    match self {
      BufferPolicy::Latest(initial) => (config, Some(initial)),
      _ => (config, None),
    }
  }
}

fn non_zero(size: usize, policy: &str) -> usize {
  assert!(size > 0, "BufferPolicy::{policy} requires a capacity greater than zero");
  size
}
