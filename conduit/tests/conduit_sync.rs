mod common;
use common::*;

use fibre_conduit::{spawn, spawn_with, BufferPolicy, CancellationToken, Error, Sink, Source};

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

// --- Helper Function for Sync MPMC Conduit Tests ---
fn run_sync_conduit_test(num_producers: usize, num_consumers: usize, items_per_producer: usize, policy: BufferPolicy<usize>) {
  let conduit = spawn_with(policy, "mpmc-sync");
  let total_items_expected = num_producers * items_per_producer;
  let received_items_set = Arc::new(std::sync::Mutex::new(HashSet::new()));
  let received_count = Arc::new(AtomicUsize::new(0));

  // --- Spawn Consumers ---
  let mut consumer_handles = Vec::new();
  for _ in 0..num_consumers {
    let source = conduit.source().clone();
    let received_set_clone = Arc::clone(&received_items_set);
    let received_count_clone = Arc::clone(&received_count);

    consumer_handles.push(thread::spawn(move || {
      for item in source.iter() {
        let item = item.expect("source failed");
        assert!(received_set_clone.lock().unwrap().insert(item), "Duplicate item received!");
        received_count_clone.fetch_add(1, AtomicOrdering::Relaxed);
      }
    }));
  }

  // --- Spawn Producers ---
  let mut producer_handles = Vec::new();
  for p_id in 0..num_producers {
    let sink = conduit.sink().clone();
    producer_handles.push(thread::spawn(move || {
      for i in 0..items_per_producer {
        sink.post(p_id * items_per_producer + i).unwrap();
      }
    }));
  }

  // --- Join and Assert ---
  for handle in producer_handles {
    handle.join().expect("Producer thread panicked");
  }
  conduit.complete().unwrap();
  for handle in consumer_handles {
    handle.join().expect("Consumer thread panicked");
  }

  assert_eq!(received_count.load(AtomicOrdering::Relaxed), total_items_expected);
  assert_eq!(received_items_set.lock().unwrap().len(), total_items_expected);
}

#[test]
fn sync_1p_1c_unbounded() {
  run_sync_conduit_test(1, 1, ITEMS_HIGH, BufferPolicy::Unbounded);
}

#[test]
fn sync_mp_mc_bounded() {
  run_sync_conduit_test(4, 4, ITEMS_MEDIUM, BufferPolicy::Bounded(8));
}

#[test]
fn sync_mp_mc_single() {
  run_sync_conduit_test(3, 2, ITEMS_LOW, BufferPolicy::Single);
}

// --- Ordering ---

#[test]
fn unbounded_preserves_posting_order() {
  let conduit = spawn::<usize>("fifo");
  for i in 0..ITEMS_HIGH {
    conduit.post(i).unwrap();
  }
  conduit.complete().unwrap();
  let received: Vec<usize> = conduit.iter().collect::<Result<_, _>>().unwrap();
  assert_eq!(received, (0..ITEMS_HIGH).collect::<Vec<_>>());
}

#[test]
fn per_producer_order_is_kept_under_contention() {
  let conduit = spawn_with::<(usize, usize)>(BufferPolicy::Bounded(4), "per-producer");
  let producers: Vec<_> = (0..3)
    .map(|p_id| {
      let sink = conduit.sink().clone();
      thread::spawn(move || {
        for i in 0..ITEMS_MEDIUM {
          sink.post((p_id, i)).unwrap();
        }
      })
    })
    .collect();

  let mut next_expected = [0usize; 3];
  for _ in 0..3 * ITEMS_MEDIUM {
    let (p_id, i) = conduit.read().unwrap();
    assert_eq!(i, next_expected[p_id], "producer {p_id} out of order");
    next_expected[p_id] += 1;
  }
  for handle in producers {
    handle.join().unwrap();
  }
}

// --- Backpressure ---

#[test]
fn bounded_queue_never_exceeds_capacity() {
  const K: usize = 3;
  let conduit = spawn_with::<usize>(BufferPolicy::Bounded(K), "backpressure");
  let sink = conduit.sink().clone();
  let producer = thread::spawn(move || {
    for i in 0..ITEMS_LOW {
      sink.post(i).unwrap();
    }
    sink.complete().unwrap();
  });

  let mut received = 0;
  loop {
    thread::sleep(std::time::Duration::from_millis(1));
    assert!(conduit.source().queued().unwrap() <= K);
    match conduit.read() {
      Ok(_) => received += 1,
      Err(Error::SourceClosed) => break,
      Err(other) => panic!("unexpected error: {other}"),
    }
  }
  producer.join().unwrap();
  assert_eq!(received, ITEMS_LOW);
}

#[test]
fn post_beyond_capacity_blocks_until_drained() {
  const K: usize = 2;
  let conduit = spawn_with::<usize>(BufferPolicy::Bounded(K), "k-plus-one");
  for i in 0..K {
    conduit.post(i).unwrap();
  }

  let posted = Arc::new(AtomicUsize::new(0));
  let writer = conduit.clone();
  let posted_clone = Arc::clone(&posted);
  let handle = thread::spawn(move || {
    writer.post(K).unwrap();
    posted_clone.store(1, AtomicOrdering::SeqCst);
  });

  thread::sleep(SETTLE);
  assert_eq!(posted.load(AtomicOrdering::SeqCst), 0, "(k+1)th post did not block");
  assert_eq!(conduit.read(), Ok(0));
  handle.join().unwrap();
  assert_eq!(posted.load(AtomicOrdering::SeqCst), 1);
  assert_eq!(conduit.source().queued(), Some(K));
}

#[test]
fn bounded_one_scenario() {
  let conduit = spawn_with::<&str>(BufferPolicy::Bounded(1), "scenario");
  conduit.post("a").unwrap();

  let writer = conduit.clone();
  let blocked = thread::spawn(move || writer.post("b"));
  thread::sleep(SETTLE);
  assert!(!blocked.is_finished(), "second post should be waiting");

  assert_eq!(conduit.read(), Ok("a"));
  blocked.join().unwrap().unwrap();
  assert_eq!(conduit.read(), Ok("b"));

  conduit.complete().unwrap();
  assert_eq!(conduit.read(), Err(Error::SourceClosed));
}

// --- Drop-oldest policies ---

#[test]
fn latest_yields_seed_before_any_write() {
  let conduit = spawn_with(BufferPolicy::Latest("initial"), "latest-seed");
  assert_eq!(conduit.read(), Ok("initial"));
}

#[test]
fn latest_and_new_keep_only_last_write() {
  for policy in [BufferPolicy::Latest(0), BufferPolicy::New] {
    let conduit = spawn_with::<u32>(policy.clone(), "last-write");
    conduit.post(1).unwrap();
    conduit.post(2).unwrap();
    assert_eq!(conduit.read(), Ok(2), "{policy:?}");
    conduit.complete().unwrap();
    assert_eq!(conduit.read(), Err(Error::SourceClosed), "{policy:?}");
  }
}

#[test]
fn newest_keeps_most_recent_window() {
  let conduit = spawn_with::<usize>(BufferPolicy::Newest(4), "newest");
  for i in 0..10 {
    conduit.post(i).unwrap();
  }
  conduit.complete().unwrap();
  let kept: Vec<usize> = conduit.iter().collect::<Result<_, _>>().unwrap();
  assert_eq!(kept, vec![6, 7, 8, 9]);
}

// --- Close semantics ---

#[test]
fn post_after_complete_fails() {
  let conduit = spawn::<u8>("after-complete");
  conduit.complete().unwrap();
  conduit.complete().unwrap();
  assert_eq!(conduit.post(1), Err(Error::SinkFull));
}

#[test]
fn post_after_fail_fails_and_reader_sees_error() {
  let conduit = spawn::<u8>("after-fail");
  conduit.post(1).unwrap();
  conduit.fail(Error::msg("disk on fire")).unwrap();
  assert_eq!(conduit.post(2), Err(Error::SinkFull));

  assert_eq!(conduit.read(), Ok(1));
  assert_eq!(conduit.read(), Err(Error::msg("disk on fire")));
  assert_eq!(conduit.reduce(0, |acc, n| acc + n), Err(Error::msg("disk on fire")));
}

#[test]
fn post_racing_complete_is_never_lost() {
  for _ in 0..ITEMS_LOW {
    let conduit = spawn::<usize>("race");
    let sink = conduit.sink().clone();
    let producer = thread::spawn(move || (0..ITEMS_LOW).filter(|i| sink.post(*i).is_ok()).count());
    thread::yield_now();
    conduit.complete().unwrap();
    let accepted = producer.join().unwrap();
    let delivered = conduit.iter().filter(Result::is_ok).count();
    assert_eq!(accepted, delivered);
  }
}

#[test]
fn blocked_reader_wakes_on_complete() {
  let conduit = spawn::<u8>("wake-on-complete");
  let reader = conduit.clone();
  let handle = thread::spawn(move || reader.read());
  thread::sleep(SETTLE);
  conduit.complete().unwrap();
  assert_eq!(handle.join().unwrap(), Err(Error::SourceClosed));
}

// --- Cancellation ---

#[test]
fn cancellation_is_reported_distinctly() {
  let conduit = spawn_with::<u8>(BufferPolicy::Single, "cancel");
  conduit.post(1).unwrap();

  let token = CancellationToken::new();
  let canceller = token.clone();
  let start = Instant::now();
  let handle = thread::spawn(move || {
    thread::sleep(SETTLE);
    canceller.cancel();
  });
  assert_eq!(conduit.post_cancellable(2, &token), Err(Error::Cancelled));
  assert!(start.elapsed() < LONG_TIMEOUT);
  handle.join().unwrap();

  // The channel is untouched by the cancelled post.
  assert_eq!(conduit.read(), Ok(1));
  assert_eq!(conduit.read_cancellable(&token), Err(Error::Cancelled));
}

#[test]
fn cancel_unblocks_composite_read() {
  let left = spawn::<u8>("left");
  let right = spawn::<u8>("right");
  let merged = left.source() + right.source();

  let token = CancellationToken::new();
  let canceller = token.clone();
  let handle = thread::spawn(move || {
    thread::sleep(SETTLE);
    canceller.cancel();
  });
  assert_eq!(merged.read_cancellable(&token), Err(Error::Cancelled));
  handle.join().unwrap();

  right.post(4).unwrap();
  assert_eq!(merged.read(), Ok(4));
}

// --- Combinators ---

#[test]
fn contramap_round_trip() {
  let direct = spawn::<usize>("direct");
  let via_contramap = spawn::<usize>("contramap");
  let f = |s: String| s.len();
  let mapped: Sink<String> = via_contramap.sink().contramap(f);

  for word in ["a", "bb", "ccc"] {
    direct.post(f(word.to_string())).unwrap();
    mapped.post(word.to_string()).unwrap();
  }
  direct.complete().unwrap();
  mapped.complete().unwrap();

  let expected: Vec<usize> = direct.iter().collect::<Result<_, _>>().unwrap();
  let actual: Vec<usize> = via_contramap.iter().collect::<Result<_, _>>().unwrap();
  assert_eq!(actual, expected);
}

#[test]
fn merged_sources_deliver_everything_once_from_threads() {
  let left = spawn_with::<usize>(BufferPolicy::Bounded(4), "left");
  let right = spawn_with::<usize>(BufferPolicy::Bounded(4), "right");
  let merged = left.source() + right.source();

  let producers: Vec<_> = [(left.clone(), 0), (right.clone(), ITEMS_MEDIUM)]
    .into_iter()
    .map(|(conduit, offset)| {
      thread::spawn(move || {
        for i in 0..ITEMS_MEDIUM {
          conduit.post(offset + i).unwrap();
        }
        conduit.complete().unwrap();
      })
    })
    .collect();

  let mut seen = HashSet::new();
  for item in merged.iter() {
    assert!(seen.insert(item.unwrap()), "Duplicate item received!");
  }
  for handle in producers {
    handle.join().unwrap();
  }
  assert_eq!(seen.len(), 2 * ITEMS_MEDIUM);
}

#[test]
fn merge_keeps_draining_after_one_side_ends() {
  let short = Source::from_iter(vec![1]);
  let long = Source::from_iter(vec![10, 20, 30]);
  let total = (short + long).reduce(0, |acc, n| acc + n);
  assert_eq!(total, Ok(61));
}

#[test]
fn choose_semantics() {
  // First non-empty: its value wins and the second is untouched.
  let second = spawn::<u8>("second");
  second.post(9).unwrap();
  let chosen = Source::pure(1) | second.source().clone();
  assert_eq!(chosen.read(), Ok(1));
  assert_eq!(second.source().queued(), Some(1));

  // First exhausted: identical to reading the second.
  assert_eq!(chosen.read(), Ok(9));

  // Both exhausted.
  second.complete().unwrap();
  assert_eq!(chosen.read(), Err(Error::SourceClosed));
}

#[test]
fn composite_sources_surface_failures_while_other_side_is_idle() {
  let idle = spawn::<u32>("idle");
  let failing = spawn::<u32>("failing");
  let chosen = idle.source() | failing.source();
  let merged = idle.source() + failing.source();

  let writer = failing.clone();
  let handle = thread::spawn(move || {
    thread::sleep(SETTLE);
    writer.post(1).unwrap();
    writer.fail(Error::msg("upstream gone")).unwrap();
  });

  assert_eq!(chosen.read(), Ok(1));
  assert_eq!(chosen.read(), Err(Error::msg("upstream gone")));
  assert_eq!(merged.read(), Err(Error::msg("upstream gone")));
  handle.join().expect("Writer thread panicked");

  // The idle side still delivers once it has something.
  idle.post(2).unwrap();
  assert_eq!(chosen.read(), Ok(2));
}

#[test]
fn conduit_combinators_share_the_untouched_side() {
  let conduit = spawn::<u32>("base");
  let doubled = conduit.map(|n| n * 2).filter(|n| *n > 2);
  let expanded = conduit.bind(|n| Source::from_iter(vec![n; 2]));

  doubled.post(1).unwrap();
  doubled.post(2).unwrap();
  assert_eq!(doubled.read(), Ok(4));

  expanded.post(5).unwrap();
  assert_eq!(expanded.read(), Ok(5));
  assert_eq!(expanded.read(), Ok(5));
}

#[test]
fn fan_out_failure_is_aggregated() {
  let a = spawn::<u8>("a");
  let b = spawn::<u8>("b");
  let both = a.combine_sink(b.sink());
  a.complete().unwrap();
  b.complete().unwrap();
  let error = both.post(1).unwrap_err();
  assert_eq!(error.errors().len(), 2);
  assert!(error.errors().iter().all(|e| e.is_sink_full()));
}

#[test]
fn stress_many_producers_single_slot() {
  let start = Instant::now();
  run_sync_conduit_test(8, 8, ITEMS_MEDIUM, BufferPolicy::Single);
  assert!(start.elapsed() < STRESS_TIMEOUT, "stress run took {:?}", start.elapsed());
}

#[test]
fn short_reads_return_promptly() {
  let conduit = spawn_with::<u8>(BufferPolicy::Latest(3), "prompt");
  let start = Instant::now();
  assert_eq!(conduit.read(), Ok(3));
  assert!(start.elapsed() < SHORT_TIMEOUT);
}
