mod common;
use common::*;

use fibre_conduit::{spawn, spawn_with, BufferPolicy, CancellationToken, ConduitT, Error, SourceT};

use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::timeout;

// --- Helper Function for Async MPMC Conduit Tests ---
async fn run_async_conduit_test(
  num_producers: usize,
  num_consumers: usize,
  items_per_producer: usize,
  policy: BufferPolicy<usize>,
) {
  let conduit = spawn_with(policy, "mpmc-async");
  let total_items_expected = num_producers * items_per_producer;
  let received_items_set = Arc::new(TokioMutex::new(HashSet::new()));
  let received_count = Arc::new(AtomicUsize::new(0));

  // --- Spawn Consumers ---
  let mut consumer_handles = Vec::new();
  for _ in 0..num_consumers {
    let source = conduit.source().clone();
    let received_set_clone = Arc::clone(&received_items_set);
    let received_count_clone = Arc::clone(&received_count);

    consumer_handles.push(tokio::spawn(async move {
      loop {
        match source.read_async().await {
          Ok(item) => {
            assert!(received_set_clone.lock().await.insert(item), "Duplicate item received!");
            received_count_clone.fetch_add(1, AtomicOrdering::Relaxed);
          }
          Err(Error::SourceClosed) => break,
          Err(other) => panic!("unexpected error: {other}"),
        }
      }
    }));
  }

  // --- Spawn Producers ---
  let mut producer_handles = Vec::new();
  for p_id in 0..num_producers {
    let sink = conduit.sink().clone();
    producer_handles.push(tokio::spawn(async move {
      for i in 0..items_per_producer {
        sink.post_async(p_id * items_per_producer + i).await.unwrap();
      }
    }));
  }

  // --- Join and Assert ---
  for handle in producer_handles {
    handle.await.expect("Producer task panicked");
  }
  conduit.complete().unwrap();
  for handle in consumer_handles {
    timeout(LONG_TIMEOUT, handle)
      .await
      .expect("Consumer task timed out")
      .expect("Consumer task panicked");
  }

  assert_eq!(received_count.load(AtomicOrdering::Relaxed), total_items_expected);
  assert_eq!(received_items_set.lock().await.len(), total_items_expected);
}

#[tokio::test]
async fn async_1p_1c_unbounded() {
  run_async_conduit_test(1, 1, ITEMS_HIGH, BufferPolicy::Unbounded).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_mp_mc_bounded_multi_thread() {
  run_async_conduit_test(4, 4, ITEMS_MEDIUM, BufferPolicy::Bounded(4)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn async_mp_mc_single_multi_thread() {
  run_async_conduit_test(3, 3, ITEMS_LOW, BufferPolicy::Single).await;
}

#[tokio::test]
async fn async_bounded_one_scenario() {
  let conduit = spawn_with::<&str>(BufferPolicy::Bounded(1), "scenario");
  conduit.post_async("a").await.unwrap();

  let writer = conduit.clone();
  let blocked = tokio::spawn(async move { writer.post_async("b").await });
  tokio::time::sleep(SETTLE).await;
  assert!(!blocked.is_finished(), "second post should be waiting");

  assert_eq!(conduit.read_async().await, Ok("a"));
  blocked.await.unwrap().unwrap();
  assert_eq!(conduit.read_async().await, Ok("b"));

  conduit.complete().unwrap();
  assert_eq!(conduit.read_async().await, Err(Error::SourceClosed));
}

#[tokio::test]
async fn async_and_blocking_endpoints_interoperate() {
  let conduit = spawn_with::<usize>(BufferPolicy::Bounded(2), "mixed");
  let writer = conduit.clone();
  let producer = std::thread::spawn(move || {
    for i in 0..ITEMS_LOW {
      writer.post(i).unwrap();
    }
    writer.complete().unwrap();
  });

  let mut received = Vec::new();
  loop {
    match timeout(LONG_TIMEOUT, conduit.read_async()).await.expect("read timed out") {
      Ok(item) => received.push(item),
      Err(Error::SourceClosed) => break,
      Err(other) => panic!("unexpected error: {other}"),
    }
  }
  producer.join().expect("Producer thread panicked");
  assert_eq!(received, (0..ITEMS_LOW).collect::<Vec<_>>());
}

#[tokio::test]
async fn async_cancellation_leaves_channel_untouched() {
  let conduit = spawn_with::<u8>(BufferPolicy::Single, "cancel");
  conduit.post_async(1).await.unwrap();

  let token = CancellationToken::new();
  let canceller = token.clone();
  tokio::spawn(async move {
    tokio::time::sleep(SETTLE).await;
    canceller.cancel();
  });
  let outcome = timeout(SHORT_TIMEOUT * 4, conduit.post_async_cancellable(2, &token)).await;
  assert_eq!(outcome.expect("cancel did not wake the writer"), Err(Error::Cancelled));

  assert_eq!(conduit.read_async().await, Ok(1));
  assert_eq!(conduit.read_async_cancellable(&token).await, Err(Error::Cancelled));
}

#[tokio::test]
async fn dropping_a_pending_read_loses_nothing() {
  let conduit = spawn::<u32>("dropped-read");
  let abandoned = timeout(SETTLE, conduit.read_async()).await;
  assert!(abandoned.is_err());

  conduit.post_async(7).await.unwrap();
  assert_eq!(conduit.read_async().await, Ok(7));
}

#[tokio::test]
async fn async_merge_delivers_everything_once() {
  let left = spawn_with::<usize>(BufferPolicy::Bounded(2), "left");
  let right = spawn_with::<usize>(BufferPolicy::Bounded(2), "right");
  let merged = left.source() + right.source();

  for (conduit, offset) in [(left.clone(), 0), (right.clone(), ITEMS_MEDIUM)] {
    tokio::spawn(async move {
      for i in 0..ITEMS_MEDIUM {
        conduit.post_async(offset + i).await.unwrap();
      }
      conduit.complete().unwrap();
    });
  }

  let mut seen = HashSet::new();
  loop {
    match timeout(LONG_TIMEOUT, merged.read_async()).await.expect("merge stalled") {
      Ok(item) => assert!(seen.insert(item), "Duplicate item received!"),
      Err(Error::SourceClosed) => break,
      Err(other) => panic!("unexpected error: {other}"),
    }
  }
  assert_eq!(seen.len(), 2 * ITEMS_MEDIUM);
}

#[tokio::test]
async fn source_t_merge_and_choose() {
  let left = ConduitT::<u32, u32, u32>::spawn("left");
  let right = ConduitT::<u32, u32, u32>::spawn("right");
  let merged = left.source() + right.source();

  right.post(2).await.unwrap();
  left.post(1).await.unwrap();
  left.complete().unwrap();
  right.complete().unwrap();

  let total = merged.reduce(0, |acc, n| acc + n).await;
  assert_eq!(total, Ok(3));

  let fallback = ConduitT::<u32, u32, u32>::spawn("fallback");
  fallback.post(9).await.unwrap();
  let chosen = SourceT::pure(1) | fallback.source();
  assert_eq!(chosen.read().await, Ok(1));
  assert_eq!(chosen.read().await, Ok(9));
}

#[tokio::test]
async fn source_t_choose_reports_fallback_failure_mid_stream() {
  let primary = ConduitT::<u32, u32, u32>::spawn("primary");
  let fallback = ConduitT::<u32, u32, u32>::spawn("fallback").map_m(|n| async move {
    if n > 100 {
      Err(Error::msg("out of range"))
    } else {
      Ok(n)
    }
  });
  let chosen = primary.source() | fallback.source();

  let writer = fallback.clone();
  tokio::spawn(async move {
    tokio::time::sleep(SETTLE).await;
    for n in [1, 500, 2] {
      writer.post(n).await.unwrap();
    }
  });

  let mut results = Vec::new();
  for _ in 0..3 {
    results.push(timeout(LONG_TIMEOUT, chosen.read()).await.expect("choose stalled"));
  }
  assert_eq!(results, vec![Ok(1), Err(Error::msg("out of range")), Ok(2)]);
}

#[tokio::test]
async fn conduit_t_reduce_short_circuits() {
  let conduit = ConduitT::<u32, u32, u32>::spawn_with(BufferPolicy::Bounded(8), "reduce").map(|n| n * 2);
  for n in 1..=5 {
    conduit.post(n).await.unwrap();
  }

  let token = CancellationToken::new();
  let first_three = conduit
    .reduce(Vec::new(), &token, |mut acc, n| {
      acc.push(n);
      if acc.len() == 3 {
        ControlFlow::Break(acc)
      } else {
        ControlFlow::Continue(acc)
      }
    })
    .await;
  assert_eq!(first_three, Ok(vec![2, 4, 6]));

  let canceller = token.clone();
  tokio::spawn(async move {
    tokio::time::sleep(SETTLE).await;
    canceller.cancel();
  });
  let rest = timeout(LONG_TIMEOUT, conduit.reduce(0, &token, |acc, n| ControlFlow::Continue(acc + n)))
    .await
    .expect("reduce ignored cancellation");
  assert_eq!(rest, Ok(18));
}

#[tokio::test]
async fn producer_and_consumer_bridge_conduits() {
  let upstream = spawn_with::<u32>(BufferPolicy::Bounded(2), "upstream");
  let downstream = spawn::<String>("downstream");

  let writer = upstream.clone();
  tokio::spawn(async move {
    for n in 0..ITEMS_LOW as u32 {
      writer.post_async(n).await.unwrap();
    }
    writer.complete().unwrap();
  });

  let mut consumer = downstream.contramap(|n: u32| n.to_string()).to_consumer();
  let mut producer = upstream.to_producer();
  while let Some(item) = producer.next().await {
    consumer.send(item.unwrap()).await.unwrap();
  }
  consumer.close().await.unwrap();

  let received: Vec<String> = downstream.to_producer().map(Result::unwrap).collect().await;
  assert_eq!(received.len(), ITEMS_LOW);
  assert_eq!(received.first().map(String::as_str), Some("0"));
  assert_eq!(received.last(), Some(&(ITEMS_LOW - 1).to_string()));
}

#[tokio::test]
async fn async_fan_out_reaches_every_sink() {
  let a = spawn::<u8>("a");
  let b = spawn::<u8>("b");
  let both = a.combine_sink(b.sink());
  both.post_async(3).await.unwrap();
  assert_eq!(a.read_async().await, Ok(3));
  assert_eq!(b.read_async().await, Ok(3));

  b.complete().unwrap();
  let error = both.post_async(4).await.unwrap_err();
  assert_eq!(error, Error::SinkFull);
  assert_eq!(a.read_async().await, Ok(4));
}
