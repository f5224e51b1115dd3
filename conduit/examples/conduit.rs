// examples/conduit.rs
use fibre_conduit::error::Error;
use fibre_conduit::{spawn_with, BufferPolicy, CancellationToken, ConduitT, Source};
use std::ops::ControlFlow;
use std::{thread, time::Duration};

fn main() {
  println!("--- Conduit: Bounded(2), Sync Producers, Sync Consumer ---");
  {
    let conduit = spawn_with::<String>(BufferPolicy::Bounded(2), "words");
    let mut producer_handles = Vec::new();
    for p_id in 0..2 {
      let sink = conduit.sink().clone();
      producer_handles.push(thread::spawn(move || {
        for m_id in 0..3 {
          let msg = format!("P{}-M{}", p_id, m_id);
          println!("[Producer {}] Posting: {}", p_id, msg);
          if sink.post(msg).is_err() {
            break;
          }
        }
      }));
    }

    let reader = conduit.source().clone();
    let consumer = thread::spawn(move || {
      for item in reader.iter() {
        match item {
          Ok(value) => println!("[Consumer] Read: {}", value),
          Err(e) => println!("[Consumer] Stopped: {}", e),
        }
      }
    });

    for handle in producer_handles {
      handle.join().expect("Producer thread panicked");
    }
    conduit.complete().unwrap();
    consumer.join().expect("Consumer thread panicked");
  }

  println!("\n--- Conduit: Latest keeps only the newest reading ---");
  {
    let gauge = spawn_with(BufferPolicy::Latest(0u32), "gauge");
    println!("Seed: {:?}", gauge.read());
    for reading in [10, 20, 30] {
      gauge.post(reading).unwrap();
    }
    println!("After three posts: {:?}", gauge.read());
  }

  println!("\n--- Conduit: merge and choose ---");
  {
    let fast = spawn_with::<u32>(BufferPolicy::Unbounded, "fast");
    let slow = spawn_with::<u32>(BufferPolicy::Unbounded, "slow");
    let merged = fast.source() + slow.source();
    let writer = slow.clone();
    thread::spawn(move || {
      thread::sleep(Duration::from_millis(20));
      writer.post(100).unwrap();
      writer.complete().unwrap();
    });
    fast.post(1).unwrap();
    fast.complete().unwrap();
    println!("Merged sum: {:?}", merged.reduce(0, |acc, n| acc + n));

    let fallback = Source::pure(7u32) | Source::from_iter(vec![8, 9]);
    let chosen: Vec<u32> = fallback.iter().filter_map(Result::ok).collect();
    println!("Choose: {:?}", chosen);
  }

  println!("\n--- Conduit: fail surfaces after buffered values ---");
  {
    let conduit = spawn_with::<u8>(BufferPolicy::Unbounded, "failing");
    conduit.post(1).unwrap();
    conduit.fail(Error::msg("sensor offline")).unwrap();
    println!("First read: {:?}", conduit.read());
    println!("Second read: {:?}", conduit.read());
  }

  println!("\n--- ConduitT: async transducers and cancellable reduce ---");
  let runtime = tokio::runtime::Runtime::new().expect("Failed to build runtime");
  runtime.block_on(async {
    let conduit = ConduitT::<u32, u32, u32>::spawn("async")
      .contramap(|s: &'static str| s.len() as u32)
      .map_m(|n| async move { Ok(n * 10) });
    for word in ["a", "bb", "ccc"] {
      conduit.post(word).await.unwrap();
    }

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(50)).await;
      canceller.cancel();
    });
    let total = conduit
      .reduce(0, &token, |acc, n| ControlFlow::Continue(acc + n))
      .await;
    println!("Reduced until cancelled: {:?}", total);
  });
}
