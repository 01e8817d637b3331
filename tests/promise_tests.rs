use promise_pool::{spawn, Promise, PromiseError};

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,promise_pool=trace"));
    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

fn user_error(msg: &str) -> PromiseError {
  PromiseError::failed(io::Error::other(msg.to_string()))
}

#[tokio::test]
async fn resolve_first_wins_and_replays() {
  setup_tracing_for_test();
  let promise: Promise<String> = Promise::pending();
  assert!(!promise.is_ready());
  assert!(promise.try_result().is_none());

  promise.resolve("hello world".to_string());
  promise.resolve("too late".to_string());
  promise.reject(user_error("too late"));
  promise.cancel();

  assert!(promise.is_ready());
  assert!(!promise.is_cancelled());
  promise.wait().await;
  for _ in 0..3 {
    assert_eq!(promise.result().await, Ok("hello world".to_string()));
  }
}

#[tokio::test]
async fn reject_first_wins_and_replays() {
  setup_tracing_for_test();
  let promise: Promise<String> = Promise::pending();
  let expected = user_error("expected failure");

  promise.reject(expected.clone());
  promise.resolve("too late".to_string());
  promise.cancel();

  assert!(promise.is_ready());
  assert!(!promise.is_cancelled());
  for _ in 0..3 {
    assert_eq!(promise.result().await, Err(expected.clone()));
  }
}

#[tokio::test]
async fn cancel_stores_the_cancellation_sentinel() {
  setup_tracing_for_test();
  let promise: Promise<String> = Promise::pending();
  promise.cancel();

  assert!(promise.is_cancelled());
  assert_eq!(promise.result().await, Err(PromiseError::Cancelled));

  // Any other stored error must not read as cancelled.
  let failed: Promise<String> = Promise::pending();
  failed.reject(user_error("ordinary failure"));
  assert!(failed.is_ready());
  assert!(!failed.is_cancelled());
}

#[tokio::test]
async fn hooks_fire_on_success() {
  setup_tracing_for_test();
  let promise: Promise<String> = Promise::pending();

  let success_seen = Arc::new(AtomicBool::new(false));
  let error_seen = Arc::new(AtomicBool::new(false));
  let done_seen = Arc::new(AtomicBool::new(false));

  {
    let success_seen = success_seen.clone();
    promise.on_success(move |value| {
      assert_eq!(value.as_str(), "hello world");
      success_seen.store(true, Ordering::SeqCst);
    });
  }
  {
    let error_seen = error_seen.clone();
    promise.on_error(move |_| error_seen.store(true, Ordering::SeqCst));
  }
  {
    let done_seen = done_seen.clone();
    promise.on_done(move || done_seen.store(true, Ordering::SeqCst));
  }

  promise.resolve("hello world".to_string());

  // Hooks run synchronously at finalize time.
  assert!(success_seen.load(Ordering::SeqCst));
  assert!(!error_seen.load(Ordering::SeqCst));
  assert!(done_seen.load(Ordering::SeqCst));
}

#[tokio::test]
async fn hooks_fire_on_error() {
  setup_tracing_for_test();
  let promise: Promise<String> = Promise::pending();
  let expected = user_error("expected failure");

  let success_seen = Arc::new(AtomicBool::new(false));
  let error_seen = Arc::new(AtomicBool::new(false));
  let done_seen = Arc::new(AtomicBool::new(false));

  {
    let success_seen = success_seen.clone();
    promise.on_success(move |_| success_seen.store(true, Ordering::SeqCst));
  }
  {
    let error_seen = error_seen.clone();
    let expected = expected.clone();
    promise.on_error(move |err| {
      assert_eq!(*err, expected);
      error_seen.store(true, Ordering::SeqCst);
    });
  }
  {
    let done_seen = done_seen.clone();
    promise.on_done(move || done_seen.store(true, Ordering::SeqCst));
  }

  promise.reject(expected);

  assert!(!success_seen.load(Ordering::SeqCst));
  assert!(error_seen.load(Ordering::SeqCst));
  assert!(done_seen.load(Ordering::SeqCst));
}

#[tokio::test]
async fn hook_registered_after_settlement_fires_immediately() {
  setup_tracing_for_test();
  let promise: Promise<u32> = Promise::pending();
  promise.resolve(7);

  let seen = Arc::new(AtomicUsize::new(0));
  {
    let seen = seen.clone();
    promise.on_success(move |value| {
      assert_eq!(*value, 7);
      seen.fetch_add(1, Ordering::SeqCst);
    });
  }
  {
    let seen = seen.clone();
    promise.on_done(move || {
      seen.fetch_add(1, Ordering::SeqCst);
    });
  }
  assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn hooks_fire_at_most_once_despite_repeated_settlement() {
  setup_tracing_for_test();
  let promise: Promise<u32> = Promise::pending();
  let done_count = Arc::new(AtomicUsize::new(0));
  {
    let done_count = done_count.clone();
    promise.on_done(move || {
      done_count.fetch_add(1, Ordering::SeqCst);
    });
  }

  promise.resolve(1);
  promise.resolve(2);
  promise.cancel();
  promise.reject(user_error("late"));

  assert_eq!(done_count.load(Ordering::SeqCst), 1);
  assert_eq!(promise.result().await, Ok(1));
}

#[tokio::test]
async fn result_within_returns_timeout_without_touching_the_promise() {
  setup_tracing_for_test();
  let promise = spawn(async {
    sleep(Duration::from_millis(200)).await;
    Ok("hello world".to_string())
  });

  let waited = promise.result_within(Duration::from_millis(50)).await;
  assert_eq!(waited, Err(PromiseError::WaitTimeout));
  // The caller gave up waiting; the producer did not stop.
  assert!(!promise.is_ready());
  assert_eq!(promise.result().await, Ok("hello world".to_string()));
}

#[tokio::test]
async fn result_until_is_scoped_to_the_waiting_call() {
  setup_tracing_for_test();
  let promise = spawn(async {
    sleep(Duration::from_millis(150)).await;
    Ok(42u32)
  });

  let signal = CancellationToken::new();
  signal.cancel();
  assert_eq!(promise.result_until(&signal).await, Err(PromiseError::Cancelled));

  // The wait-side cancellation is ephemeral: it is not stored, so the
  // promise neither reads as cancelled nor loses its eventual value.
  assert!(!promise.is_cancelled());
  assert_eq!(promise.result().await, Ok(42));
  assert!(!promise.is_cancelled());
}

#[tokio::test]
async fn result_until_returns_value_when_promise_settles_first() {
  setup_tracing_for_test();
  let promise = spawn(async {
    sleep(Duration::from_millis(50)).await;
    Ok("hello world".to_string())
  });

  let signal = CancellationToken::new();
  let value = promise.result_until(&signal).await;
  assert_eq!(value, Ok("hello world".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_settlement_yields_exactly_one_outcome() {
  setup_tracing_for_test();
  let promise: Promise<usize> = Promise::pending();

  let done_count = Arc::new(AtomicUsize::new(0));
  {
    let done_count = done_count.clone();
    promise.on_done(move || {
      done_count.fetch_add(1, Ordering::SeqCst);
    });
  }

  let mut writers = Vec::new();
  for i in 0..30 {
    let promise = promise.clone();
    writers.push(tokio::spawn(async move {
      match i % 3 {
        0 => promise.resolve(i),
        1 => promise.reject(PromiseError::failed(io::Error::other(format!("writer {i}")))),
        _ => promise.cancel(),
      }
    }));
  }
  for writer in writers {
    writer.await.unwrap();
  }

  let first = promise.result().await;
  match &first {
    // A resolved value must be one actually written by a resolver, never a
    // torn or mixed-up one.
    Ok(value) => assert_eq!(value % 3, 0),
    Err(err) => assert!(err.is_cancelled() || err.as_failure().is_some()),
  }
  for _ in 0..10 {
    assert_eq!(promise.result().await, first);
  }
  assert_eq!(done_count.load(Ordering::SeqCst), 1);
}
