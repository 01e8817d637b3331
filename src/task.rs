use crate::error::PromiseError;
use crate::promise::Promise;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use futures::FutureExt;
use tracing::{debug, error};

lazy_static::lazy_static! {
  static ref NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);
}

/// A queued unit of pool work: a type-erased producer future bound to the
/// promise it settles. Exactly one task binds to exactly one promise, and a
/// task is either run once by one worker or rejected unrun at stop time.
pub(crate) struct QueuedTask {
  pub(crate) id: u64,
  run: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
  on_stopped: Box<dyn FnOnce() + Send + 'static>,
}

impl QueuedTask {
  /// Binds `producer` to `promise`, erasing the output type. The returned
  /// task owns outcome propagation: value to `resolve`, error to `reject`,
  /// panic to `reject(Panicked)`. Task ids are allocated from one
  /// process-wide counter so tracing output stays unambiguous across pools.
  pub(crate) fn bind<T, F>(promise: Promise<T>, producer: F) -> Self
  where
    T: Clone + Send + 'static,
    F: Future<Output = Result<T, PromiseError>> + Send + 'static,
  {
    let id = NEXT_TASK_ID.fetch_add(1, AtomicOrdering::Relaxed);
    let completer = promise.clone();
    let run = Box::pin(async move {
      if completer.is_ready() {
        // Settled while queued, e.g. cancelled through another handle.
        // The producer is never started in that case.
        debug!(task_id = id, "task promise already settled, skipping body");
        return;
      }
      match AssertUnwindSafe(producer).catch_unwind().await {
        Ok(Ok(value)) => completer.resolve(value),
        Ok(Err(err)) => completer.reject(err),
        Err(_panic_payload) => {
          error!(task_id = id, "task body panicked");
          completer.reject(PromiseError::Panicked);
        }
      }
    });
    QueuedTask {
      id,
      run,
      on_stopped: Box::new(move || promise.reject(PromiseError::PoolStopped)),
    }
  }

  /// Runs the producer to completion and settles the bound promise.
  pub(crate) async fn run(self) {
    self.run.await;
  }

  /// Rejects the bound promise with the stopped sentinel without running
  /// the producer.
  pub(crate) fn reject_stopped(self) {
    (self.on_stopped)();
  }
}
