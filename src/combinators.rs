//! Wait combinators composing several promises into one, built as ordinary
//! pool tasks over the promise wait primitives, with no extra
//! synchronization of their own.
//!
//! Both `when_all` and `when_any` scan their inputs sequentially in
//! argument order. This is an index-order scan, not a completion race: the
//! combinator does not look at a later input before the earlier ones have
//! settled, which is what fixes the error-precedence rules below.

use crate::error::PromiseError;
use crate::pool::PromisePool;
use crate::promise::Promise;

use tracing::debug;

/// Collects the values of `promises` into a same-order vector.
///
/// Settles with `Err` of the first input *by index* that failed, even if a
/// later input failed earlier in time. The remaining inputs are left
/// untouched and keep running independently; nothing is cancelled.
///
/// The scan runs as one task submitted to `pool`, so a stopped pool yields
/// a promise already rejected with [`PromiseError::PoolStopped`].
pub async fn when_all<T>(pool: &PromisePool, promises: Vec<Promise<T>>) -> Promise<Vec<T>>
where
  T: Clone + Send + 'static,
{
  pool
    .submit(async move {
      let mut values = Vec::with_capacity(promises.len());
      for promise in &promises {
        values.push(promise.result().await?);
      }
      Ok(values)
    })
    .await
}

/// Settles with the value of the first input *by index* that succeeded.
///
/// Later inputs are not consulted until every earlier one has settled, so a
/// fast success at index 1 still waits out index 0. If every input fails,
/// the composite fails with the error of the last-scanned input, not the
/// first or the earliest in time. An empty input list rejects with
/// [`PromiseError::NoPromises`].
pub async fn when_any<T>(pool: &PromisePool, promises: Vec<Promise<T>>) -> Promise<T>
where
  T: Clone + Send + 'static,
{
  pool
    .submit(async move {
      let mut last_error = PromiseError::NoPromises;
      for promise in &promises {
        match promise.result().await {
          Ok(value) => return Ok(value),
          Err(err) => last_error = err,
        }
      }
      Err(last_error)
    })
    .await
}

/// Cancels every promise in order.
///
/// Purely per-element: a promise that settles concurrently simply ignores
/// its cancel, and no atomicity across the batch is promised.
pub fn cancel_all<T: Clone + Send + 'static>(promises: &[Promise<T>]) {
  debug!(count = promises.len(), "cancelling promises");
  for promise in promises {
    promise.cancel();
  }
}

/// Rejects every promise in order with `err`. Same per-element contract as
/// [`cancel_all`].
pub fn reject_all<T: Clone + Send + 'static>(err: PromiseError, promises: &[Promise<T>]) {
  debug!(count = promises.len(), "rejecting promises");
  for promise in promises {
    promise.reject(err.clone());
  }
}
