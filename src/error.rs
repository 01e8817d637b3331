use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Errors a [`Promise`](crate::Promise) can settle with, plus the ephemeral
/// wait-side errors returned by the bounded wait accessors.
///
/// User task errors are carried verbatim inside [`PromiseError::Failed`];
/// the crate never inspects or rewraps them.
#[derive(Error, Debug, Clone)]
pub enum PromiseError {
  /// The promise was cancelled via [`Promise::cancel`](crate::Promise::cancel),
  /// or a `result_until` wait was abandoned by its caller-side token.
  #[error("promise was cancelled")]
  Cancelled,

  /// The task was rejected because its pool stopped, either at submission
  /// time or while it was still sitting in the queue.
  #[error("pool is stopped and no longer accepts or runs tasks")]
  PoolStopped,

  /// The task body panicked while producing the promise outcome.
  #[error("task panicked while producing the promise outcome")]
  Panicked,

  /// A `result_within` deadline elapsed before the promise settled. Never
  /// stored in the promise itself.
  #[error("wait deadline elapsed before the promise settled")]
  WaitTimeout,

  /// `when_any` was asked to scan an empty promise list.
  #[error("no promises were supplied")]
  NoPromises,

  /// The error returned by the submitted task itself, passed through as-is.
  #[error("{0}")]
  Failed(Arc<dyn StdError + Send + Sync + 'static>),
}

impl PromiseError {
  /// Wraps a user task error. The `Arc` keeps settled outcomes cloneable for
  /// repeated reads without touching the error value itself.
  pub fn failed(err: impl StdError + Send + Sync + 'static) -> Self {
    PromiseError::Failed(Arc::new(err))
  }

  /// Returns the underlying user error, if this is a task failure.
  pub fn as_failure(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
    match self {
      PromiseError::Failed(err) => Some(err.as_ref()),
      _ => None,
    }
  }

  /// True iff this is the cancellation sentinel.
  pub fn is_cancelled(&self) -> bool {
    matches!(self, PromiseError::Cancelled)
  }

  /// True iff this is the pool-stopped sentinel.
  pub fn is_pool_stopped(&self) -> bool {
    matches!(self, PromiseError::PoolStopped)
  }
}

/// Sentinel variants compare by kind; task failures compare by `Arc`
/// identity, so a stored error is only ever equal to itself.
impl PartialEq for PromiseError {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (PromiseError::Cancelled, PromiseError::Cancelled) => true,
      (PromiseError::PoolStopped, PromiseError::PoolStopped) => true,
      (PromiseError::Panicked, PromiseError::Panicked) => true,
      (PromiseError::WaitTimeout, PromiseError::WaitTimeout) => true,
      (PromiseError::NoPromises, PromiseError::NoPromises) => true,
      (PromiseError::Failed(a), PromiseError::Failed(b)) => Arc::ptr_eq(a, b),
      _ => false,
    }
  }
}
