use crate::error::PromiseError;
use crate::promise::Promise;
use crate::task::QueuedTask;

use std::future::Future;

use tokio::runtime::Handle as TokioHandle;
use tracing::trace;

/// Runs a producer on its own tokio task and returns the promise bound to
/// it.
///
/// This is the unbounded ad hoc path: no queue, no worker limit, one
/// spawned task per call, with the same outcome propagation and panic
/// capture as a pool worker. Requires a current runtime context.
pub fn spawn<T, F>(producer: F) -> Promise<T>
where
  T: Clone + Send + 'static,
  F: Future<Output = Result<T, PromiseError>> + Send + 'static,
{
  spawn_on(&TokioHandle::current(), producer)
}

/// Like [`spawn`], on an explicit runtime handle.
pub fn spawn_on<T, F>(handle: &TokioHandle, producer: F) -> Promise<T>
where
  T: Clone + Send + 'static,
  F: Future<Output = Result<T, PromiseError>> + Send + 'static,
{
  let promise = Promise::pending();
  let task = QueuedTask::bind(promise.clone(), producer);
  trace!(task_id = task.id, "spawning ad hoc task");
  handle.spawn(task.run());
  promise
}
