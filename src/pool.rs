use crate::error::PromiseError;
use crate::promise::Promise;
use crate::queue::TaskQueue;
use crate::task::QueuedTask;

use std::future::Future;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

/// Defines what happens to queued-but-unstarted tasks when the pool stops.
///
/// In-flight tasks (already dequeued by a worker) always run to completion
/// regardless of mode. The mode of the first `stop` call wins; a pool's
/// shutdown is never a race-decided mix of both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
  /// Rejects every queued task's promise with
  /// [`PromiseError::PoolStopped`] without running its body.
  RejectPending,
  /// Executes every queued task to completion before `stop` returns.
  DrainPending,
}

/// A fixed set of workers draining a bounded FIFO queue of promise-producing
/// tasks.
///
/// Lifecycle is `running -> stopping -> stopped`: [`submit`](PromisePool::submit)
/// admits tasks while running, [`stop`](PromisePool::stop) is idempotent and
/// terminal. Once `stop` returns, no task will ever again be executed by
/// this pool and the queue is empty.
pub struct PromisePool {
  pool_name: Arc<String>,
  queue: Arc<TaskQueue>,
  stop_token: CancellationToken,
  workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PromisePool {
  /// Starts a pool with `workers` worker loops (clamped to at least one)
  /// and a queue holding at most `queue_capacity` pending tasks, spawned on
  /// the given runtime handle.
  pub fn start(workers: usize, queue_capacity: usize, handle: TokioHandle, name: &str) -> Self {
    let pool_name = Arc::new(name.to_string());
    let queue = Arc::new(TaskQueue::new(queue_capacity));
    let stop_token = CancellationToken::new();

    let worker_count = workers.max(1);
    let mut worker_handles = Vec::with_capacity(worker_count);
    for index in 0..worker_count {
      let worker_queue = queue.clone();
      let worker_token = stop_token.clone();
      let span = info_span!("promise_pool_worker", pool = %name, worker = index);
      worker_handles.push(handle.spawn(
        Self::run_worker(worker_queue, worker_token).instrument(span),
      ));
    }
    info!(pool = %name, workers = worker_count, capacity = queue.capacity(), "pool started");

    PromisePool {
      pool_name,
      queue,
      stop_token,
      workers: Mutex::new(worker_handles),
    }
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  /// Maximum number of pending tasks the queue can hold. Static
  /// configuration, not current occupancy.
  pub fn capacity(&self) -> usize {
    self.queue.capacity()
  }

  /// Number of tasks currently waiting in the queue.
  pub fn queued_count(&self) -> usize {
    self.queue.len()
  }

  /// True once a stop (explicit or via drop) has been initiated.
  pub fn is_stopped(&self) -> bool {
    self.queue.is_closed()
  }

  /// Submits a producer and returns the promise bound to it.
  ///
  /// On a stopped pool the promise comes back already rejected with
  /// [`PromiseError::PoolStopped`]; nothing is enqueued and the call never
  /// blocks. Otherwise this waits for a queue slot, and if the pool stops
  /// during that wait the promise is rejected the same way instead of being
  /// dropped into a closing queue. The producer never runs on the caller.
  pub async fn submit<T, F>(&self, producer: F) -> Promise<T>
  where
    T: Clone + Send + 'static,
    F: Future<Output = Result<T, PromiseError>> + Send + 'static,
  {
    let promise = Promise::pending();

    if self.stop_token.is_cancelled() || self.queue.is_closed() {
      warn!(pool = %self.pool_name, "submit on stopped pool, rejecting");
      promise.reject(PromiseError::PoolStopped);
      return promise;
    }

    let task = QueuedTask::bind(promise.clone(), producer);
    debug!(pool = %self.pool_name, task_id = task.id, "queueing task");
    if let Err(task) = self.queue.push(task, &self.stop_token).await {
      warn!(pool = %self.pool_name, task_id = task.id, "pool stopped while queueing, rejecting");
      task.reject_stopped();
    }
    promise
  }

  /// Stops the pool: refuses new admissions, waits for in-flight tasks to
  /// finish, then disposes of the queued backlog per `mode`.
  ///
  /// Idempotent and terminal. Only the first call does the work (with its
  /// mode); later calls return immediately.
  pub async fn stop(&self, mode: ShutdownMode) {
    let Some(backlog) = self.queue.close() else {
      debug!(pool = %self.pool_name, "stop already initiated, nothing to do");
      return;
    };
    info!(pool = %self.pool_name, ?mode, backlog = backlog.len(), "stopping pool");
    self.stop_token.cancel();

    let worker_handles = mem::take(&mut *self.workers.lock());
    for handle in worker_handles {
      if let Err(join_error) = handle.await {
        error!(pool = %self.pool_name, "worker failed to join: {join_error}");
      }
    }

    match mode {
      ShutdownMode::RejectPending => {
        for task in backlog {
          trace!(pool = %self.pool_name, task_id = task.id, "rejecting queued task");
          task.reject_stopped();
        }
      }
      ShutdownMode::DrainPending => {
        for task in backlog {
          trace!(pool = %self.pool_name, task_id = task.id, "draining queued task");
          task.run().await;
        }
      }
    }
    info!(pool = %self.pool_name, "pool stopped");
  }

  async fn run_worker(queue: Arc<TaskQueue>, stop_token: CancellationToken) {
    debug!("worker started");
    loop {
      if stop_token.is_cancelled() {
        break;
      }
      // `pop` is interruptible: it returns None as soon as the stop token
      // fires or the queue closes. A dequeued task always runs to
      // completion before the stop signal is looked at again.
      match queue.pop(&stop_token).await {
        Some(task) => {
          let task_id = task.id;
          trace!(task_id, "task dequeued");
          task.run().await;
          trace!(task_id, "task finished");
        }
        None => break,
      }
    }
    debug!("worker stopped");
  }
}

impl Drop for PromisePool {
  fn drop(&mut self) {
    // An explicit `stop` has already closed the queue; otherwise refuse
    // further admissions and reject the backlog here. Workers observe the
    // token and wind down on their own; drop never blocks on them.
    if let Some(backlog) = self.queue.close() {
      info!(
        pool = %self.pool_name,
        backlog = backlog.len(),
        "pool dropped without explicit stop, rejecting queued tasks"
      );
      self.stop_token.cancel();
      for task in backlog {
        task.reject_stopped();
      }
    }
  }
}
