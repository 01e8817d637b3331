use crate::task::QueuedTask;

use std::collections::VecDeque;
use std::mem;

use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

struct QueueState {
  closed: bool,
  tasks: VecDeque<QueuedTask>,
}

/// A bounded, closeable FIFO queue of pool tasks.
///
/// Capacity is enforced by a semaphore gate in front of the buffer, so a
/// full queue applies backpressure to `push` without holding any lock while
/// waiting. Admission itself is decided under the state lock, which makes
/// `close` atomic: after it returns, every task ever admitted has either
/// been popped by a worker or is in the backlog `close` handed back. A task
/// can never slip into a closed queue.
pub(crate) struct TaskQueue {
  state: Mutex<QueueState>,
  gate: Semaphore,
  ready: Notify,
  capacity: usize,
}

impl TaskQueue {
  pub(crate) fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    TaskQueue {
      state: Mutex::new(QueueState {
        closed: false,
        tasks: VecDeque::new(),
      }),
      gate: Semaphore::new(capacity),
      ready: Notify::new(),
      capacity,
    }
  }

  /// Static configured capacity, not current occupancy.
  pub(crate) fn capacity(&self) -> usize {
    self.capacity
  }

  /// Number of tasks currently queued.
  pub(crate) fn len(&self) -> usize {
    self.state.lock().tasks.len()
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.state.lock().closed
  }

  /// Enqueues a task, waiting for a free slot while the queue is full.
  ///
  /// Returns the task back to the caller if the queue closed (or `stop`
  /// fired) before a slot could be claimed, so the caller can reject its
  /// promise instead of dropping it silently.
  pub(crate) async fn push(
    &self,
    task: QueuedTask,
    stop: &CancellationToken,
  ) -> Result<(), QueuedTask> {
    let permit = tokio::select! {
      biased;
      _ = stop.cancelled() => return Err(task),
      acquired = self.gate.acquire() => match acquired {
        Ok(permit) => permit,
        // Gate closed by `close`.
        Err(_) => return Err(task),
      },
    };

    {
      let mut state = self.state.lock();
      if state.closed {
        return Err(task);
      }
      state.tasks.push_back(task);
      // The slot stays claimed until a pop releases it.
      permit.forget();
    }
    self.ready.notify_one();
    Ok(())
  }

  /// Dequeues the next task, waiting while the queue is empty. Returns
  /// `None` once the queue is closed or `stop` fires; a blocked `pop` is
  /// woken by either.
  pub(crate) async fn pop(&self, stop: &CancellationToken) -> Option<QueuedTask> {
    loop {
      // Register for wakeup before checking, so a push landing between the
      // check and the await is never lost.
      let notified = self.ready.notified();
      if let Some(task) = self.try_pop() {
        return Some(task);
      }
      if self.is_closed() {
        return None;
      }
      tokio::select! {
        biased;
        _ = stop.cancelled() => return None,
        _ = notified => {}
      }
    }
  }

  pub(crate) fn try_pop(&self) -> Option<QueuedTask> {
    let task = self.state.lock().tasks.pop_front();
    if task.is_some() {
      self.gate.add_permits(1);
    }
    task
  }

  /// Closes the queue and takes the entire backlog in one atomic step.
  ///
  /// The first caller gets `Some(backlog)` and owns its disposal; later
  /// callers get `None`. Blocked `push` calls fail, blocked `pop` calls
  /// drain to `None`.
  pub(crate) fn close(&self) -> Option<VecDeque<QueuedTask>> {
    let backlog = {
      let mut state = self.state.lock();
      if state.closed {
        return None;
      }
      state.closed = true;
      mem::take(&mut state.tasks)
    };
    self.gate.close();
    self.ready.notify_waiters();
    Some(backlog)
  }
}
