use crate::error::PromiseError;

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use futures_intrusive::sync::ManualResetEvent;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// A hook registered to fire once, synchronously, when the promise settles.
enum Hook<T> {
  Success(Box<dyn FnOnce(&T) + Send + 'static>),
  Error(Box<dyn FnOnce(&PromiseError) + Send + 'static>),
  Done(Box<dyn FnOnce() + Send + 'static>),
}

impl<T> Hook<T> {
  fn fire(self, outcome: &Result<T, PromiseError>) {
    match (self, outcome) {
      (Hook::Success(f), Ok(value)) => f(value),
      (Hook::Error(f), Err(err)) => f(err),
      (Hook::Done(f), _) => f(),
      _ => {}
    }
  }
}

struct PromiseShared<T> {
  /// Write-once outcome cell. The guarded check-then-store in `finalize` is
  /// the only writer path; the first writer wins and everyone else no-ops.
  outcome: Mutex<Option<Result<T, PromiseError>>>,
  /// Readiness signal, set exactly once, strictly after the outcome is
  /// stored. Waiters woken by it always observe the stored outcome.
  done: ManualResetEvent,
  hooks: Mutex<Vec<Hook<T>>>,
}

/// A single-assignment container for an asynchronous outcome.
///
/// A `Promise` settles exactly once, through the first of
/// [`resolve`](Promise::resolve), [`reject`](Promise::reject) or
/// [`cancel`](Promise::cancel) to take effect; later settlement attempts are
/// silent no-ops. The outcome can be read any number of times afterwards.
///
/// Cloning is cheap and yields another handle to the same promise.
pub struct Promise<T> {
  shared: Arc<PromiseShared<T>>,
}

impl<T> Clone for Promise<T> {
  fn clone(&self) -> Self {
    Promise {
      shared: self.shared.clone(),
    }
  }
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
  fn default() -> Self {
    Promise::pending()
  }
}

impl<T: Clone + Send + 'static> Promise<T> {
  /// Creates a new, unsettled promise.
  pub fn pending() -> Self {
    Promise {
      shared: Arc::new(PromiseShared {
        outcome: Mutex::new(None),
        done: ManualResetEvent::new(false),
        hooks: Mutex::new(Vec::new()),
      }),
    }
  }

  /// Settles the promise with a value. No-op if already settled.
  pub fn resolve(&self, value: T) {
    self.finalize(Ok(value));
  }

  /// Settles the promise with an error. No-op if already settled.
  pub fn reject(&self, err: PromiseError) {
    self.finalize(Err(err));
  }

  /// Settles the promise with the cancellation sentinel. No-op if already
  /// settled; an already-running producer keeps going, only the observable
  /// outcome is fixed.
  pub fn cancel(&self) {
    self.reject(PromiseError::Cancelled);
  }

  /// True once the promise has settled, with either outcome.
  pub fn is_ready(&self) -> bool {
    self.shared.done.is_set()
  }

  /// True iff the promise settled with exactly the cancellation sentinel.
  /// Other errors, success, or a still-pending promise all yield false.
  pub fn is_cancelled(&self) -> bool {
    matches!(
      &*self.shared.outcome.lock(),
      Some(Err(PromiseError::Cancelled))
    )
  }

  /// Non-blocking peek at the settled outcome, if any.
  pub fn try_result(&self) -> Option<Result<T, PromiseError>> {
    self.shared.outcome.lock().clone()
  }

  /// Waits for the promise to settle, without reading the outcome.
  pub async fn wait(&self) {
    self.shared.done.wait().await;
  }

  /// Waits for the promise to settle and returns its outcome. Callable any
  /// number of times; always returns the first-written outcome.
  pub async fn result(&self) -> Result<T, PromiseError> {
    self.shared.done.wait().await;
    self.settled_outcome()
  }

  /// Races the promise's readiness against a caller-side token.
  ///
  /// If the token fires first this returns `Err(Cancelled)` scoped to this
  /// wait only: the promise itself is untouched and its producer keeps
  /// running, so a later [`result`](Promise::result) still yields the real
  /// outcome. This decoupling is deliberate.
  pub async fn result_until(&self, signal: &CancellationToken) -> Result<T, PromiseError> {
    tokio::select! {
      biased;
      _ = self.shared.done.wait() => self.settled_outcome(),
      _ = signal.cancelled() => Err(PromiseError::Cancelled),
    }
  }

  /// Like [`result_until`](Promise::result_until) with a deadline: returns
  /// `Err(WaitTimeout)` if the promise does not settle in time. The timeout
  /// error is never stored in the promise.
  pub async fn result_within(&self, limit: Duration) -> Result<T, PromiseError> {
    match tokio::time::timeout(limit, self.shared.done.wait()).await {
      Ok(()) => self.settled_outcome(),
      Err(_) => Err(PromiseError::WaitTimeout),
    }
  }

  /// Registers a hook fired with the value if the promise resolves.
  pub fn on_success(&self, f: impl FnOnce(&T) + Send + 'static) {
    self.register(Hook::Success(Box::new(f)));
  }

  /// Registers a hook fired with the error if the promise rejects.
  pub fn on_error(&self, f: impl FnOnce(&PromiseError) + Send + 'static) {
    self.register(Hook::Error(Box::new(f)));
  }

  /// Registers a hook fired when the promise settles, with either outcome.
  pub fn on_done(&self, f: impl FnOnce() + Send + 'static) {
    self.register(Hook::Done(Box::new(f)));
  }

  fn settled_outcome(&self) -> Result<T, PromiseError> {
    self
      .try_result()
      .expect("readiness signaled before an outcome was stored")
  }

  fn finalize(&self, outcome: Result<T, PromiseError>) {
    let for_hooks = outcome.clone();
    {
      let mut guard = self.shared.outcome.lock();
      if guard.is_some() {
        trace!("promise already settled, ignoring late settlement");
        return;
      }
      *guard = Some(outcome);
    }
    self.shared.done.set();

    // Hooks run after the transition, outside the outcome lock. `mem::take`
    // under the hooks lock guarantees each fires at most once even when a
    // hook is being registered concurrently.
    let hooks = mem::take(&mut *self.shared.hooks.lock());
    for hook in hooks {
      hook.fire(&for_hooks);
    }
  }

  fn register(&self, hook: Hook<T>) {
    {
      let mut hooks = self.shared.hooks.lock();
      if !self.shared.done.is_set() {
        hooks.push(hook);
        return;
      }
      // Settled: the finalizer may already have drained the list, so this
      // hook would never fire from there. Fire it here instead.
    }
    if let Some(outcome) = self.try_result() {
      hook.fire(&outcome);
    }
  }
}
