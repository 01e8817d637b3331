//! A single-assignment promise primitive with a bounded Tokio worker pool,
//! wait combinators, and cancellation.
//!
//! A [`Promise`] settles exactly once; the first of resolve/reject/cancel
//! wins and every later attempt is a silent no-op. Producers run either on
//! a [`PromisePool`] (fixed workers, bounded FIFO queue, explicit
//! [`ShutdownMode`]) or on their own tokio task via [`spawn`].

mod combinators;
mod error;
mod pool;
mod promise;
mod queue;
mod spawn;
mod task;

pub use combinators::{cancel_all, reject_all, when_all, when_any};
pub use error::PromiseError;
pub use pool::{PromisePool, ShutdownMode};
pub use promise::Promise;
pub use spawn::{spawn, spawn_on};
