// src/engine/mod.rs

//! Run scheduling for watch sessions.
//!
//! This module ties together:
//! - the debounce in front of every callback
//! - the single-flight gate (what happens when triggers arrive while a run
//!   is active)
//! - the completion adapter normalizing how callbacks report back
//! - the subscriber registry behind the named event channels
//! - the session event loop that reacts to filesystem events, finished runs
//!   and handle commands
//!
//! The gate and the debouncer are pure and synchronous; the async/IO shell
//! is implemented in [`session`].

pub mod completion;
pub mod debounce;
pub mod gate;
pub mod handle;
pub mod observers;
pub mod session;

pub use completion::{Completion, Done, RunFuture, RunResult};
pub use debounce::Debouncer;
pub use gate::{GateCommand, GateState, GateStep, RunId, TriggerGate};
pub use handle::WatchHandle;
pub use observers::{Channel, Observers, Subscription, WatchEvent};
pub use session::{Callback, SessionMode, TriggerId, WatchSession, WatchSessionBuilder};
