//! Fetch orchestration and auto-reload.
//!
//! - [`orchestrator`] -- Single-flight fetch with stale-completion detection.
//! - [`timer`] -- One-shot cancellable reload timer.
//! - [`scheduler`] -- Auto-reload policy on top of the timer.
//! - [`session`] -- Event loop that owns both and serializes every mutation.

pub mod orchestrator;
pub mod scheduler;
pub mod session;
pub mod timer;

pub use orchestrator::{FetchCompletion, FetchEvent, FetchOrchestrator, FetchState};
pub use scheduler::{AutoReloadScheduler, SchedulerState};
pub use session::{FetchSnapshot, Session, SessionCommand, SessionHandle};
pub use timer::ReloadTimer;
