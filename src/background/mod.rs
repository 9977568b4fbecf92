// src/background/mod.rs

//! Background command handles.
//!
//! - [`buffer`]: the watch-channel backed output log (one writer, many readers).
//! - [`consumer`]: the per-command task draining output into the log.
//! - [`handle`]: [`BackgroundCommand`], the caller-facing handle.
//! - [`scope`]: [`CommandScope`], which owns consumer tasks and joins them.

pub mod buffer;
mod consumer;
pub mod handle;
pub mod scope;

pub use buffer::{CancelReason, OutputLog, OutputReader, StreamState};
pub use handle::BackgroundCommand;
pub use scope::{CloseSummary, CommandScope, DEFAULT_GRACE_PERIOD};
