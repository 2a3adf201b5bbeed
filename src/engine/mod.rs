// src/engine/mod.rs

//! Orchestration engine.
//!
//! The runtime event loop reacts to:
//! - file-watch triggers (re-run a content task)
//! - full-reload requests (template edits)
//! - shutdown signals
//!
//! Every trigger is dispatched as it arrives; there is no debouncing or
//! coalescing, matching the rebuild-on-every-save behavior of the watch
//! mode this replaces.

pub mod runtime;

pub use runtime::{Runtime, RuntimeEvent, TaskName, TriggerReason};
