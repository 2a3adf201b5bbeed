// src/watch/mod.rs

//! File watching.
//!
//! This module turns filesystem change events into runtime events:
//! - `patterns` compiles watch bindings (glob set -> action) with globset.
//! - `watcher` wires a cross-platform `notify` watcher into the runtime
//!   channel.
//!
//! It knows nothing about how tasks execute; a change that matches several
//! bindings dispatches each of them independently.

pub mod patterns;
pub mod watcher;

pub use patterns::{
    compile_bindings, image_bindings, serve_bindings, BindingAction, WatchBinding,
    WatchBindingSpec,
};
pub use watcher::{spawn_watcher, WatcherHandle};
