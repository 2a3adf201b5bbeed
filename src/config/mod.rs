// src/config/mod.rs

//! Configuration loading for themepipe.
//!
//! Responsibilities:
//! - Define the JSON-backed settings model and load it (`settings.rs`).
//! - Resolve theme source/destination paths (`paths.rs`).

pub mod paths;
pub mod settings;

pub use paths::ThemePaths;
pub use settings::{load_settings, BuildConfig, Settings};
