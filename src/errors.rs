// src/errors.rs

//! Crate-wide error types.
//!
//! Structured errors cover the task registry, where callers match on the
//! failure; IO-heavy code paths use `anyhow` with context instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThemepipeError {
    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("task '{task}' has unknown prerequisite '{dep}'")]
    UnknownPrerequisite { task: String, dep: String },

    #[error("cycle detected in task graph involving '{0}'")]
    TaskCycle(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ThemepipeError>;
