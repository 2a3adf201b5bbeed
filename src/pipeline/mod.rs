// src/pipeline/mod.rs

//! Asset transform pipelines.
//!
//! Each pipeline is an ordered list of pure stages applied to an in-memory
//! [`Document`]. A stage consumes the previous stage's output; order is
//! semantically significant (e.g. minification assumes all syntax
//! transforms already ran). Keeping stages as plain functions makes each
//! one unit-testable in isolation.

pub mod images;
pub mod script;
pub mod sprite;
pub mod stylesheet;

use std::path::PathBuf;

use anyhow::Result;

/// A non-fatal message collected by a stage, surfaced once per run and
/// then cleared so repeated runs don't accumulate stale output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub stage: &'static str,
    pub message: String,
}

/// In-memory document flowing through a pipeline.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub content: String,
    /// Every source file that contributed to `content`, entry first.
    /// Feeds the source map.
    pub sources: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn push_diagnostic(&mut self, stage: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            stage,
            message: message.into(),
        });
    }
}

/// A named transform stage.
pub struct Stage<'a> {
    pub name: &'static str,
    pub transform: Box<dyn Fn(Document) -> Result<Document> + 'a>,
}

impl<'a> Stage<'a> {
    pub fn new<F>(name: &'static str, transform: F) -> Self
    where
        F: Fn(Document) -> Result<Document> + 'a,
    {
        Self {
            name,
            transform: Box::new(transform),
        }
    }
}

/// Run stages in order, threading the document through.
///
/// The first failing stage aborts the chain; nothing has been written to
/// disk at that point, so previously built output stays intact.
pub fn run_stages(mut doc: Document, stages: &[Stage<'_>]) -> Result<Document> {
    for stage in stages {
        tracing::debug!(stage = stage.name, "running pipeline stage");
        doc = (stage.transform)(doc)
            .map_err(|e| e.context(format!("pipeline stage '{}'", stage.name)))?;
    }
    Ok(doc)
}
