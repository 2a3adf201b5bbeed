// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::ThemePaths;

/// What to do when a binding matches a changed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingAction {
    /// Re-run the named content task.
    RunTask(String),
    /// Push a full-page reload to connected browsers, no task involved.
    FullReload,
}

/// Raw binding specification before glob compilation: one or more patterns,
/// relative to the theme root, plus the action they trigger.
#[derive(Debug, Clone)]
pub struct WatchBindingSpec {
    pub patterns: Vec<String>,
    pub action: BindingAction,
}

impl WatchBindingSpec {
    pub fn task(pattern: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            patterns: vec![pattern.into()],
            action: BindingAction::RunTask(task.into()),
        }
    }

    pub fn full_reload(pattern: impl Into<String>) -> Self {
        Self {
            patterns: vec![pattern.into()],
            action: BindingAction::FullReload,
        }
    }
}

/// Compiled glob patterns for a single binding.
///
/// Patterns are relative to the theme root; the watcher passes relative
/// paths with forward slashes (e.g. `"assets/css/base.css"`) into `matches`.
#[derive(Clone)]
pub struct WatchBinding {
    glob_set: GlobSet,
    action: BindingAction,
}

impl fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinding")
            .field("action", &self.action)
            .finish()
    }
}

impl WatchBinding {
    pub fn matches(&self, rel_path: &str) -> bool {
        self.glob_set.is_match(rel_path)
    }

    pub fn action(&self) -> &BindingAction {
        &self.action
    }
}

/// Compile binding specs into matchable bindings. An invalid glob pattern is
/// a configuration error and fails the whole set.
pub fn compile_bindings(specs: Vec<WatchBindingSpec>) -> Result<Vec<WatchBinding>> {
    specs
        .into_iter()
        .map(|spec| {
            let mut builder = GlobSetBuilder::new();
            for pattern in &spec.patterns {
                let glob = Glob::new(pattern)
                    .with_context(|| format!("invalid watch pattern {pattern:?}"))?;
                builder.add(glob);
            }
            let glob_set = builder
                .build()
                .context("building watch glob set")?;
            Ok(WatchBinding {
                glob_set,
                action: spec.action,
            })
        })
        .collect()
}

/// The watch bindings registered by the serve task.
pub fn serve_bindings(paths: &ThemePaths) -> Vec<WatchBindingSpec> {
    vec![
        WatchBindingSpec::task(&paths.style_watch, "stylesheets"),
        WatchBindingSpec::task(&paths.script_watch, "scripts"),
        // TODO: watch paths.svg_watch here instead of the script glob. The
        // sprite currently rebuilds on script edits and never on icon edits.
        WatchBindingSpec::task(&paths.script_watch, "svgs"),
        WatchBindingSpec::full_reload(&paths.template_watch),
    ]
}

/// The single binding registered by the image watch task.
pub fn image_bindings(paths: &ThemePaths) -> Vec<WatchBindingSpec> {
    vec![WatchBindingSpec::task(&paths.img_watch, "img-opt")]
}
