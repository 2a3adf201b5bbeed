// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, TriggerReason};
use crate::watch::patterns::{BindingAction, WatchBinding};

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive
/// for as long as needed. Dropping this handle stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher that observes `root` recursively and sends a
/// runtime event for every binding a changed path matches.
///
/// - `root` is the theme root against which all glob patterns are evaluated.
/// - `bindings` is the compiled pattern set.
/// - `runtime_tx` is the channel into the main runtime.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    bindings: Vec<WatchBinding>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root
        .canonicalize()
        .unwrap_or_else(|_| root.clone()); // best-effort

    let bindings = Arc::new(bindings);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        {
            let event_tx = event_tx.clone();
            move |res: notify::Result<Event>| {
                match res {
                    Ok(event) => {
                        if let Err(err) = event_tx.send(event) {
                            // Can't log via tracing in this callback, so
                            // fall back to stderr.
                            eprintln!("themepipe: failed to forward notify event: {err}");
                        }
                    }
                    Err(err) => {
                        eprintln!("themepipe: file watch error: {err}");
                    }
                }
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!("file watcher started on {:?}", root);

    // Async task that consumes notify events and forwards matches to the
    // runtime.
    let async_root = root.clone();
    let async_bindings = Arc::clone(&bindings);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!("received notify event: {:?}", event);

            for path in &event.paths {
                let Some(rel_str) = relative_str(&async_root, path) else {
                    warn!(
                        "could not relativize path {:?} against root {:?}",
                        path, async_root
                    );
                    continue;
                };

                for binding in async_bindings.iter() {
                    if !binding.matches(&rel_str) {
                        continue;
                    }
                    let runtime_event = match binding.action() {
                        BindingAction::RunTask(task) => {
                            debug!(task = %task, path = %rel_str, "watch match -> triggering task");
                            RuntimeEvent::TaskTriggered {
                                task: task.clone(),
                                reason: TriggerReason::FileWatch,
                            }
                        }
                        BindingAction::FullReload => {
                            debug!(path = %rel_str, "watch match -> full reload");
                            RuntimeEvent::ReloadRequested
                        }
                    };
                    if let Err(err) = runtime_tx.send(runtime_event).await {
                        warn!("failed to send runtime event: {err}");
                        // If the runtime channel is closed there's no point
                        // keeping the watcher loop alive.
                        return;
                    }
                }
            }
        }

        debug!("file watcher loop ended");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not under `root` and cannot be relativized.
fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_str_uses_forward_slashes() {
        let root = Path::new("/srv/site/wp-content/themes/base");
        let path = Path::new("/srv/site/wp-content/themes/base/assets/css/base.css");
        assert_eq!(
            relative_str(root, path).as_deref(),
            Some("assets/css/base.css")
        );
    }

    #[test]
    fn paths_outside_root_are_rejected() {
        let root = Path::new("/srv/site/wp-content/themes/base");
        let path = Path::new("/srv/other/file.css");
        assert!(relative_str(root, path).is_none());
    }
}
