// src/tasks/mod.rs

//! Task execution.
//!
//! Maps registry actions onto the pipeline builders and wires in their
//! reload side effects: stylesheets and the sprite stream the changed asset
//! to the browser, scripts request a full reload, image optimization stays
//! silent. The background executor runs watch-triggered tasks one spawn per
//! trigger and logs failures instead of propagating them, so a broken edit
//! never ends a watch session.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::{BuildConfig, ThemePaths};
use crate::engine::{RuntimeEvent, TaskName};
use crate::pipeline::{images, script, sprite, stylesheet};
use crate::pipeline::stylesheet::StylesheetOptions;
use crate::registry::{TaskAction, TaskRegistry};
use crate::reload::{ReloadHandle, ReloadMessage};
use crate::serve::{parse_upstream, Proxy};
use crate::watch::{
    compile_bindings, image_bindings, serve_bindings, spawn_watcher, WatcherHandle,
};

/// Everything a task invocation needs, threaded in explicitly.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub config: BuildConfig,
    pub paths: ThemePaths,
    pub reload: ReloadHandle,
}

impl TaskContext {
    pub fn new(config: BuildConfig, reload: ReloadHandle) -> Self {
        let paths = ThemePaths::from_settings(&config.settings);
        Self {
            config,
            paths,
            reload,
        }
    }
}

/// Run one content action to completion.
///
/// Long-lived and aggregate actions are not content work; they are handled
/// by the orchestrator and land here only through a misrouted trigger.
pub fn run_content_action(action: TaskAction, ctx: &TaskContext) -> Result<()> {
    match action {
        TaskAction::Stylesheets => {
            let options = StylesheetOptions {
                namespace: ctx.config.settings.css_namespace.clone(),
            };
            let out = stylesheet::build(&ctx.paths.style_entry, &ctx.paths.style_dest, &options)?;
            ctx.reload.notify_stream(site_relative(&ctx.paths, &out));
        }
        TaskAction::Scripts => {
            script::build(&ctx.paths, &ctx.paths.script_dest)?;
            ctx.reload.notify_reload();
        }
        TaskAction::Svgs => {
            let out = sprite::build(&ctx.paths.svg_dir, &ctx.paths.svg_dest)?;
            ctx.reload.notify_stream(site_relative(&ctx.paths, &out));
        }
        TaskAction::ImgOpt => {
            images::build(&ctx.paths.img_dir, &ctx.paths.img_dest)?;
        }
        TaskAction::WatchImages | TaskAction::Serve | TaskAction::Aggregate => {
            warn!(?action, "not a content action, nothing to run");
        }
    }
    Ok(())
}

/// Output path relative to the theme root, with forward slashes, for
/// streaming reload messages.
fn site_relative(paths: &ThemePaths, out: &Path) -> String {
    out.strip_prefix(&paths.theme_root)
        .unwrap_or(out)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Spawn the background executor loop.
///
/// The returned sender is what the runtime uses as `exec_tx`. Each
/// triggered task runs in its own blocking task; failures are logged and
/// swallowed so the loop keeps serving later triggers.
pub fn spawn_executor(ctx: Arc<TaskContext>, registry: TaskRegistry) -> mpsc::Sender<TaskName> {
    let (tx, mut rx) = mpsc::channel::<TaskName>(32);

    tokio::spawn(async move {
        info!("executor loop started");
        while let Some(task) = rx.recv().await {
            let Some(def) = registry.get(&task) else {
                warn!(task = %task, "trigger for unknown task ignored");
                continue;
            };
            let action = def.action;
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                info!(task = %task, "running triggered task");
                let result =
                    tokio::task::spawn_blocking(move || run_content_action(action, &ctx)).await;
                match result {
                    Ok(Ok(())) => info!(task = %task, "task completed"),
                    Ok(Err(err)) => error!(task = %task, error = %err, "task failed"),
                    Err(err) => error!(task = %task, error = %err, "task panicked"),
                }
            });
        }
        info!("executor loop finished (channel closed)");
    });

    tx
}

/// Start the serve service: bind the dev proxy, spawn its accept loop, and
/// watch the theme for asset and template changes.
pub async fn start_serve(
    ctx: &TaskContext,
    reload_tx: broadcast::Sender<ReloadMessage>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let upstream = parse_upstream(&ctx.config.settings.dev_url)?;
    let proxy = Proxy::bind(ctx.config.settings.proxy_port, upstream, reload_tx).await?;

    tokio::spawn(async move {
        if let Err(err) = proxy.run().await {
            error!(error = %err, "dev proxy stopped");
        }
    });

    let bindings = compile_bindings(serve_bindings(&ctx.paths))
        .context("compiling serve watch bindings")?;
    debug!(count = bindings.len(), "serve watch bindings registered");
    spawn_watcher(ctx.paths.theme_root.clone(), bindings, runtime_tx)
}

/// Start the image watch service.
pub fn start_watch_images(
    ctx: &TaskContext,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let bindings = compile_bindings(image_bindings(&ctx.paths))
        .context("compiling image watch bindings")?;
    spawn_watcher(ctx.paths.theme_root.clone(), bindings, runtime_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    use crate::config::Settings;
    use crate::registry::standard_registry;
    use crate::reload::ReloadKind;

    fn context_in(root: &Path, reload: ReloadHandle) -> TaskContext {
        let settings: Settings = serde_json::from_str(
            r#"{ "devUrl": "http://localhost:8888", "themeName": "base" }"#,
        )
        .unwrap();
        let mut ctx = TaskContext::new(BuildConfig::new(false, settings), reload);
        retarget(&mut ctx.paths, root);
        ctx
    }

    // Point every path at the temp directory instead of the cwd.
    fn retarget(paths: &mut ThemePaths, root: &Path) {
        let theme = root.join(&paths.theme_root);
        *paths = ThemePaths {
            style_entry: theme.join("assets/css/base.css"),
            style_dest: theme.join("library/css"),
            script_entry: theme.join("assets/js/application.js"),
            script_dest: theme.join("library/js"),
            svg_dir: theme.join("assets/svg"),
            svg_dest: theme.join("library/svg"),
            img_dir: theme.join("assets/img"),
            img_dest: theme.join("library/img"),
            theme_root: theme,
            ..paths.clone()
        };
    }

    #[test]
    fn stylesheets_build_and_stream_the_output_path() {
        let dir = tempdir().unwrap();
        let (handle, tx) = ReloadHandle::live(8);
        let mut rx = tx.subscribe();
        let ctx = context_in(dir.path(), handle);

        fs::create_dir_all(ctx.paths.style_entry.parent().unwrap()).unwrap();
        fs::write(&ctx.paths.style_entry, ".nav { color: red; }").unwrap();

        run_content_action(TaskAction::Stylesheets, &ctx).unwrap();

        assert!(ctx.paths.style_dest.join("base.css").exists());
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.kind, ReloadKind::Stream);
        assert_eq!(msg.path.as_deref(), Some("library/css/base.css"));
    }

    #[test]
    fn scripts_build_and_request_a_full_reload() {
        let dir = tempdir().unwrap();
        let (handle, tx) = ReloadHandle::live(8);
        let mut rx = tx.subscribe();
        let ctx = context_in(dir.path(), handle);

        fs::create_dir_all(ctx.paths.script_entry.parent().unwrap()).unwrap();
        fs::write(&ctx.paths.script_entry, "const app = {};").unwrap();

        run_content_action(TaskAction::Scripts, &ctx).unwrap();

        assert!(ctx.paths.script_dest.join("application.js").exists());
        assert_eq!(rx.try_recv().unwrap().kind, ReloadKind::Full);
    }

    #[test]
    fn missing_entry_stylesheet_is_an_error() {
        let dir = tempdir().unwrap();
        let ctx = context_in(dir.path(), ReloadHandle::disabled());
        assert!(run_content_action(TaskAction::Stylesheets, &ctx).is_err());
    }

    #[tokio::test]
    async fn executor_survives_a_failing_task() {
        let dir = tempdir().unwrap();
        let ctx = Arc::new(context_in(dir.path(), ReloadHandle::disabled()));

        fs::create_dir_all(&ctx.paths.img_dir).unwrap();
        fs::write(ctx.paths.img_dir.join("notes.txt"), "hi").unwrap();

        let exec_tx = spawn_executor(Arc::clone(&ctx), standard_registry());

        // Fails: no stylesheet entry exists. Must not kill the loop.
        exec_tx.send("stylesheets".to_string()).await.unwrap();
        exec_tx.send("img-opt".to_string()).await.unwrap();

        let dest = ctx.paths.img_dest.join("notes.txt");
        for _ in 0..50 {
            if dest.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("img-opt never ran after the failing task");
    }
}
