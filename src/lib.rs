// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod reload;
pub mod serve;
pub mod tasks;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::{load_settings, BuildConfig};
use crate::engine::{Runtime, RuntimeEvent};
use crate::registry::{standard_registry, TaskAction};
use crate::reload::{ReloadHandle, ReloadMessage};
use crate::tasks::TaskContext;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading (before anything else runs; a bad settings file
///   fails the invocation outright)
/// - the task registry and execution plan
/// - content tasks, run inline in plan order
/// - long-lived services (dev proxy, watchers), runtime and executor
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let settings = load_settings(&args.settings)?;
    let config = BuildConfig::new(args.production, settings);

    let registry = standard_registry();
    let plan = registry.execution_plan(&args.task)?;
    debug!(
        plan = ?plan.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        "resolved execution plan"
    );

    // The proxy keeps the sender side for subscribing browsers; in
    // production mode tasks get a disabled handle and never publish.
    let (reload_tx, _reload_rx) = broadcast::channel::<ReloadMessage>(64);
    let reload = if config.production {
        ReloadHandle::disabled()
    } else {
        ReloadHandle::Live(reload_tx.clone())
    };

    let ctx = Arc::new(TaskContext::new(config, reload.clone()));

    // Content tasks run to completion in plan order. In a one-shot
    // invocation the first failure aborts; when the plan carries
    // long-lived services, an initial failure is logged and the watch
    // loop still comes up so the next save can retry.
    let services: Vec<TaskAction> = plan
        .iter()
        .map(|d| d.action)
        .filter(|a| a.is_long_lived())
        .collect();
    let keep_going = !services.is_empty();

    for def in &plan {
        match def.action {
            TaskAction::Aggregate => {}
            action if action.is_long_lived() => {}
            action => {
                info!(task = %def.name, "running task");
                if let Err(err) = tasks::run_content_action(action, &ctx) {
                    if keep_going {
                        error!(
                            task = %def.name,
                            error = %format!("{err:#}"),
                            "initial run failed; watching for changes"
                        );
                    } else {
                        return Err(err.context(format!("task '{}' failed", def.name)));
                    }
                }
            }
        }
    }

    if services.is_empty() {
        info!("all tasks complete");
        return Ok(());
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    // Executor for watch-triggered re-runs.
    let exec_tx = tasks::spawn_executor(Arc::clone(&ctx), registry.clone());

    // Watcher handles must stay alive for the lifetime of the runtime.
    let mut _watchers = Vec::new();
    for action in &services {
        match action {
            TaskAction::Serve => {
                _watchers.push(tasks::start_serve(&ctx, reload_tx.clone(), rt_tx.clone()).await?);
            }
            TaskAction::WatchImages => {
                _watchers.push(tasks::start_watch_images(&ctx, rt_tx.clone())?);
            }
            _ => {}
        }
    }

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let runtime = Runtime::new(rt_rx, exec_tx, reload);
    runtime.run().await
}
