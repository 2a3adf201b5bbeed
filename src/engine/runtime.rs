// src/engine/runtime.rs

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::reload::ReloadHandle;

/// Public type alias for task names throughout the engine.
pub type TaskName = String;

/// Reason why a task was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    FileWatch,
    Manual,
}

/// Events sent into the runtime from watchers or external signals.
///
/// - watchers send `TaskTriggered` and `ReloadRequested`
/// - Ctrl-C handling sends `ShutdownRequested`
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
    },
    ReloadRequested,
    ShutdownRequested,
}

/// The main orchestration runtime for watch mode.
///
/// Responsibilities:
/// - Consume `RuntimeEvent`s from watchers and the signal handler.
/// - Forward task triggers to the executor.
/// - Push full-page reloads onto the reload channel.
///
/// Task failures never reach this loop: the executor logs them and keeps
/// going, so one broken stylesheet edit does not end the session.
pub struct Runtime {
    /// Unified event stream from all producers.
    events_rx: mpsc::Receiver<RuntimeEvent>,

    /// Channel to the executor: triggered task names go here.
    exec_tx: mpsc::Sender<TaskName>,

    reload: ReloadHandle,
}

impl Runtime {
    pub fn new(
        events_rx: mpsc::Receiver<RuntimeEvent>,
        exec_tx: mpsc::Sender<TaskName>,
        reload: ReloadHandle,
    ) -> Self {
        Self {
            events_rx,
            exec_tx,
            reload,
        }
    }

    /// Main event loop. Runs until shutdown is requested or every producer
    /// has dropped its sender.
    pub async fn run(mut self) -> Result<()> {
        info!("runtime started");

        while let Some(event) = self.events_rx.recv().await {
            debug!(?event, "runtime received event");

            match event {
                RuntimeEvent::TaskTriggered { task, reason } => {
                    info!(task = %task, ?reason, "task triggered");
                    if let Err(err) = self.exec_tx.send(task).await {
                        error!(error = %err, "failed to send task to executor");
                        return Err(err.into());
                    }
                }
                RuntimeEvent::ReloadRequested => {
                    info!("full reload requested");
                    self.reload.notify_reload();
                }
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested, stopping runtime");
                    break;
                }
            }
        }

        info!("runtime exiting");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::{ReloadHandle, ReloadKind};

    #[tokio::test]
    async fn triggers_are_forwarded_to_the_executor() {
        let (events_tx, events_rx) = mpsc::channel(8);
        let (exec_tx, mut exec_rx) = mpsc::channel(8);
        let runtime = Runtime::new(events_rx, exec_tx, ReloadHandle::disabled());

        events_tx
            .send(RuntimeEvent::TaskTriggered {
                task: "stylesheets".into(),
                reason: TriggerReason::FileWatch,
            })
            .await
            .unwrap();
        events_tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();

        runtime.run().await.unwrap();
        assert_eq!(exec_rx.recv().await.as_deref(), Some("stylesheets"));
    }

    #[tokio::test]
    async fn reload_requests_reach_the_channel() {
        let (events_tx, events_rx) = mpsc::channel(8);
        let (exec_tx, _exec_rx) = mpsc::channel(8);
        let (handle, reload_tx) = ReloadHandle::live(8);
        let mut reload_rx = reload_tx.subscribe();
        let runtime = Runtime::new(events_rx, exec_tx, handle);

        events_tx.send(RuntimeEvent::ReloadRequested).await.unwrap();
        events_tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();

        runtime.run().await.unwrap();
        assert_eq!(reload_rx.try_recv().unwrap().kind, ReloadKind::Full);
    }

    #[tokio::test]
    async fn runtime_stops_when_producers_hang_up() {
        let (events_tx, events_rx) = mpsc::channel::<RuntimeEvent>(8);
        let (exec_tx, _exec_rx) = mpsc::channel(8);
        let runtime = Runtime::new(events_rx, exec_tx, ReloadHandle::disabled());

        drop(events_tx);
        runtime.run().await.unwrap();
    }
}
