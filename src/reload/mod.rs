// src/reload/mod.rs

//! Live-reload notification channel.
//!
//! Content tasks report changed assets here; the dev proxy fans messages
//! out to connected browsers over its event stream. In production mode the
//! handle is disabled and every notification is a no-op.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// How the browser should react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadKind {
    /// Swap the changed asset in place (stylesheets, sprite) without a
    /// full page reload.
    Stream,
    /// Reload the whole page.
    Full,
}

/// One reload notification as sent to connected clients.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadMessage {
    pub kind: ReloadKind,
    /// Changed asset path for streaming updates, relative to the site root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Handle used by tasks to publish reload notifications.
///
/// `Disabled` is the production-mode branch: calls are accepted and do
/// nothing observable.
#[derive(Debug, Clone)]
pub enum ReloadHandle {
    Live(broadcast::Sender<ReloadMessage>),
    Disabled,
}

impl ReloadHandle {
    /// Create a live channel plus its handle. The sender side is kept by
    /// the proxy for subscribing clients.
    pub fn live(capacity: usize) -> (Self, broadcast::Sender<ReloadMessage>) {
        let (tx, _rx) = broadcast::channel(capacity);
        (Self::Live(tx.clone()), tx)
    }

    /// Production handle: every notification is a deliberate no-op.
    pub fn disabled() -> Self {
        Self::Disabled
    }

    /// Streaming notification: the named asset changed.
    pub fn notify_stream(&self, path: impl Into<String>) {
        self.send(ReloadMessage {
            kind: ReloadKind::Stream,
            path: Some(path.into()),
        });
    }

    /// Full-page reload notification.
    pub fn notify_reload(&self) {
        self.send(ReloadMessage {
            kind: ReloadKind::Full,
            path: None,
        });
    }

    fn send(&self, msg: ReloadMessage) {
        match self {
            Self::Live(tx) => {
                // No receiver just means no browser is connected yet.
                let delivered = tx.send(msg.clone()).unwrap_or(0);
                debug!(?msg, delivered, "reload notification");
            }
            Self::Disabled => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_handle_delivers_to_subscribers() {
        let (handle, tx) = ReloadHandle::live(8);
        let mut rx = tx.subscribe();

        handle.notify_stream("library/css/base.css");
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.kind, ReloadKind::Stream);
        assert_eq!(msg.path.as_deref(), Some("library/css/base.css"));

        handle.notify_reload();
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.kind, ReloadKind::Full);
        assert!(msg.path.is_none());
    }

    #[test]
    fn disabled_handle_is_a_verified_noop() {
        // A disabled handle next to a live channel: nothing it does may
        // reach the subscriber.
        let (_live, tx) = ReloadHandle::live(8);
        let mut rx = tx.subscribe();

        let disabled = ReloadHandle::disabled();
        disabled.notify_stream("library/css/base.css");
        disabled.notify_reload();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn messages_serialize_for_the_event_stream() {
        let msg = ReloadMessage {
            kind: ReloadKind::Stream,
            path: Some("library/svg/sprite.svg".into()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"stream","path":"library/svg/sprite.svg"}"#
        );
    }
}
