// src/engine/handle.rs

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::errors::{GlobWatchError, Result};

use super::completion::{Completion, Done};
use super::observers::{self, Channel, SharedObservers, Subscription, WatchEvent};
use super::session::{Callback, SessionCommand, SessionMode};

/// Public handle to a running watch session.
///
/// Dropping the handle closes the session (without emitting `end`).
pub struct WatchHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    observers: SharedObservers,
    mode: SessionMode,
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("mode", &self.mode)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl WatchHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<SessionCommand>,
        observers: SharedObservers,
        mode: SessionMode,
    ) -> Self {
        Self {
            commands,
            observers,
            mode,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Subscribe to one channel. Events emitted before subscribing are not
    /// replayed, except the latched `ready` and `end`.
    pub fn subscribe(&self, channel: Channel) -> Subscription {
        observers::lock(&self.observers).subscribe(channel)
    }

    pub fn has_subscriber(&self, channel: Channel) -> bool {
        observers::lock(&self.observers).has_subscriber(channel)
    }

    /// Resolves once the initial scan is over and `ready` was emitted, or
    /// once the session is gone.
    pub async fn ready(&self) {
        let mut sub = self.subscribe(Channel::Ready);
        while let Some(event) = sub.recv().await {
            if matches!(event, WatchEvent::Ready) {
                return;
            }
        }
    }

    /// Append a pattern (a leading `!` adds an exclusion).
    pub async fn add(&self, pattern: impl Into<String>) -> Result<()> {
        self.send_add(pattern.into(), None).await
    }

    /// Append a pattern and run `callback` for changes to paths it matches.
    ///
    /// The callback gets its own debounce and single-flight gate.
    pub async fn add_with<F>(&self, pattern: impl Into<String>, callback: F) -> Result<()>
    where
        F: FnMut(Done) -> Completion + Send + 'static,
    {
        self.send_add(pattern.into(), Some(Box::new(callback))).await
    }

    async fn send_add(
        &self,
        pattern: String,
        callback: Option<Callback>,
    ) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(
            SessionCommand::Add {
                pattern,
                callback,
                reply,
            },
            rx,
        )
        .await
    }

    /// Drop every pattern written as `target`; when no pattern matches that
    /// text, stop reporting paths matching it instead.
    pub async fn remove(&self, target: impl Into<String>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(
            SessionCommand::Remove {
                target: target.into(),
                reply,
            },
            rx,
        )
        .await
    }

    async fn request(
        &self,
        command: SessionCommand,
        rx: oneshot::Receiver<Result<()>>,
    ) -> Result<()> {
        if self.commands.send(command).is_err() {
            return Err(closed_error());
        }
        rx.await.unwrap_or_else(|_| Err(closed_error()))
    }

    /// Stop watching and emit `end`.
    pub fn end(&self) {
        if self.commands.send(SessionCommand::End).is_err() {
            debug!("end requested on a session that already stopped");
        }
    }

    /// Stop watching without emitting `end`.
    pub fn close(&self) {
        if self.commands.send(SessionCommand::Close).is_err() {
            debug!("close requested on a session that already stopped");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Resolves once the session loop has exited.
    pub async fn closed(&self) {
        self.commands.closed().await;
    }
}

fn closed_error() -> GlobWatchError {
    GlobWatchError::Config("watch session is closed".to_string())
}
