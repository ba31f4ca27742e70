// src/engine/observers.rs

//! Per-channel subscriber registry.
//!
//! Subscribers are plain unbounded channels; a subscriber whose receiver has
//! been dropped no longer counts and is pruned on the next emit.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::errors::GlobWatchError;
use crate::types::FileEventKind;

/// Named event channel of a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Added,
    Changed,
    Removed,
    Ready,
    Error,
    End,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Added,
        Channel::Changed,
        Channel::Removed,
        Channel::Ready,
        Channel::Error,
        Channel::End,
    ];

    pub fn for_kind(kind: FileEventKind) -> Self {
        match kind {
            FileEventKind::Added => Channel::Added,
            FileEventKind::Changed => Channel::Changed,
            FileEventKind::Removed => Channel::Removed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Added => "added",
            Channel::Changed => "changed",
            Channel::Removed => "removed",
            Channel::Ready => "ready",
            Channel::Error => "error",
            Channel::End => "end",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event delivered to subscribers.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Added(PathBuf),
    Changed(PathBuf),
    Removed(PathBuf),
    Ready,
    Error(Arc<GlobWatchError>),
    End,
}

impl WatchEvent {
    pub fn file(kind: FileEventKind, path: PathBuf) -> Self {
        match kind {
            FileEventKind::Added => WatchEvent::Added(path),
            FileEventKind::Changed => WatchEvent::Changed(path),
            FileEventKind::Removed => WatchEvent::Removed(path),
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            WatchEvent::Added(_) => Channel::Added,
            WatchEvent::Changed(_) => Channel::Changed,
            WatchEvent::Removed(_) => Channel::Removed,
            WatchEvent::Ready => Channel::Ready,
            WatchEvent::Error(_) => Channel::Error,
            WatchEvent::End => Channel::End,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            WatchEvent::Added(p) | WatchEvent::Changed(p) | WatchEvent::Removed(p) => Some(p),
            _ => None,
        }
    }
}

/// Receiving end of a subscription to one channel.
///
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    channel: Channel,
    rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl Subscription {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Next event, or `None` once the session has shut down and every
    /// buffered event was consumed.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<WatchEvent> {
        self.rx.try_recv().ok()
    }
}

/// Registry of live subscribers per channel.
///
/// `ready` and `end` are latched: subscribing after they were emitted
/// delivers them immediately, and the subscription is not kept.
#[derive(Debug, Default)]
pub struct Observers {
    subscribers: HashMap<Channel, Vec<mpsc::UnboundedSender<WatchEvent>>>,
    ready: bool,
    ended: bool,
    closed: bool,
}

/// Registry shared between a session and its handle.
pub type SharedObservers = Arc<Mutex<Observers>>;

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedObservers {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn subscribe(&mut self, channel: Channel) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();

        let latched = match channel {
            Channel::Ready if self.ready => Some(WatchEvent::Ready),
            Channel::End if self.ended => Some(WatchEvent::End),
            _ => None,
        };

        // A latched event fires at most once, and nothing is emitted after
        // shutdown. In both cases dropping `tx` lets the receiver drain what
        // it was given and then see `None`.
        match latched {
            Some(event) => {
                let _ = tx.send(event);
            }
            None if !self.closed => {
                self.subscribers.entry(channel).or_default().push(tx);
            }
            None => {}
        }

        Subscription { channel, rx }
    }

    /// Whether at least one live subscriber listens on `channel`.
    pub fn has_subscriber(&self, channel: Channel) -> bool {
        self.subscribers
            .get(&channel)
            .is_some_and(|subs| subs.iter().any(|tx| !tx.is_closed()))
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Deliver `event` to every live subscriber of its channel. Returns how
    /// many received it.
    pub fn emit(&mut self, event: WatchEvent) -> usize {
        let channel = event.channel();
        match channel {
            Channel::Ready => self.ready = true,
            Channel::End => self.ended = true,
            _ => {}
        }

        let Some(subs) = self.subscribers.get_mut(&channel) else {
            return 0;
        };
        subs.retain(|tx| tx.send(event.clone()).is_ok());
        subs.len()
    }

    /// Drop every subscriber; later subscriptions only see latched events.
    pub fn close(&mut self) {
        self.closed = true;
        self.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Lock the shared registry. The registry holds no invariants a panicking
/// holder could break, so a poisoned lock is recovered.
pub(crate) fn lock(observers: &Mutex<Observers>) -> MutexGuard<'_, Observers> {
    observers
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_subscriber_tracks_live_receivers() {
        let mut obs = Observers::new();
        assert!(!obs.has_subscriber(Channel::Error));

        let sub = obs.subscribe(Channel::Error);
        assert!(obs.has_subscriber(Channel::Error));
        assert!(!obs.has_subscriber(Channel::Added));

        drop(sub);
        assert!(!obs.has_subscriber(Channel::Error));
    }

    #[test]
    fn emit_reaches_only_its_channel() {
        let mut obs = Observers::new();
        let mut added = obs.subscribe(Channel::Added);
        let mut removed = obs.subscribe(Channel::Removed);

        let delivered = obs.emit(WatchEvent::Added(PathBuf::from("a.js")));
        assert_eq!(delivered, 1);

        match added.try_recv() {
            Some(WatchEvent::Added(p)) => assert_eq!(p, PathBuf::from("a.js")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(removed.try_recv().is_none());
    }

    #[test]
    fn closed_subscribers_are_pruned_on_emit() {
        let mut obs = Observers::new();
        let keep = obs.subscribe(Channel::Changed);
        drop(obs.subscribe(Channel::Changed));

        assert_eq!(obs.emit(WatchEvent::Changed(PathBuf::from("x"))), 1);
        drop(keep);
        assert_eq!(obs.emit(WatchEvent::Changed(PathBuf::from("x"))), 0);
    }

    #[test]
    fn ready_is_latched_for_late_subscribers() {
        let mut obs = Observers::new();
        obs.emit(WatchEvent::Ready);
        assert!(obs.is_ready());

        let mut late = obs.subscribe(Channel::Ready);
        assert!(matches!(late.try_recv(), Some(WatchEvent::Ready)));
    }

    #[tokio::test]
    async fn late_ready_subscriptions_are_not_retained() {
        let mut obs = Observers::new();
        obs.emit(WatchEvent::Ready);

        let mut subs: Vec<_> = (0..3).map(|_| obs.subscribe(Channel::Ready)).collect();
        assert!(!obs.has_subscriber(Channel::Ready));
        assert!(obs.subscribers.get(&Channel::Ready).is_none_or(Vec::is_empty));

        for sub in &mut subs {
            assert!(matches!(sub.recv().await, Some(WatchEvent::Ready)));
            assert!(sub.recv().await.is_none());
        }
    }

    #[tokio::test]
    async fn close_ends_subscriptions_after_draining() {
        let mut obs = Observers::new();
        let mut end = obs.subscribe(Channel::End);
        obs.emit(WatchEvent::End);
        obs.close();

        assert!(matches!(end.recv().await, Some(WatchEvent::End)));
        assert!(end.recv().await.is_none());

        let mut after = obs.subscribe(Channel::End);
        assert!(matches!(after.recv().await, Some(WatchEvent::End)));
        assert!(after.recv().await.is_none());
        assert!(!obs.has_subscriber(Channel::End));
    }
}
