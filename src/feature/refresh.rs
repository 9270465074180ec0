//! Delayed code lens refresh for freshly added documents.
//!
//! When an already open document is renamed it is removed and re-added, and
//! its virtual documents take a moment to regenerate. Lenses requested in
//! that window come back empty, so after an Added event for an open document
//! we wait and then tell the editor to ask again.
//!
//! ```text
//! Added event (document open in editor)
//!       │
//!       ├─► Cancel previous timer (if any)
//!       │
//!       └─► Spawn timer task
//!               │
//!               ├─► Wait refresh delay (5s default)
//!               │
//!               └─► Send host uri on the refresh channel
//! ```

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{AbortHandle, JoinHandle};
use url::Url;

use super::provider::OpenDocuments;
use crate::config::Settings;
use crate::document::DocumentChangeEvent;

const LOG_TARGET: &str = "utsushi::refresh";

/// Capacity of the refresh signal channel.
const REFRESH_CHANNEL_CAPACITY: usize = 64;

/// Per-document one-shot refresh timers.
pub struct RefreshScheduler {
    /// Pending timers per host document.
    pending: DashMap<Url, AbortHandle>,
    settings: Arc<ArcSwap<Settings>>,
    refreshes: broadcast::Sender<Url>,
    open_documents: Arc<dyn OpenDocuments>,
}

impl RefreshScheduler {
    pub fn new(settings: Arc<ArcSwap<Settings>>, open_documents: Arc<dyn OpenDocuments>) -> Self {
        let (refreshes, _) = broadcast::channel(REFRESH_CHANNEL_CAPACITY);
        Self {
            pending: DashMap::new(),
            settings,
            refreshes,
            open_documents,
        }
    }

    /// Receive the host uri of every document whose lenses should be
    /// requested again.
    pub fn subscribe(&self) -> broadcast::Receiver<Url> {
        self.refreshes.subscribe()
    }

    /// React to one document change.
    pub fn on_change(&self, event: &DocumentChangeEvent) {
        match event {
            DocumentChangeEvent::Added { new } => {
                if self.open_documents.is_open(new.uri()) {
                    self.schedule(new.uri().clone());
                } else {
                    log::trace!(
                        target: LOG_TARGET,
                        "{} added but not open; no refresh",
                        new.uri()
                    );
                }
            }
            DocumentChangeEvent::Removed { old } => self.cancel(old.uri()),
            DocumentChangeEvent::ContentChanged { .. }
            | DocumentChangeEvent::VirtualDocumentChanged { .. } => {}
        }
    }

    /// Schedule a refresh for `uri`, replacing any pending one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, uri: Url) {
        const CLEANUP_THRESHOLD: usize = 32;
        if self.pending.len() > CLEANUP_THRESHOLD {
            self.pending.retain(|_, handle| !handle.is_finished());
        }

        if let Some((_, previous)) = self.pending.remove(&uri) {
            previous.abort();
            log::trace!(
                target: LOG_TARGET,
                "Rescheduled code lens refresh for {}",
                uri
            );
        }

        let delay = self.settings.load().code_lens_refresh_delay();
        let refreshes = self.refreshes.clone();
        let target = uri.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            log::debug!(target: LOG_TARGET, "Refreshing code lenses for {}", target);
            if refreshes.send(target).is_err() {
                log::trace!(target: LOG_TARGET, "No refresh subscribers");
            }
        });

        self.pending.insert(uri, task.abort_handle());
    }

    /// Drop the pending refresh for `uri`, if any.
    pub fn cancel(&self, uri: &Url) {
        if let Some((_, handle)) = self.pending.remove(uri) {
            handle.abort();
            log::trace!(target: LOG_TARGET, "Cancelled code lens refresh for {}", uri);
        }
    }

    pub fn cancel_all(&self) {
        for entry in self.pending.iter() {
            entry.value().abort();
        }
        self.pending.clear();
        log::debug!(target: LOG_TARGET, "Cancelled all code lens refreshes");
    }

    /// Feed change events from `events` into the scheduler until the channel
    /// closes.
    pub fn spawn_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<DocumentChangeEvent>,
    ) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => scheduler.on_change(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        log::debug!(
                            target: LOG_TARGET,
                            "Refresh listener missed {} change events",
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn has_pending(&self, uri: &Url) -> bool {
        self.pending
            .get(uri)
            .is_some_and(|handle| !handle.is_finished())
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
