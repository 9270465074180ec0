//! Waiting for a virtual document to catch up with its host.
//!
//! Regeneration runs asynchronously after each host edit, so a feature
//! request can arrive while the virtual document still reflects an older host
//! version. [`DocumentSynchronizer::try_synchronize`] bridges that gap:
//!
//! ```text
//! subscribe to changes
//!       │
//!       ├─► current virtual doc synced? ──► return it (no suspension)
//!       │
//!       └─► wait for the first of
//!               ├─► matching VirtualDocumentChanged ──► return new virtual doc
//!               ├─► Added/Removed for the host       ──► Aborted
//!               ├─► cancellation token               ──► Cancelled
//!               └─► timeout                          ──► TimedOut
//! ```
//!
//! Subscribing before the fast-path check means a regeneration landing
//! between the check and the wait is still observed.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::document::{
    DocumentChangeEvent, DocumentManager, HostDocumentSnapshot, LanguageKind,
    VirtualDocumentSnapshot,
};
use crate::error::SyncError;

const LOG_TARGET: &str = "utsushi::sync";

pub struct DocumentSynchronizer {
    manager: Arc<DocumentManager>,
    settings: Arc<ArcSwap<Settings>>,
}

impl DocumentSynchronizer {
    pub fn new(manager: Arc<DocumentManager>, settings: Arc<ArcSwap<Settings>>) -> Self {
        Self { manager, settings }
    }

    /// Synchronizer with a fixed timeout, independent of shared settings.
    pub fn with_timeout(manager: Arc<DocumentManager>, timeout: Duration) -> Self {
        let settings = Settings {
            synchronization_timeout_ms: timeout.as_millis() as u64,
            ..Settings::default()
        };
        Self::new(manager, Arc::new(ArcSwap::from_pointee(settings)))
    }

    fn timeout(&self) -> Duration {
        self.settings.load().synchronization_timeout()
    }

    /// Wait until the `language` virtual document of `host` was generated from
    /// `host.version()` or later.
    pub async fn try_synchronize(
        &self,
        host: &HostDocumentSnapshot,
        language: LanguageKind,
        token: &CancellationToken,
    ) -> Result<Arc<VirtualDocumentSnapshot>, SyncError> {
        let uri = host.uri();
        let target_version = host.version();
        let mut events = self.manager.subscribe();

        if token.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        if let Some(document) = self.current_if_synchronized(host, language)? {
            log::trace!(
                target: LOG_TARGET,
                "{} {} already synced to host version {}",
                uri,
                language,
                target_version
            );
            return Ok(document);
        }

        let timeout = self.timeout();
        log::debug!(
            target: LOG_TARGET,
            "Waiting up to {:?} for {} {} to reach host version {}",
            timeout,
            uri,
            language,
            target_version
        );

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    log::debug!(target: LOG_TARGET, "Synchronization of {} cancelled", uri);
                    return Err(SyncError::Cancelled);
                }
                _ = &mut deadline => {
                    log::debug!(
                        target: LOG_TARGET,
                        "Synchronization of {} {} timed out after {:?}",
                        uri,
                        language,
                        timeout
                    );
                    return Err(SyncError::TimedOut { timeout });
                }
                received = events.recv() => match received {
                    Ok(event) => {
                        if event.host_uri() != uri {
                            continue;
                        }
                        match event {
                            DocumentChangeEvent::Added { .. } | DocumentChangeEvent::Removed { .. } => {
                                log::debug!(
                                    target: LOG_TARGET,
                                    "{} was added or removed while waiting",
                                    uri
                                );
                                return Err(SyncError::Aborted { uri: uri.clone() });
                            }
                            DocumentChangeEvent::VirtualDocumentChanged { virtual_new, .. } => {
                                if virtual_new.language() == language
                                    && virtual_new.is_synchronized_with(target_version)
                                {
                                    return Ok(virtual_new);
                                }
                            }
                            DocumentChangeEvent::ContentChanged { .. } => {}
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Only the newest state matters; read it directly
                        log::debug!(
                            target: LOG_TARGET,
                            "Missed {} change events while waiting on {}",
                            skipped,
                            uri
                        );
                        if let Some(document) = self.current_if_synchronized(host, language)? {
                            return Ok(document);
                        }
                    }
                    Err(RecvError::Closed) => {
                        return Err(SyncError::Aborted { uri: uri.clone() });
                    }
                }
            }
        }
    }

    /// The current virtual document if it already satisfies `host`.
    fn current_if_synchronized(
        &self,
        host: &HostDocumentSnapshot,
        language: LanguageKind,
    ) -> Result<Option<Arc<VirtualDocumentSnapshot>>, SyncError> {
        let current = self
            .manager
            .get_document(host.uri())
            .ok_or_else(|| SyncError::NotTracked {
                uri: host.uri().clone(),
            })?;

        Ok(current
            .virtual_document(language)
            .filter(|document| document.is_synchronized_with(host.version()))
            .cloned())
    }
}
