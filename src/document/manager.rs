//! Authoritative registry of host documents.
//!
//! The manager is the single writer: every change goes through one of its
//! write methods, which swap in a fresh immutable snapshot and broadcast the
//! matching [`DocumentChangeEvent`] while still holding the write lock. That
//! keeps notification order identical to change order. Readers copy an `Arc`
//! out of the registry and never block on writers.
//!
//! Rejected writes (opening a tracked document, editing an untracked one,
//! generator output from the future) emit no event and return `None`.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::broadcast;
use url::Url;

use super::events::{DocumentChangeEvent, DocumentChangeKind};
use super::mapping::MappingMetadata;
use super::position::SourceText;
use super::snapshot::{HostDocumentSnapshot, LanguageKind, VirtualDocumentSnapshot};
use crate::config::DEFAULT_EVENT_BUFFER;
use crate::error::LockResultExt;

const LOG_TARGET: &str = "utsushi::manager";

pub struct DocumentManager {
    documents: DashMap<Url, Arc<HostDocumentSnapshot>>,
    /// Serializes writers so snapshot swaps and event sends stay in order.
    write_lock: Mutex<()>,
    events: broadcast::Sender<DocumentChangeEvent>,
    languages: Vec<LanguageKind>,
}

impl Default for DocumentManager {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl DocumentManager {
    /// Create a manager whose host documents carry every [`LanguageKind`].
    pub fn new(event_buffer: usize) -> Self {
        Self::with_languages(event_buffer, &LanguageKind::ALL)
    }

    pub fn with_languages(event_buffer: usize, languages: &[LanguageKind]) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            documents: DashMap::new(),
            write_lock: Mutex::new(()),
            events,
            languages: languages.to_vec(),
        }
    }

    /// Current snapshot for `uri`, or `None` if the document is not tracked.
    pub fn get_document(&self, uri: &Url) -> Option<Arc<HostDocumentSnapshot>> {
        self.documents.get(uri).map(|entry| Arc::clone(entry.value()))
    }

    pub fn is_tracked(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Subscribe to change notifications.
    ///
    /// Events raised before this call are not replayed, so callers that wait
    /// for a condition must subscribe before checking it.
    pub fn subscribe(&self) -> broadcast::Receiver<DocumentChangeEvent> {
        self.events.subscribe()
    }

    /// Start tracking a host document at version 1.
    pub fn open(&self, uri: Url, text: impl Into<String>) -> Option<Arc<HostDocumentSnapshot>> {
        let _guard = self.write_lock.lock().recover_poison("DocumentManager::open");

        if self.documents.contains_key(&uri) {
            log::warn!(target: LOG_TARGET, "Ignoring open of already tracked {}", uri);
            return None;
        }

        let snapshot = Arc::new(HostDocumentSnapshot::new(
            uri.clone(),
            1,
            SourceText::new(text),
            &self.languages,
        ));
        self.documents.insert(uri.clone(), Arc::clone(&snapshot));
        log::debug!(target: LOG_TARGET, "Opened {} at version 1", uri);

        self.notify(DocumentChangeEvent::Added {
            new: Arc::clone(&snapshot),
        });
        Some(snapshot)
    }

    /// Replace the host text, bumping the host version.
    pub fn update_host(&self, uri: &Url, text: impl Into<String>) -> Option<Arc<HostDocumentSnapshot>> {
        let _guard = self
            .write_lock
            .lock()
            .recover_poison("DocumentManager::update_host");

        let Some(old) = self.get_document(uri) else {
            log::warn!(target: LOG_TARGET, "Ignoring edit of untracked {}", uri);
            return None;
        };

        let new = Arc::new(old.with_text(SourceText::new(text)));
        self.documents.insert(uri.clone(), Arc::clone(&new));
        log::trace!(
            target: LOG_TARGET,
            "Host {} advanced to version {}",
            uri,
            new.version()
        );

        self.notify(DocumentChangeEvent::ContentChanged {
            old,
            new: Arc::clone(&new),
        });
        Some(new)
    }

    /// Install regenerated content for one virtual document.
    ///
    /// Called by the generator with the host version it generated from.
    /// Output claiming a host version newer than the current one is a
    /// contract violation and is rejected. Output older than what the virtual
    /// document already holds is stale and dropped.
    pub fn update_virtual(
        &self,
        uri: &Url,
        language: LanguageKind,
        text: impl Into<String>,
        mappings: MappingMetadata,
        host_document_sync_version: u64,
    ) -> Option<Arc<HostDocumentSnapshot>> {
        let _guard = self
            .write_lock
            .lock()
            .recover_poison("DocumentManager::update_virtual");

        let Some(old) = self.get_document(uri) else {
            log::warn!(
                target: LOG_TARGET,
                "Ignoring {} regeneration of untracked {}",
                language,
                uri
            );
            return None;
        };

        if host_document_sync_version > old.version() {
            log::warn!(
                target: LOG_TARGET,
                "Rejecting {} regeneration of {} for future host version {} (current {})",
                language,
                uri,
                host_document_sync_version,
                old.version()
            );
            return None;
        }

        let Some(virtual_old) = old.virtual_document(language).cloned() else {
            log::warn!(
                target: LOG_TARGET,
                "{} has no {} virtual document",
                uri,
                language
            );
            return None;
        };

        if virtual_old
            .host_document_sync_version()
            .is_some_and(|current| current > host_document_sync_version)
        {
            log::debug!(
                target: LOG_TARGET,
                "Dropping stale {} regeneration of {} (sync {} < {:?})",
                language,
                uri,
                host_document_sync_version,
                virtual_old.host_document_sync_version()
            );
            return None;
        }

        let virtual_new = Arc::new(virtual_old.regenerated(
            SourceText::new(text),
            mappings,
            host_document_sync_version,
        ));
        let new = Arc::new(old.with_virtual_document(Arc::clone(&virtual_new)));
        self.documents.insert(uri.clone(), Arc::clone(&new));
        log::trace!(
            target: LOG_TARGET,
            "{} virtual document of {} now synced to host version {}",
            language,
            uri,
            host_document_sync_version
        );

        self.notify(DocumentChangeEvent::VirtualDocumentChanged {
            old,
            new: Arc::clone(&new),
            virtual_old,
            virtual_new,
        });
        Some(new)
    }

    /// Stop tracking a host document.
    pub fn close(&self, uri: &Url) -> Option<Arc<HostDocumentSnapshot>> {
        let _guard = self.write_lock.lock().recover_poison("DocumentManager::close");

        let Some((_, old)) = self.documents.remove(uri) else {
            log::debug!(target: LOG_TARGET, "Ignoring close of untracked {}", uri);
            return None;
        };
        log::debug!(target: LOG_TARGET, "Closed {}", uri);

        self.notify(DocumentChangeEvent::Removed {
            old: Arc::clone(&old),
        });
        Some(old)
    }

    /// Mirror a change reported by an external document tracker.
    ///
    /// The parts are checked with [`DocumentChangeEvent::from_parts`]; a
    /// malformed event is logged and dropped without touching the registry,
    /// as is one that does not fit what is currently tracked.
    pub fn ingest(
        &self,
        kind: DocumentChangeKind,
        old: Option<Arc<HostDocumentSnapshot>>,
        new: Option<Arc<HostDocumentSnapshot>>,
        virtual_old: Option<Arc<VirtualDocumentSnapshot>>,
        virtual_new: Option<Arc<VirtualDocumentSnapshot>>,
    ) -> Option<DocumentChangeEvent> {
        let event = match DocumentChangeEvent::from_parts(kind, old, new, virtual_old, virtual_new) {
            Ok(event) => event,
            Err(err) => {
                log::warn!(target: LOG_TARGET, "Dropping malformed change event: {}", err);
                return None;
            }
        };

        let _guard = self.write_lock.lock().recover_poison("DocumentManager::ingest");
        let uri = event.host_uri().clone();
        let tracked = self.documents.contains_key(&uri);

        match &event {
            DocumentChangeEvent::Added { new } if !tracked => {
                self.documents.insert(uri, Arc::clone(new));
            }
            DocumentChangeEvent::Removed { .. } if tracked => {
                self.documents.remove(&uri);
            }
            DocumentChangeEvent::ContentChanged { new, .. }
            | DocumentChangeEvent::VirtualDocumentChanged { new, .. }
                if tracked =>
            {
                self.documents.insert(uri, Arc::clone(new));
            }
            _ => {
                log::warn!(
                    target: LOG_TARGET,
                    "Ignoring {:?} for {} (tracked: {})",
                    event.kind(),
                    uri,
                    tracked
                );
                return None;
            }
        }

        self.notify(event.clone());
        Some(event)
    }

    fn notify(&self, event: DocumentChangeEvent) {
        // No subscribers is fine: nobody is waiting on this document.
        if self.events.send(event).is_err() {
            log::trace!(target: LOG_TARGET, "No change subscribers");
        }
    }
}
