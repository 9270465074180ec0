//! Publishing regenerated code documents to the project system.
//!
//! The code-language analysis engine learns about virtual documents through
//! a [`DynamicFileInfoProvider`]. Every time the code virtual document of a
//! host is regenerated, the new snapshot is pushed there. Everything else
//! about the document lifecycle is someone else's concern.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use url::Url;

use crate::document::{DocumentChangeEvent, LanguageKind, VirtualDocumentSnapshot};

const LOG_TARGET: &str = "utsushi::publisher";

/// Receiver of regenerated code documents.
pub trait DynamicFileInfoProvider: Send + Sync {
    fn update_file_info(&self, host_uri: &Url, document: Arc<VirtualDocumentSnapshot>);
}

pub struct VirtualDocumentPublisher {
    provider: Arc<dyn DynamicFileInfoProvider>,
}

impl VirtualDocumentPublisher {
    pub fn new(provider: Arc<dyn DynamicFileInfoProvider>) -> Self {
        Self { provider }
    }

    pub fn handle(&self, event: &DocumentChangeEvent) {
        match event {
            DocumentChangeEvent::VirtualDocumentChanged {
                new, virtual_new, ..
            } => {
                if virtual_new.language() != LanguageKind::Code {
                    return;
                }
                log::trace!(
                    target: LOG_TARGET,
                    "Publishing {} (host sync {:?})",
                    virtual_new.uri(),
                    virtual_new.host_document_sync_version()
                );
                self.provider
                    .update_file_info(new.uri(), Arc::clone(virtual_new));
            }
            DocumentChangeEvent::Added { .. }
            | DocumentChangeEvent::Removed { .. }
            | DocumentChangeEvent::ContentChanged { .. } => {}
        }
    }

    /// Forward events from `events` until the channel closes.
    pub fn spawn(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<DocumentChangeEvent>,
    ) -> JoinHandle<()> {
        let publisher = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => publisher.handle(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        // Newer regenerations supersede the missed ones.
                        log::debug!(
                            target: LOG_TARGET,
                            "Publisher missed {} change events",
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentManager, MappingMetadata};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProvider {
        updates: Mutex<Vec<(Url, u64, Option<u64>)>>,
    }

    impl DynamicFileInfoProvider for RecordingProvider {
        fn update_file_info(&self, host_uri: &Url, document: Arc<VirtualDocumentSnapshot>) {
            self.updates.lock().unwrap().push((
                host_uri.clone(),
                document.version(),
                document.host_document_sync_version(),
            ));
        }
    }

    fn setup() -> (
        Arc<RecordingProvider>,
        VirtualDocumentPublisher,
        DocumentManager,
        Url,
    ) {
        let provider = Arc::new(RecordingProvider::default());
        let publisher = VirtualDocumentPublisher::new(provider.clone());
        let manager = DocumentManager::default();
        let uri = Url::parse("file:///path/to/something.host").unwrap();
        (provider, publisher, manager, uri)
    }

    fn drain(
        events: &mut broadcast::Receiver<DocumentChangeEvent>,
    ) -> Vec<DocumentChangeEvent> {
        std::iter::from_fn(|| events.try_recv().ok()).collect()
    }

    #[test]
    fn added_removed_and_content_changes_are_ignored() {
        let (provider, publisher, manager, uri) = setup();
        let mut events = manager.subscribe();

        manager.open(uri.clone(), "a").unwrap();
        manager.update_host(&uri, "b").unwrap();
        manager.close(&uri).unwrap();

        for event in drain(&mut events) {
            publisher.handle(&event);
        }
        assert!(provider.updates.lock().unwrap().is_empty());
    }

    #[test]
    fn markup_regeneration_is_ignored() {
        let (provider, publisher, manager, uri) = setup();
        manager.open(uri.clone(), "a").unwrap();
        let mut events = manager.subscribe();

        manager
            .update_virtual(&uri, LanguageKind::Markup, "<a>", MappingMetadata::default(), 1)
            .unwrap();

        for event in drain(&mut events) {
            publisher.handle(&event);
        }
        assert!(provider.updates.lock().unwrap().is_empty());
    }

    #[test]
    fn code_regeneration_updates_file_info() {
        let (provider, publisher, manager, uri) = setup();
        manager.open(uri.clone(), "a").unwrap();
        let mut events = manager.subscribe();

        manager
            .update_virtual(&uri, LanguageKind::Code, "a;", MappingMetadata::default(), 1)
            .unwrap();

        for event in drain(&mut events) {
            publisher.handle(&event);
        }
        assert_eq!(
            *provider.updates.lock().unwrap(),
            vec![(uri, 1, Some(1))]
        );
    }

    #[tokio::test]
    async fn spawned_publisher_forwards_until_closed() {
        let (provider, publisher, manager, uri) = setup();
        let publisher = Arc::new(publisher);
        manager.open(uri.clone(), "a").unwrap();
        let task = publisher.spawn(manager.subscribe());

        manager
            .update_virtual(&uri, LanguageKind::Code, "a;", MappingMetadata::default(), 1)
            .unwrap();
        drop(manager);

        task.await.unwrap();
        assert_eq!(provider.updates.lock().unwrap().len(), 1);
    }
}
