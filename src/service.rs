//! The assembled service.
//!
//! [`Utsushi`] owns the document manager and wires the synchronizer,
//! projection engine and features around it. Change listeners (refresh
//! scheduler, publisher) run as background tasks that end when the manager
//! is dropped or [`Utsushi::shutdown`] is called.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_lsp_server::ls_types::{Position, Range};
use url::Url;

use crate::config::Settings;
use crate::document::{DocumentManager, LanguageKind};
use crate::error::LockResultExt;
use crate::feature::{
    CodeLensItem, CodeLensProvider, FeatureDelegate, HostCodeLens, OpenDocuments,
    ReferenceCodeLensFeature, ReferenceProvider, RefreshScheduler,
};
use crate::projection::{MappedRange, Projection, ProjectionEngine};
use crate::publisher::{DynamicFileInfoProvider, VirtualDocumentPublisher};
use crate::synchronizer::DocumentSynchronizer;

const LOG_TARGET: &str = "utsushi::service";

/// External services the core depends on.
pub struct Collaborators {
    pub open_documents: Arc<dyn OpenDocuments>,
    pub code_lenses: Arc<dyn CodeLensProvider>,
    pub references: Arc<dyn ReferenceProvider>,
    /// Receives regenerated code documents, if the host has a project system.
    pub file_info: Option<Arc<dyn DynamicFileInfoProvider>>,
}

pub struct Utsushi {
    settings: Arc<ArcSwap<Settings>>,
    manager: Arc<DocumentManager>,
    synchronizer: Arc<DocumentSynchronizer>,
    projection: Arc<ProjectionEngine>,
    code_lens: ReferenceCodeLensFeature,
    refresh: Arc<RefreshScheduler>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Utsushi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Utsushi")
            .field("settings", &self.settings.load())
            .field("documents", &self.manager.document_count())
            .finish_non_exhaustive()
    }
}

impl Utsushi {
    /// Assemble the service and start its change listeners.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(settings: Settings, collaborators: Collaborators) -> Self {
        let Collaborators {
            open_documents,
            code_lenses,
            references,
            file_info,
        } = collaborators;

        let manager = Arc::new(DocumentManager::new(settings.event_buffer));
        let settings = Arc::new(ArcSwap::from_pointee(settings));
        let synchronizer = Arc::new(DocumentSynchronizer::new(
            Arc::clone(&manager),
            Arc::clone(&settings),
        ));
        let projection = Arc::new(ProjectionEngine::new(Arc::clone(&manager)));
        let delegate = Arc::new(FeatureDelegate::new(
            Arc::clone(&manager),
            Arc::clone(&projection),
            Arc::clone(&synchronizer),
        ));
        let code_lens = ReferenceCodeLensFeature::new(delegate, code_lenses, references);

        let refresh = Arc::new(RefreshScheduler::new(Arc::clone(&settings), open_documents));
        let mut listeners = vec![refresh.spawn_listener(manager.subscribe())];
        if let Some(provider) = file_info {
            let publisher = Arc::new(VirtualDocumentPublisher::new(provider));
            listeners.push(publisher.spawn(manager.subscribe()));
        }

        log::debug!(
            target: LOG_TARGET,
            "Started with {} change listener(s)",
            listeners.len()
        );

        Self {
            settings,
            manager,
            synchronizer,
            projection,
            code_lens,
            refresh,
            listeners: Mutex::new(listeners),
        }
    }

    pub fn manager(&self) -> &Arc<DocumentManager> {
        &self.manager
    }

    pub fn synchronizer(&self) -> &Arc<DocumentSynchronizer> {
        &self.synchronizer
    }

    pub fn projection(&self) -> &Arc<ProjectionEngine> {
        &self.projection
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    /// Replace the active settings.
    ///
    /// Timeouts and delays apply to requests started afterwards. The event
    /// buffer is fixed once the manager exists.
    pub fn apply_settings(&self, settings: Settings) {
        let current = self.settings.load();
        if settings.event_buffer != current.event_buffer {
            log::info!(
                target: LOG_TARGET,
                "event_buffer change to {} takes effect on restart",
                settings.event_buffer
            );
        }
        self.settings.store(Arc::new(settings));
    }

    /// Host uris whose code lenses the editor should request again.
    pub fn code_lens_refreshes(&self) -> broadcast::Receiver<Url> {
        self.refresh.subscribe()
    }

    pub fn get_projection(
        &self,
        host_uri: &Url,
        position: Position,
        token: &CancellationToken,
    ) -> Option<Projection> {
        let host = self.manager.get_document(host_uri)?;
        self.projection.get_projection(&host, position, token)
    }

    pub fn map_to_document_range(
        &self,
        language: LanguageKind,
        virtual_range: Range,
        host_uri: &Url,
    ) -> Option<MappedRange> {
        self.projection
            .map_to_document_range(language, virtual_range, host_uri)
    }

    pub async fn provide_code_lenses(
        &self,
        host_uri: &Url,
        token: &CancellationToken,
    ) -> Option<Vec<HostCodeLens>> {
        self.code_lens.provide_code_lenses(host_uri, token).await
    }

    pub async fn resolve_code_lens(
        &self,
        item: CodeLensItem,
        token: &CancellationToken,
    ) -> Option<CodeLensItem> {
        self.code_lens.resolve_code_lens(item, token).await
    }

    /// Stop background listeners and drop pending refreshes.
    pub fn shutdown(&self) {
        self.refresh.cancel_all();
        let listeners = std::mem::take(
            &mut *self.listeners.lock().recover_poison("Utsushi::shutdown"),
        );
        for listener in listeners {
            listener.abort();
        }
        log::debug!(target: LOG_TARGET, "Shut down");
    }
}
