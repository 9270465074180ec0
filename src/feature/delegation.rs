//! The shared flow behind every delegated language feature.
//!
//! A request bound to a host document runs through
//!
//! ```text
//! Created → ProjectionResolved → Synchronized → DelegateInvoked → ResultsRemapped → Completed
//!     └──────────────┴──────────────┴───────────────┴──────────────────┴──► Failed
//! ```
//!
//! Absences along the way (untracked document, no projection, language the
//! provider does not speak, virtual document that never caught up) end the
//! request early with [`Delegated::Skipped`]. Provider faults and malformed
//! results are logged once here and end in [`Delegated::Failed`]; features
//! turn both into an empty result rather than surfacing an error.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_lsp_server::ls_types::{CodeLens, Location, Position, Range, Uri};
use url::Url;

use crate::document::{
    DocumentManager, HostDocumentSnapshot, LanguageKind, VirtualDocumentSnapshot,
    VirtualDocumentUri, position_le,
};
use crate::error::{ProviderError, SyncError};
use crate::projection::{Projection, ProjectionEngine};
use crate::synchronizer::DocumentSynchronizer;

const LOG_TARGET: &str = "utsushi::feature";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Created,
    ProjectionResolved,
    Synchronized,
    DelegateInvoked,
    ResultsRemapped,
    Completed,
    Failed,
}

impl RequestState {
    fn can_advance_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Created, ProjectionResolved)
                | (ProjectionResolved, Synchronized)
                | (Synchronized, DelegateInvoked)
                | (DelegateInvoked, ResultsRemapped)
                | (ResultsRemapped, Completed)
                | (Created | ProjectionResolved | Synchronized | DelegateInvoked | ResultsRemapped, Failed)
        )
    }
}

/// What part of the host document a request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTarget {
    /// A single host position, projected into whichever region contains it.
    Position(Position),
    /// The whole virtual document for the requested language.
    Document,
}

#[derive(Debug, Clone)]
pub struct FeatureRequest<'a> {
    /// Name used in logs.
    pub operation: &'static str,
    pub host_uri: &'a Url,
    pub target: RequestTarget,
    /// The only language the delegate provider understands.
    pub language: LanguageKind,
    pub token: &'a CancellationToken,
}

/// Everything a provider needs to answer a delegated request.
#[derive(Debug, Clone)]
pub struct DelegationTarget {
    pub host: Arc<HostDocumentSnapshot>,
    pub virtual_document: Arc<VirtualDocumentSnapshot>,
    /// The projected position, for position-bound requests.
    pub virtual_position: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotTracked,
    NoProjection,
    LanguageMismatch { projected: LanguageKind },
    NotSynchronized(SyncError),
    /// The host was edited again before its virtual document caught up, so
    /// no mappings match the text the position refers to.
    HostChanged,
}

#[derive(Debug, Clone)]
pub enum Delegated<T> {
    /// The pipeline ran to completion. `None` means the provider had no
    /// applicable answer, which is distinct from an empty list.
    Completed {
        host: Arc<HostDocumentSnapshot>,
        items: Option<Vec<T>>,
    },
    Skipped(SkipReason),
    Cancelled,
    /// A provider or remap fault, already logged.
    Failed,
}

impl<T> Delegated<T> {
    pub fn state(&self) -> RequestState {
        match self {
            Delegated::Completed { .. } => RequestState::Completed,
            Delegated::Skipped(_) | Delegated::Cancelled | Delegated::Failed => {
                RequestState::Failed
            }
        }
    }
}

/// Where a result item points relative to the document that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultProvenance {
    /// Inside the virtual document the request ran against.
    VirtualDocument,
    /// A real file; already in user coordinates.
    ExternalFile,
    /// Some other virtual document, which this request cannot remap.
    OtherVirtualDocument,
}

/// A provider result that can be carried back to host coordinates.
pub trait Remappable: Sized {
    fn provenance(&self, virtual_uri: &VirtualDocumentUri) -> ResultProvenance;

    fn range(&self) -> Range;

    fn into_host(self, host_uri: &Uri, range: Range) -> Self;
}

impl Remappable for Location {
    fn provenance(&self, virtual_uri: &VirtualDocumentUri) -> ResultProvenance {
        let uri = self.uri.as_str();
        if uri == virtual_uri.as_str() {
            ResultProvenance::VirtualDocument
        } else if VirtualDocumentUri::is_virtual_uri(uri) {
            ResultProvenance::OtherVirtualDocument
        } else {
            ResultProvenance::ExternalFile
        }
    }

    fn range(&self) -> Range {
        self.range
    }

    fn into_host(self, host_uri: &Uri, range: Range) -> Self {
        Location {
            uri: host_uri.clone(),
            range,
        }
    }
}

impl Remappable for CodeLens {
    fn provenance(&self, _virtual_uri: &VirtualDocumentUri) -> ResultProvenance {
        ResultProvenance::VirtualDocument
    }

    fn range(&self) -> Range {
        self.range
    }

    fn into_host(self, _host_uri: &Uri, range: Range) -> Self {
        CodeLens { range, ..self }
    }
}

/// Tracks one request's progress through the state machine.
struct RequestPipeline<'a> {
    operation: &'static str,
    host_uri: &'a Url,
    state: RequestState,
}

impl<'a> RequestPipeline<'a> {
    fn new(operation: &'static str, host_uri: &'a Url) -> Self {
        Self {
            operation,
            host_uri,
            state: RequestState::Created,
        }
    }

    fn advance(&mut self, next: RequestState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        log::trace!(
            target: LOG_TARGET,
            "{} {}: {:?} -> {:?}",
            self.operation,
            self.host_uri,
            self.state,
            next
        );
        self.state = next;
    }

    fn end<T>(mut self, outcome: Delegated<T>) -> Delegated<T> {
        self.advance(outcome.state());
        outcome
    }
}

/// Runs the project → synchronize → invoke → remap flow.
pub struct FeatureDelegate {
    manager: Arc<DocumentManager>,
    projection: Arc<ProjectionEngine>,
    synchronizer: Arc<DocumentSynchronizer>,
}

impl FeatureDelegate {
    pub fn new(
        manager: Arc<DocumentManager>,
        projection: Arc<ProjectionEngine>,
        synchronizer: Arc<DocumentSynchronizer>,
    ) -> Self {
        Self {
            manager,
            projection,
            synchronizer,
        }
    }

    pub fn manager(&self) -> &Arc<DocumentManager> {
        &self.manager
    }

    /// Run `invoke` against the virtual document `request` resolves to and
    /// bring its results back to host coordinates.
    ///
    /// Items that cannot be remapped are dropped; the rest keep the
    /// provider's order.
    pub async fn delegate<T, F, Fut>(&self, request: FeatureRequest<'_>, invoke: F) -> Delegated<T>
    where
        T: Remappable,
        F: FnOnce(DelegationTarget) -> Fut,
        Fut: Future<Output = Result<Option<Vec<T>>, ProviderError>>,
    {
        let FeatureRequest {
            operation,
            host_uri,
            target,
            language,
            token,
        } = request;
        let mut pipeline = RequestPipeline::new(operation, host_uri);

        if token.is_cancelled() {
            return pipeline.end(Delegated::Cancelled);
        }

        let Some(host) = self.manager.get_document(host_uri) else {
            log::debug!(target: LOG_TARGET, "{}: {} is not tracked", operation, host_uri);
            return pipeline.end(Delegated::Skipped(SkipReason::NotTracked));
        };

        // Mappings of a virtual document behind the host describe older host
        // text, so only current ones may end the request before synchronizing.
        match target {
            RequestTarget::Position(position) => {
                let early = self.projection.get_projection(&host, position, token);
                if token.is_cancelled() {
                    return pipeline.end(Delegated::Cancelled);
                }
                match early {
                    Some(projection)
                        if projection.language != language
                            && is_current(&host, projection.language) =>
                    {
                        let skipped = self.language_mismatch(operation, &projection, language);
                        return pipeline.end(skipped);
                    }
                    None if host
                        .virtual_documents()
                        .iter()
                        .all(|document| document.is_synchronized_with(host.version())) =>
                    {
                        return pipeline.end(Delegated::Skipped(SkipReason::NoProjection));
                    }
                    _ => {}
                }
            }
            RequestTarget::Document => {
                if host.virtual_document(language).is_none() {
                    return pipeline.end(Delegated::Skipped(SkipReason::NoProjection));
                }
            }
        }
        pipeline.advance(RequestState::ProjectionResolved);

        let synchronized = match self
            .synchronizer
            .try_synchronize(&host, language, token)
            .await
        {
            Ok(document) => document,
            Err(SyncError::Cancelled) => return pipeline.end(Delegated::Cancelled),
            Err(err) => {
                log::debug!(target: LOG_TARGET, "{}: {}", operation, err);
                return pipeline.end(Delegated::Skipped(SkipReason::NotSynchronized(err)));
            }
        };

        // Pair the synchronized mappings with the host text they were
        // generated from before projecting.
        let (virtual_document, virtual_position) = match target {
            RequestTarget::Position(position) => {
                let Some(basis) = self.projection_basis(&host, &synchronized) else {
                    log::debug!(
                        target: LOG_TARGET,
                        "{}: {} changed again before regeneration",
                        operation,
                        host_uri
                    );
                    return pipeline.end(Delegated::Skipped(SkipReason::HostChanged));
                };
                let Some(projection) = self.projection.get_projection(&basis, position, token)
                else {
                    if token.is_cancelled() {
                        return pipeline.end(Delegated::Cancelled);
                    }
                    return pipeline.end(Delegated::Skipped(SkipReason::NoProjection));
                };
                if projection.language != language {
                    let skipped = self.language_mismatch(operation, &projection, language);
                    return pipeline.end(skipped);
                }
                let Some(document) = basis.virtual_document(language).cloned() else {
                    return pipeline.end(Delegated::Skipped(SkipReason::NoProjection));
                };
                (document, Some(projection.position))
            }
            RequestTarget::Document => (synchronized, None),
        };
        pipeline.advance(RequestState::Synchronized);

        let virtual_uri = virtual_document.uri().clone();
        let invocation = invoke(DelegationTarget {
            host: Arc::clone(&host),
            virtual_document,
            virtual_position,
        });
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return pipeline.end(Delegated::Cancelled),
            result = invocation => result,
        };
        pipeline.advance(RequestState::DelegateInvoked);

        let items = match result {
            Ok(Some(items)) => items,
            Ok(None) => {
                pipeline.advance(RequestState::ResultsRemapped);
                return pipeline.end(Delegated::Completed { host, items: None });
            }
            Err(ProviderError::Cancelled) => return pipeline.end(Delegated::Cancelled),
            Err(err) => {
                log::warn!(
                    target: LOG_TARGET,
                    "{} failed for {}: {}",
                    operation,
                    host_uri,
                    err
                );
                return pipeline.end(Delegated::Failed);
            }
        };

        let items = match self.remap(&host, language, &virtual_uri, items) {
            Ok(items) => items,
            Err(err) => {
                log::warn!(
                    target: LOG_TARGET,
                    "{} failed for {}: {}",
                    operation,
                    host_uri,
                    err
                );
                return pipeline.end(Delegated::Failed);
            }
        };
        pipeline.advance(RequestState::ResultsRemapped);

        pipeline.end(Delegated::Completed {
            host,
            items: Some(items),
        })
    }

    fn language_mismatch<T>(
        &self,
        operation: &'static str,
        projection: &Projection,
        language: LanguageKind,
    ) -> Delegated<T> {
        log::trace!(
            target: LOG_TARGET,
            "{}: position projects into {}, provider speaks {}",
            operation,
            projection.language,
            language
        );
        Delegated::Skipped(SkipReason::LanguageMismatch {
            projected: projection.language,
        })
    }

    /// A host snapshot whose text matches the mappings of `synchronized`.
    ///
    /// When the host raced ahead of the request, the current snapshot serves
    /// as long as its own virtual document has caught up too.
    fn projection_basis(
        &self,
        host: &HostDocumentSnapshot,
        synchronized: &Arc<VirtualDocumentSnapshot>,
    ) -> Option<Arc<HostDocumentSnapshot>> {
        if synchronized.host_document_sync_version() == Some(host.version()) {
            return Some(Arc::new(
                host.with_virtual_document(Arc::clone(synchronized)),
            ));
        }
        let current = self.manager.get_document(host.uri())?;
        is_current(&current, synchronized.language()).then_some(current)
    }

    fn remap<T: Remappable>(
        &self,
        host: &HostDocumentSnapshot,
        language: LanguageKind,
        virtual_uri: &VirtualDocumentUri,
        items: Vec<T>,
    ) -> Result<Vec<T>, ProviderError> {
        let host_lsp_uri: Uri = host.uri().as_str().parse().map_err(|_| {
            ProviderError::Malformed(format!("{} is not a valid LSP uri", host.uri()))
        })?;

        if let Some(bad) = items
            .iter()
            .find(|item| !position_le(item.range().start, item.range().end))
        {
            return Err(ProviderError::Malformed(format!(
                "inverted range {:?}",
                bad.range()
            )));
        }

        let total = items.len();
        let remapped: Vec<T> = items
            .into_iter()
            .filter_map(|item| match item.provenance(virtual_uri) {
                ResultProvenance::VirtualDocument => {
                    let mapped = self.projection.map_to_document_range(
                        language,
                        item.range(),
                        host.uri(),
                    )?;
                    Some(item.into_host(&host_lsp_uri, mapped.range))
                }
                ResultProvenance::ExternalFile => Some(item),
                ResultProvenance::OtherVirtualDocument => None,
            })
            .collect();

        if remapped.len() < total {
            log::trace!(
                target: LOG_TARGET,
                "Dropped {} non-user result(s) for {}",
                total - remapped.len(),
                host.uri()
            );
        }
        Ok(remapped)
    }
}

fn is_current(host: &HostDocumentSnapshot, language: LanguageKind) -> bool {
    host.virtual_document(language)
        .is_some_and(|document| document.is_synchronized_with(host.version()))
}
