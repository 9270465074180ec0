//! Collaborator interfaces.
//!
//! Per-language analysis lives outside this crate. These traits are the
//! boundary: providers answer questions about a virtual document, and the
//! editor answers which host documents are open.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tower_lsp_server::ls_types::{CodeLens, Location, Position};
use url::Url;

use crate::document::VirtualDocumentUri;
use crate::error::ProviderError;

/// Code lenses computed against a virtual document.
#[async_trait]
pub trait CodeLensProvider: Send + Sync {
    /// Lenses for the whole virtual document, in virtual coordinates.
    ///
    /// `Ok(None)` means the provider had nothing applicable to say.
    async fn code_lenses(
        &self,
        uri: &VirtualDocumentUri,
        token: &CancellationToken,
    ) -> Result<Option<Vec<CodeLens>>, ProviderError>;
}

/// Find-references computed against a virtual document.
#[async_trait]
pub trait ReferenceProvider: Send + Sync {
    /// References to the symbol at `position`.
    ///
    /// Locations may point into the same virtual document, into real files,
    /// or into other virtual documents.
    async fn references(
        &self,
        uri: &VirtualDocumentUri,
        position: Position,
        token: &CancellationToken,
    ) -> Result<Option<Vec<Location>>, ProviderError>;
}

/// The editor's view of which host documents are open.
pub trait OpenDocuments: Send + Sync {
    fn is_open(&self, uri: &Url) -> bool;
}

impl<F> OpenDocuments for F
where
    F: Fn(&Url) -> bool + Send + Sync,
{
    fn is_open(&self, uri: &Url) -> bool {
        self(uri)
    }
}
